//! Transaction relay client.
//!
//! The relay signs and broadcasts actions on behalf of the identity.
//! Submission is `POST /actions` with the [`ActionRequest`] as JSON; a 2xx
//! response means the relay accepted it. Progress is then read from
//! `GET /actions/{action_id}`, whose `status` field ends as `confirmed` or
//! `failed` (with an `error` message).

use std::time::Duration;

use futures::FutureExt;
use outpost_core::collaborators::{ExecutorHandle, TransactionExecutor};
use outpost_core::error::ExecutorError;
use outpost_types::{ActionId, ActionRequest};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::AgentError;

/// Default delay between confirmation polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// [`TransactionExecutor`] over the relay's HTTP API.
#[derive(Debug, Clone)]
pub struct RelayExecutor {
    client: reqwest::Client,
    relay_url: String,
    poll_interval: Duration,
}

/// Where an action stands according to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RelayStatus {
    Pending,
    Confirmed,
    Failed(String),
}

impl RelayExecutor {
    /// Create a relay client. Every HTTP request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Http`] if the HTTP client cannot be built.
    pub fn new(relay_url: &str, timeout: Duration, poll_interval: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Http(format!("relay client: {e}")))?;
        Ok(Self {
            client,
            relay_url: relay_url.trim_end_matches('/').to_owned(),
            poll_interval,
        })
    }

    async fn post(&self, request: &ActionRequest) -> Result<(), ExecutorError> {
        let url = format!("{}/actions", self.relay_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ExecutorError::Rejected(format!("relay request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        Err(ExecutorError::Rejected(format!("relay returned {status}: {error_body}")))
    }

    async fn status(&self, action_id: ActionId) -> Result<RelayStatus, String> {
        let url = format!("{}/actions/{action_id}", self.relay_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("status request failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("relay returned {status}"));
        }
        let json: Value = response
            .json()
            .await
            .map_err(|e| format!("status response parse failed: {e}"))?;
        Ok(parse_status(&json))
    }

    /// Submit, report acceptance, then poll until the relay reports a final
    /// status or the handle is dropped.
    async fn drive(
        self,
        request: ActionRequest,
        submitted: oneshot::Sender<Result<(), ExecutorError>>,
        mut confirmed: oneshot::Sender<Result<(), ExecutorError>>,
    ) {
        let action_id = request.action_id;
        let accepted = self.post(&request).await;
        let rejected = accepted.is_err();
        if submitted.send(accepted).is_err() || rejected {
            return;
        }

        loop {
            tokio::select! {
                () = confirmed.closed() => {
                    debug!(action_id = %action_id, "confirmation no longer awaited, polling stopped");
                    return;
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }
            match self.status(action_id).await {
                Ok(RelayStatus::Pending) => {}
                Ok(RelayStatus::Confirmed) => {
                    let _ = confirmed.send(Ok(()));
                    return;
                }
                Ok(RelayStatus::Failed(reason)) => {
                    let _ = confirmed.send(Err(ExecutorError::Confirmation(reason)));
                    return;
                }
                Err(err) => debug!(action_id = %action_id, error = %err, "status poll failed, retrying"),
            }
        }
    }
}

impl TransactionExecutor for RelayExecutor {
    fn submit(&self, request: ActionRequest) -> ExecutorHandle {
        let action_id = request.action_id;
        let (submitted_tx, submitted_rx) = oneshot::channel();
        let (confirmed_tx, confirmed_rx) = oneshot::channel();
        tokio::spawn(self.clone().drive(request, submitted_tx, confirmed_tx));

        ExecutorHandle {
            action_id,
            submitted: async move { submitted_rx.await.unwrap_or(Err(ExecutorError::Dropped)) }
                .boxed(),
            confirmed: async move { confirmed_rx.await.unwrap_or(Err(ExecutorError::Dropped)) }
                .boxed(),
        }
    }
}

fn parse_status(json: &Value) -> RelayStatus {
    match json.get("status").and_then(Value::as_str) {
        Some("confirmed") => RelayStatus::Confirmed,
        Some("failed" | "reverted" | "dropped") => RelayStatus::Failed(
            json.get("error")
                .and_then(Value::as_str)
                .unwrap_or("no reason given")
                .to_owned(),
        ),
        _ => RelayStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_statuses_are_recognized() {
        assert_eq!(
            parse_status(&serde_json::json!({ "status": "confirmed" })),
            RelayStatus::Confirmed
        );
        assert_eq!(
            parse_status(&serde_json::json!({ "status": "reverted", "error": "out of gas" })),
            RelayStatus::Failed("out of gas".to_owned())
        );
        assert_eq!(
            parse_status(&serde_json::json!({ "status": "failed" })),
            RelayStatus::Failed("no reason given".to_owned())
        );
    }

    #[test]
    fn anything_else_is_still_pending() {
        assert_eq!(
            parse_status(&serde_json::json!({ "status": "submitted" })),
            RelayStatus::Pending
        );
        assert_eq!(parse_status(&serde_json::json!({})), RelayStatus::Pending);
    }
}
