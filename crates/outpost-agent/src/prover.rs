//! Move-proof builder client.
//!
//! `POST /move` with the move geometry; the prover holds the circuit and the
//! hashing constants of the running game, and answers with the contract call
//! arguments `{a, b, c, input}`.

use std::time::Duration;

use outpost_core::collaborators::{ArgumentBuilder, ArgumentRequest};
use outpost_core::error::BuildError;
use outpost_types::MoveProof;
use serde::Deserialize;

use crate::error::AgentError;

#[derive(Debug, Deserialize)]
struct ProofResponse {
    a: Vec<String>,
    b: Vec<Vec<String>>,
    c: Vec<String>,
    #[serde(alias = "inputs")]
    input: Vec<String>,
}

impl From<ProofResponse> for MoveProof {
    fn from(response: ProofResponse) -> Self {
        Self {
            a: response.a,
            b: response.b,
            c: response.c,
            inputs: response.input,
        }
    }
}

/// [`ArgumentBuilder`] over the prover's HTTP API.
#[derive(Debug, Clone)]
pub struct ProverClient {
    client: reqwest::Client,
    prover_url: String,
}

impl ProverClient {
    /// Create a prover client. Every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Http`] if the HTTP client cannot be built.
    pub fn new(prover_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Http(format!("prover client: {e}")))?;
        Ok(Self {
            client,
            prover_url: prover_url.trim_end_matches('/').to_owned(),
        })
    }
}

impl ArgumentBuilder for ProverClient {
    async fn build(&self, request: ArgumentRequest) -> Result<MoveProof, BuildError> {
        let url = format!("{}/move", self.prover_url);
        let body = serde_json::json!({
            "x1": request.from.x.to_string(),
            "y1": request.from.y.to_string(),
            "x2": request.to.x.to_string(),
            "y2": request.to.y.to_string(),
            "r": request.world_radius.to_string(),
            "distMax": request.dist_max.to_string(),
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BuildError::Failed(format!("prover request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(BuildError::Failed(format!(
                "prover returned {status} for {}: {error_body}",
                request.cache_key()
            )));
        }

        let proof: ProofResponse = response
            .json()
            .await
            .map_err(|e| BuildError::Failed(format!("prover response parse failed: {e}")))?;
        Ok(proof.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn proof_response_accepts_either_input_spelling() {
        let json = r#"{"a":["1","2"],"b":[["3","4"],["5","6"]],"c":["7","8"],"input":["9"]}"#;
        let proof: MoveProof = serde_json::from_str::<ProofResponse>(json).unwrap().into();
        assert_eq!(proof.inputs, vec!["9".to_owned()]);
        assert_eq!(proof.b.len(), 2);

        let json = r#"{"a":[],"b":[],"c":[],"inputs":["1"]}"#;
        let proof: MoveProof = serde_json::from_str::<ProofResponse>(json).unwrap().into();
        assert_eq!(proof.inputs, vec!["1".to_owned()]);
    }
}
