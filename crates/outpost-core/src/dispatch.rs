//! Idempotent dispatch of planned moves.
//!
//! The [`DispatchTracker`] is the single owner of the pending-action table.
//! Every source is in exactly one of these states:
//!
//! ```text
//!   Idle ──► Queued ──► Submitted ──► Confirmed ─┐
//!    ▲         │            │                      │
//!    │         │ build      └──────► Failed ───────┤
//!    │         │ error                             │
//!    └─────────┴───────────────────────────────────┘
//! ```
//!
//! `Idle` means "no entry". A move is only queued when its source is idle,
//! which is what keeps at most one action in flight per source. Terminal
//! states remove the entry, so the source is eligible again on the next
//! cycle.
//!
//! Confirmation is awaited by a detached task per action. Outcomes come back
//! over a channel and are applied by the tracker itself in
//! [`DispatchTracker::reconcile`], so the table is never touched from two
//! places at once.
//!
//! With a journal configured, queued actions are persisted and reloaded on
//! start-up as `Restored` entries that keep their source blocked until the
//! entry expires.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, join_all};
use outpost_types::{
    ActionId, ActionMethod, ActionRequest, AssetId, Location, Move, MoveArgs, PendingState,
    to_contract_units,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::collaborators::{
    ArgumentBuilder, ArgumentRequest, JournalEntry, NoJournal, PendingJournal, TransactionExecutor,
};
use crate::config::DispatchConfig;
use crate::error::{BuildError, ExecutorError};
use crate::index::LocationIndex;

/// Timeouts and addressing for dispatched actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Contract move calls are addressed to.
    pub target_contract: String,
    /// Deadline for argument builds and submission acknowledgements.
    pub call_timeout: Duration,
    /// Deadline for confirmation after acknowledgement.
    pub confirmation_timeout: Duration,
    /// Lifetime of journal entries.
    pub journal_ttl: Duration,
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            target_contract: config.target_contract.clone(),
            call_timeout: config.call_timeout(),
            confirmation_timeout: config.confirmation_timeout(),
            journal_ttl: config.journal_ttl(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

/// An action holding its source's slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    /// Source whose slot is taken.
    pub source_id: AssetId,
    /// The move being carried out.
    pub planned: Move,
    /// Identifier handed to the executor.
    pub action_id: ActionId,
    /// Current lifecycle state. Never terminal while in the table.
    pub state: PendingState,
    /// When the entry was created.
    pub since: DateTime<Utc>,
    /// When a restored entry stops blocking its source.
    pub expires_at: Option<DateTime<Utc>>,
}

/// What one call to [`DispatchTracker::dispatch`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Moves accepted by the executor.
    pub submitted: usize,
    /// Moves skipped because their source already had an action.
    pub skipped_in_flight: usize,
    /// Moves abandoned because no payload could be built.
    pub build_failed: usize,
    /// Moves the executor refused or did not acknowledge in time.
    pub rejected: usize,
}

/// What one call to [`DispatchTracker::reconcile`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Actions confirmed since the last reconcile.
    pub confirmed: usize,
    /// Actions that failed after submission.
    pub failed: usize,
    /// Restored entries that expired.
    pub expired: usize,
}

#[derive(Debug)]
struct Outcome {
    source_id: AssetId,
    action_id: ActionId,
    result: Result<(), ExecutorError>,
}

/// Owner of the pending-action table.
pub struct DispatchTracker<B, E, J = NoJournal> {
    builder: B,
    executor: E,
    journal: J,
    settings: DispatchSettings,
    pending: BTreeMap<AssetId, PendingAction>,
    outcomes_tx: mpsc::UnboundedSender<Outcome>,
    outcomes_rx: mpsc::UnboundedReceiver<Outcome>,
}

impl<B, E> DispatchTracker<B, E, NoJournal>
where
    B: ArgumentBuilder,
    E: TransactionExecutor,
{
    /// Create a tracker without a journal.
    pub fn new(builder: B, executor: E, settings: DispatchSettings) -> Self {
        Self::with_journal(builder, executor, NoJournal, settings)
    }
}

impl<B, E, J> DispatchTracker<B, E, J>
where
    B: ArgumentBuilder,
    E: TransactionExecutor,
    J: PendingJournal,
{
    /// Create a tracker that persists pending actions to `journal`.
    pub fn with_journal(builder: B, executor: E, journal: J, settings: DispatchSettings) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            builder,
            executor,
            journal,
            settings,
            pending: BTreeMap::new(),
            outcomes_tx,
            outcomes_rx,
        }
    }

    /// The pending action of `source_id`, if any.
    pub fn get(&self, source_id: &AssetId) -> Option<&PendingAction> {
        self.pending.get(source_id)
    }

    /// Whether `source_id` has an action in flight.
    pub fn is_busy(&self, source_id: &AssetId) -> bool {
        self.pending.contains_key(source_id)
    }

    /// Number of sources with an action in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// The argument builder in use.
    pub const fn builder(&self) -> &B {
        &self.builder
    }

    /// Reload journaled actions after a restart.
    ///
    /// Unexpired entries block their source as `Restored` until they expire;
    /// expired ones are removed from the journal. Returns how many entries
    /// were restored.
    pub async fn restore(&mut self, now: DateTime<Utc>) -> usize {
        let entries = match self.journal.load().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "could not load pending-action journal");
                return 0;
            }
        };

        let mut restored = 0usize;
        for entry in entries {
            if entry.expires_at <= now {
                self.clear_journal(&entry.source_id).await;
                continue;
            }
            if self.pending.contains_key(&entry.source_id) {
                continue;
            }
            info!(
                source_id = %entry.source_id,
                target_id = %entry.target_id,
                action_id = %entry.action_id,
                expires_at = %entry.expires_at,
                "restored pending action from journal"
            );
            self.pending.insert(
                entry.source_id.clone(),
                PendingAction {
                    source_id: entry.source_id.clone(),
                    planned: Move {
                        source_id: entry.source_id,
                        target_id: entry.target_id,
                        resource_amount: entry.resource_amount,
                    },
                    action_id: entry.action_id,
                    state: PendingState::Restored,
                    since: now,
                    expires_at: Some(entry.expires_at),
                },
            );
            restored = restored.saturating_add(1);
        }
        restored
    }

    /// Queue, build, and submit `moves`.
    ///
    /// Moves whose source already has an entry are skipped. Builds and
    /// submission acknowledgements run concurrently; the call returns once
    /// every move has been acknowledged, refused, or abandoned.
    pub async fn dispatch(
        &mut self,
        moves: Vec<Move>,
        index: &LocationIndex,
        world_radius: f64,
        now: DateTime<Utc>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        let mut queued: Vec<(Move, ActionId, ArgumentRequest)> = Vec::new();
        for planned in moves {
            if let Some(existing) = self.pending.get(&planned.source_id) {
                debug!(
                    source_id = %planned.source_id,
                    action_id = %existing.action_id,
                    state = existing.state.as_str(),
                    "source already has an action in flight"
                );
                bump(&mut report.skipped_in_flight);
                continue;
            }

            let (from, to) = match endpoints(index, &planned) {
                Ok(endpoints) => endpoints,
                Err(err) => {
                    warn!(source_id = %planned.source_id, error = %err, "move abandoned");
                    bump(&mut report.build_failed);
                    continue;
                }
            };

            let action_id = ActionId::new();
            self.pending.insert(
                planned.source_id.clone(),
                PendingAction {
                    source_id: planned.source_id.clone(),
                    planned: planned.clone(),
                    action_id,
                    state: PendingState::Queued,
                    since: now,
                    expires_at: None,
                },
            );
            info!(
                source_id = %planned.source_id,
                target_id = %planned.target_id,
                action_id = %action_id,
                amount = planned.resource_amount,
                "action queued"
            );
            self.record_journal(&planned, action_id, now).await;

            let request = ArgumentRequest::new(from.coords, to.coords, world_radius);
            queued.push((planned, action_id, request));
        }

        let call_timeout = self.settings.call_timeout;
        let builder = &self.builder;
        let built = join_all(queued.iter().map(|(_, _, request)| async move {
            tokio::time::timeout(call_timeout, builder.build(*request))
                .await
                .unwrap_or(Err(BuildError::Timeout(call_timeout)))
        }))
        .await;

        let mut awaiting: Vec<(Move, ActionId, BoxFuture<'static, Result<(), ExecutorError>>)> =
            Vec::new();
        let mut acks = Vec::new();
        for ((planned, action_id, _), result) in queued.into_iter().zip(built) {
            let proof = match result {
                Ok(proof) => proof,
                Err(err) => {
                    warn!(
                        source_id = %planned.source_id,
                        action_id = %action_id,
                        error = %err,
                        "argument build failed, slot freed"
                    );
                    self.release(&planned.source_id).await;
                    bump(&mut report.build_failed);
                    continue;
                }
            };

            let handle = self.executor.submit(ActionRequest {
                action_id,
                target: self.settings.target_contract.clone(),
                method: ActionMethod::Move,
                args: MoveArgs {
                    proof,
                    resource_units: to_contract_units(planned.resource_amount),
                },
            });
            acks.push(handle.submitted);
            awaiting.push((planned, action_id, handle.confirmed));
        }

        let acked = join_all(acks.into_iter().map(|submitted| async move {
            tokio::time::timeout(call_timeout, submitted)
                .await
                .unwrap_or(Err(ExecutorError::Timeout(call_timeout)))
        }))
        .await;

        for ((planned, action_id, confirmed), result) in awaiting.into_iter().zip(acked) {
            match result {
                Ok(()) => {
                    if let Some(entry) = self.pending.get_mut(&planned.source_id) {
                        entry.state = PendingState::Submitted;
                    }
                    info!(
                        source_id = %planned.source_id,
                        action_id = %action_id,
                        "action submitted"
                    );
                    self.watch(planned.source_id, action_id, confirmed);
                    bump(&mut report.submitted);
                }
                Err(err) => {
                    warn!(
                        source_id = %planned.source_id,
                        action_id = %action_id,
                        error = %err,
                        "submission failed, slot freed"
                    );
                    self.release(&planned.source_id).await;
                    bump(&mut report.rejected);
                }
            }
        }

        report
    }

    /// Apply every outcome delivered so far and expire stale restored
    /// entries.
    pub async fn reconcile(&mut self, now: DateTime<Utc>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            match self.apply(outcome).await {
                Some(PendingState::Confirmed) => bump(&mut report.confirmed),
                Some(PendingState::Failed) => bump(&mut report.failed),
                _ => {}
            }
        }

        let expired: Vec<AssetId> = self
            .pending
            .values()
            .filter(|entry| entry.state == PendingState::Restored)
            .filter(|entry| entry.expires_at.is_some_and(|at| at <= now))
            .map(|entry| entry.source_id.clone())
            .collect();
        for source_id in expired {
            info!(source_id = %source_id, "restored action expired, slot freed");
            self.release(&source_id).await;
            bump(&mut report.expired);
        }

        report
    }

    /// Wait for the next outcome and apply it.
    ///
    /// Returns `None` immediately when no submitted action is outstanding.
    pub async fn next_outcome(&mut self) -> Option<(AssetId, PendingState)> {
        loop {
            let outstanding = self
                .pending
                .values()
                .any(|entry| entry.state == PendingState::Submitted);
            if !outstanding {
                return None;
            }
            let outcome = self.outcomes_rx.recv().await?;
            let source_id = outcome.source_id.clone();
            if let Some(state) = self.apply(outcome).await {
                return Some((source_id, state));
            }
        }
    }

    async fn apply(&mut self, outcome: Outcome) -> Option<PendingState> {
        let current = self
            .pending
            .get(&outcome.source_id)
            .is_some_and(|entry| entry.action_id == outcome.action_id);
        if !current {
            debug!(
                source_id = %outcome.source_id,
                action_id = %outcome.action_id,
                "ignoring outcome for an action no longer pending"
            );
            return None;
        }

        self.release(&outcome.source_id).await;
        match outcome.result {
            Ok(()) => {
                info!(
                    source_id = %outcome.source_id,
                    action_id = %outcome.action_id,
                    "action confirmed"
                );
                Some(PendingState::Confirmed)
            }
            Err(err) => {
                warn!(
                    source_id = %outcome.source_id,
                    action_id = %outcome.action_id,
                    error = %err,
                    "action failed"
                );
                Some(PendingState::Failed)
            }
        }
    }

    fn watch(
        &self,
        source_id: AssetId,
        action_id: ActionId,
        confirmed: BoxFuture<'static, Result<(), ExecutorError>>,
    ) {
        let tx = self.outcomes_tx.clone();
        let deadline = self.settings.confirmation_timeout;
        tokio::spawn(async move {
            let result = tokio::time::timeout(deadline, confirmed)
                .await
                .unwrap_or(Err(ExecutorError::Timeout(deadline)));
            let outcome = Outcome {
                source_id,
                action_id,
                result,
            };
            if tx.send(outcome).is_err() {
                debug!(action_id = %action_id, "tracker gone before outcome arrived");
            }
        });
    }

    async fn release(&mut self, source_id: &AssetId) {
        self.pending.remove(source_id);
        self.clear_journal(source_id).await;
    }

    async fn record_journal(&self, planned: &Move, action_id: ActionId, now: DateTime<Utc>) {
        let ttl = TimeDelta::from_std(self.settings.journal_ttl).unwrap_or(TimeDelta::MAX);
        let entry = JournalEntry {
            source_id: planned.source_id.clone(),
            target_id: planned.target_id.clone(),
            action_id,
            resource_amount: planned.resource_amount,
            expires_at: now
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        if let Err(err) = self.journal.record(&entry).await {
            warn!(source_id = %planned.source_id, error = %err, "could not journal pending action");
        }
    }

    async fn clear_journal(&self, source_id: &AssetId) {
        if let Err(err) = self.journal.clear(source_id).await {
            warn!(source_id = %source_id, error = %err, "could not clear journal entry");
        }
    }
}

/// Indexed locations of both ends of `planned`.
fn endpoints<'a>(
    index: &'a LocationIndex,
    planned: &Move,
) -> Result<(&'a Location, &'a Location), BuildError> {
    let from = index
        .get(&planned.source_id)
        .ok_or_else(|| BuildError::MissingLocation(planned.source_id.to_string()))?;
    let to = index
        .get(&planned.target_id)
        .ok_or_else(|| BuildError::MissingLocation(planned.target_id.to_string()))?;
    Ok((from, to))
}

fn bump(counter: &mut usize) {
    *counter = counter.saturating_add(1);
}
