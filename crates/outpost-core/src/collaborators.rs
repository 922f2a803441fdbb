//! Seams to the external services the planner depends on.
//!
//! The planner never talks to the network directly. Each cycle it reads the
//! explored map from a [`WorldIndex`], asset snapshots from a
//! [`StateQuery`], payloads from an [`ArgumentBuilder`], and hands finished
//! requests to a [`TransactionExecutor`]. Assets that were never claimed are
//! synthesized by a [`DefaultStateGenerator`], and in-flight actions can be
//! made durable through a [`PendingJournal`].
//!
//! The binary wires HTTP and Dragonfly implementations; tests use the
//! in-memory ones in [`crate::memory`].

use std::future::Future;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use outpost_types::{ActionId, ActionRequest, AssetId, AssetSnapshot, Coords, Identity, Location, MoveProof};
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, ExecutorError, JournalError, QueryError};
use crate::geometry;
use crate::index::LocationIndex;

/// Read access to the explored map.
pub trait WorldIndex: Send + Sync {
    /// Snapshot of every explored location, in discovery order.
    fn known_locations(&self) -> impl Future<Output = Result<LocationIndex, QueryError>> + Send;
}

/// One page of an owner query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of results.
    pub first: usize,
    /// Number of results to skip.
    pub skip: usize,
}

/// Read access to current asset state.
pub trait StateQuery: Send + Sync {
    /// Assets owned by `owner`, one page at a time.
    fn query_by_owner(
        &self,
        owner: &Identity,
        page: Page,
    ) -> impl Future<Output = Result<Vec<AssetSnapshot>, QueryError>> + Send;

    /// Snapshots for the given ids. Ids the service has never seen are
    /// simply absent from the result.
    fn query_by_ids(
        &self,
        ids: &[AssetId],
        limit: usize,
    ) -> impl Future<Output = Result<Vec<AssetSnapshot>, QueryError>> + Send;

    /// Current radius of the playable world.
    fn world_radius(&self) -> impl Future<Output = Result<f64, QueryError>> + Send;
}

/// Geometric input of a move payload.
///
/// Two requests with equal fields always yield the same payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgumentRequest {
    /// Source coordinates.
    pub from: Coords,
    /// Target coordinates.
    pub to: Coords,
    /// World radius, rounded to whole units.
    pub world_radius: u64,
    /// Distance between the endpoints, rounded up.
    pub dist_max: u64,
}

impl ArgumentRequest {
    /// Build a request for a move between two points.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(from: Coords, to: Coords, world_radius: f64) -> Self {
        let dist_max = geometry::distance(from, to).ceil();
        Self {
            from,
            to,
            world_radius: world_radius.max(0.0).round() as u64,
            dist_max: dist_max.max(0.0) as u64,
        }
    }

    /// Cache key in the form `x1-y1-x2-y2-r-distMax`.
    pub fn cache_key(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}-{}",
            self.from.x, self.from.y, self.to.x, self.to.y, self.world_radius, self.dist_max
        )
    }
}

/// Produces the proof payload a move call requires.
pub trait ArgumentBuilder: Send + Sync {
    /// Build the payload for `request`.
    fn build(
        &self,
        request: ArgumentRequest,
    ) -> impl Future<Output = Result<MoveProof, BuildError>> + Send;
}

/// Lifecycle of one submitted action.
///
/// `submitted` resolves when the executor has accepted the request;
/// `confirmed` resolves once the action has landed or failed for good.
pub struct ExecutorHandle {
    /// Action the handle belongs to.
    pub action_id: ActionId,
    /// Acceptance by the executor.
    pub submitted: BoxFuture<'static, Result<(), ExecutorError>>,
    /// Final confirmation.
    pub confirmed: BoxFuture<'static, Result<(), ExecutorError>>,
}

impl std::fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("action_id", &self.action_id)
            .finish_non_exhaustive()
    }
}

/// Submits signed actions to the game.
pub trait TransactionExecutor: Send + Sync {
    /// Hand `request` to the executor. Must not block.
    fn submit(&self, request: ActionRequest) -> ExecutorHandle;
}

/// Synthesizes the state of assets nobody has claimed yet.
pub trait DefaultStateGenerator: Send + Sync {
    /// Deterministic snapshot for an unclaimed asset at `location`.
    fn default_snapshot(&self, location: &Location, now: DateTime<Utc>) -> AssetSnapshot;
}

/// A pending action as persisted in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Source asset holding the slot.
    pub source_id: AssetId,
    /// Target of the move.
    pub target_id: AssetId,
    /// Action identifier handed to the executor.
    pub action_id: ActionId,
    /// Amount committed by the move.
    pub resource_amount: f64,
    /// After this instant a restored entry no longer blocks the source.
    pub expires_at: DateTime<Utc>,
}

/// Durable record of in-flight actions, used to avoid duplicate dispatch
/// after a restart.
pub trait PendingJournal: Send + Sync {
    /// Persist an entry, replacing any entry for the same source.
    fn record(&self, entry: &JournalEntry) -> impl Future<Output = Result<(), JournalError>> + Send;

    /// Remove the entry for `source_id`, if any.
    fn clear(&self, source_id: &AssetId) -> impl Future<Output = Result<(), JournalError>> + Send;

    /// All persisted entries.
    fn load(&self) -> impl Future<Output = Result<Vec<JournalEntry>, JournalError>> + Send;
}

/// Journal that remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJournal;

impl PendingJournal for NoJournal {
    async fn record(&self, _entry: &JournalEntry) -> Result<(), JournalError> {
        Ok(())
    }

    async fn clear(&self, _source_id: &AssetId) -> Result<(), JournalError> {
        Ok(())
    }

    async fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        Ok(Vec::new())
    }
}
