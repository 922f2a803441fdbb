//! In-memory collaborators.
//!
//! Used by the planner's own tests and by anyone who wants to drive a cycle
//! without a network: a world index over a location list, a state service
//! over a snapshot list, a builder that returns a fixed-shape payload, an
//! executor whose outcomes are scripted by the caller, and a journal held in
//! a map. All of them are cheap to clone and clones share state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use futures::future::BoxFuture;
use outpost_types::{
    ActionId, ActionRequest, AssetId, AssetSnapshot, Coords, Identity, Location, MoveProof,
};
use tokio::sync::oneshot;

use crate::collaborators::{
    ArgumentBuilder, ArgumentRequest, ExecutorHandle, JournalEntry, Page, PendingJournal,
    StateQuery, TransactionExecutor, WorldIndex,
};
use crate::error::{BuildError, ExecutorError, JournalError, QueryError};
use crate::index::{DEFAULT_CELL_SIZE, LocationIndex};

/// World index over a shared location list.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    locations: Arc<RwLock<Vec<Location>>>,
}

impl MemoryWorld {
    /// Create an index over `locations`, in discovery order.
    pub fn new(locations: Vec<Location>) -> Self {
        Self {
            locations: Arc::new(RwLock::new(locations)),
        }
    }

    /// Record a newly explored location.
    pub fn explore(&self, location: Location) {
        self.locations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(location);
    }
}

impl WorldIndex for MemoryWorld {
    async fn known_locations(&self) -> Result<LocationIndex, QueryError> {
        let locations = self
            .locations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(LocationIndex::from_locations(locations, DEFAULT_CELL_SIZE))
    }
}

#[derive(Debug, Default)]
struct StateInner {
    snapshots: Vec<AssetSnapshot>,
    world_radius: f64,
    fail_id_queries: bool,
    fail_owner_pages_from: Option<usize>,
    fail_world_radius: bool,
    id_queries: usize,
    owner_queries: usize,
}

/// State query service over a shared snapshot list.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    inner: Arc<RwLock<StateInner>>,
}

impl MemoryState {
    /// Create an empty service reporting `world_radius`.
    pub fn new(world_radius: f64) -> Self {
        let inner = StateInner {
            world_radius,
            ..StateInner::default()
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Insert or replace the snapshot of an asset.
    pub fn upsert(&self, snapshot: AssetSnapshot) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = inner.snapshots.iter_mut().find(|s| s.id == snapshot.id) {
            *existing = snapshot;
        } else {
            inner.snapshots.push(snapshot);
        }
    }

    /// Make every id query fail (or succeed again).
    pub fn fail_id_queries(&self, fail: bool) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_id_queries = fail;
    }

    /// Make owner pages starting at or past `skip` fail. `None` clears it.
    pub fn fail_owner_pages_from(&self, skip: Option<usize>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_owner_pages_from = skip;
    }

    /// Make world radius reads fail (or succeed again).
    pub fn fail_world_radius(&self, fail: bool) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_world_radius = fail;
    }

    /// Number of owner pages requested so far.
    pub fn owner_queries(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .owner_queries
    }

    /// Number of id queries served so far.
    pub fn id_queries(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .id_queries
    }
}

impl StateQuery for MemoryState {
    async fn query_by_owner(
        &self,
        owner: &Identity,
        page: Page,
    ) -> Result<Vec<AssetSnapshot>, QueryError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.owner_queries = inner.owner_queries.saturating_add(1);
        if inner.fail_owner_pages_from.is_some_and(|from| page.skip >= from) {
            return Err(QueryError::Transport(format!(
                "owner page at {} unavailable",
                page.skip
            )));
        }
        Ok(inner
            .snapshots
            .iter()
            .filter(|snapshot| snapshot.owner.is(owner))
            .skip(page.skip)
            .take(page.first)
            .cloned()
            .collect())
    }

    async fn query_by_ids(
        &self,
        ids: &[AssetId],
        limit: usize,
    ) -> Result<Vec<AssetSnapshot>, QueryError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.id_queries = inner.id_queries.saturating_add(1);
        if inner.fail_id_queries {
            return Err(QueryError::Transport("id queries disabled".to_owned()));
        }
        let wanted: BTreeSet<&AssetId> = ids.iter().collect();
        Ok(inner
            .snapshots
            .iter()
            .filter(|snapshot| wanted.contains(&snapshot.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn world_radius(&self) -> Result<f64, QueryError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if inner.fail_world_radius {
            return Err(QueryError::Transport("radius unavailable".to_owned()));
        }
        Ok(inner.world_radius)
    }
}

/// Builder returning a payload that echoes the request.
#[derive(Debug, Clone, Default)]
pub struct StaticBuilder {
    failing: Arc<BTreeSet<(i64, i64)>>,
    calls: Arc<AtomicUsize>,
}

impl StaticBuilder {
    /// A builder that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder that fails for moves towards any of `targets`.
    pub fn failing_for(targets: &[Coords]) -> Self {
        Self {
            failing: Arc::new(targets.iter().map(|c| (c.x, c.y)).collect()),
            calls: Arc::default(),
        }
    }

    /// Number of builds performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArgumentBuilder for StaticBuilder {
    async fn build(&self, request: ArgumentRequest) -> Result<MoveProof, BuildError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&(request.to.x, request.to.y)) {
            return Err(BuildError::Failed(format!(
                "no witness for {}",
                request.cache_key()
            )));
        }
        Ok(MoveProof {
            a: vec![request.from.x.to_string(), request.from.y.to_string()],
            b: vec![vec![request.to.x.to_string(), request.to.y.to_string()]],
            c: vec![request.world_radius.to_string()],
            inputs: vec![request.dist_max.to_string()],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Acceptance {
    Accept,
    Reject(String),
    Silent,
}

type Resolver = oneshot::Sender<Result<(), ExecutorError>>;

#[derive(Debug)]
struct ExecutorInner {
    acceptance: Acceptance,
    submissions: Vec<ActionRequest>,
    unresolved: BTreeMap<ActionId, Resolver>,
}

/// Executor whose confirmations are resolved by the caller.
#[derive(Debug, Clone)]
pub struct ScriptedExecutor {
    inner: Arc<RwLock<ExecutorInner>>,
}

impl ScriptedExecutor {
    fn with(acceptance: Acceptance) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ExecutorInner {
                acceptance,
                submissions: Vec::new(),
                unresolved: BTreeMap::new(),
            })),
        }
    }

    /// Acknowledges every submission immediately; confirmation waits for
    /// [`ScriptedExecutor::confirm`] or [`ScriptedExecutor::fail`].
    pub fn accepting() -> Self {
        Self::with(Acceptance::Accept)
    }

    /// Refuses every submission with `reason`.
    pub fn rejecting(reason: &str) -> Self {
        Self::with(Acceptance::Reject(reason.to_owned()))
    }

    /// Never acknowledges anything.
    pub fn silent() -> Self {
        Self::with(Acceptance::Silent)
    }

    /// Every request received, in order.
    pub fn submissions(&self) -> Vec<ActionRequest> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .submissions
            .clone()
    }

    /// Report success for `action_id`. Returns `false` if it is not awaiting
    /// confirmation.
    pub fn confirm(&self, action_id: ActionId) -> bool {
        self.resolve(action_id, Ok(()))
    }

    /// Report failure for `action_id`.
    pub fn fail(&self, action_id: ActionId, reason: &str) -> bool {
        self.resolve(
            action_id,
            Err(ExecutorError::Confirmation(reason.to_owned())),
        )
    }

    /// Confirm everything awaiting confirmation. Returns how many.
    pub fn confirm_all(&self) -> usize {
        let resolvers = std::mem::take(
            &mut self
                .inner
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .unresolved,
        );
        resolvers
            .into_values()
            .filter(|resolver| !resolver.is_closed())
            .map(|resolver| resolver.send(Ok(())))
            .filter(Result::is_ok)
            .count()
    }

    fn resolve(&self, action_id: ActionId, result: Result<(), ExecutorError>) -> bool {
        let resolver = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unresolved
            .remove(&action_id);
        resolver.is_some_and(|resolver| resolver.send(result).is_ok())
    }
}

impl TransactionExecutor for ScriptedExecutor {
    fn submit(&self, request: ActionRequest) -> ExecutorHandle {
        let action_id = request.action_id;
        let (tx, rx) = oneshot::channel();
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let inner = &mut *guard;
        inner.submissions.push(request);

        let submitted: BoxFuture<'static, Result<(), ExecutorError>> = match &inner.acceptance {
            Acceptance::Accept => {
                inner.unresolved.insert(action_id, tx);
                futures::future::ready(Ok(())).boxed()
            }
            Acceptance::Reject(reason) => {
                futures::future::ready(Err(ExecutorError::Rejected(reason.clone()))).boxed()
            }
            Acceptance::Silent => {
                inner.unresolved.insert(action_id, tx);
                futures::future::pending().boxed()
            }
        };
        let confirmed = async move { rx.await.unwrap_or(Err(ExecutorError::Dropped)) }.boxed();

        ExecutorHandle {
            action_id,
            submitted,
            confirmed,
        }
    }
}

/// Journal held in a shared map.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    entries: Arc<RwLock<BTreeMap<AssetId, JournalEntry>>>,
}

impl MemoryJournal {
    /// Insert an entry directly.
    pub fn insert(&self, entry: JournalEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.source_id.clone(), entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PendingJournal for MemoryJournal {
    async fn record(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        self.insert(entry.clone());
        Ok(())
    }

    async fn clear(&self, source_id: &AssetId) -> Result<(), JournalError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(source_id);
        Ok(())
    }

    async fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}
