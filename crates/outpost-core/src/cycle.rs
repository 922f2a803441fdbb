//! One planning cycle: discovery, filtering, ranking, and dispatch.
//!
//! Each cycle starts by applying the executor outcomes delivered since the
//! previous one, then takes a single snapshot of the world (explored map,
//! owned assets, world radius) and plans every move from it. Nothing is
//! re-read mid-cycle. External failures never propagate: a failed snapshot
//! read ends the cycle early, a failed target lookup shrinks the candidate
//! set, and dispatch failures free the affected slots.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use outpost_types::{AssetId, AssetSnapshot, Identity, Move};
use tracing::{debug, info, warn};

use crate::collaborators::{
    ArgumentBuilder, DefaultStateGenerator, NoJournal, Page, PendingJournal, StateQuery,
    TransactionExecutor, WorldIndex,
};
use crate::config::OutpostConfig;
use crate::discovery::discover;
use crate::dispatch::{DispatchReport, DispatchTracker, ReconcileReport};
use crate::error::QueryError;
use crate::filter::{FilterPolicy, count_by_level, resolve_targets};
use crate::ranker::MoveRanker;

/// Read-side collaborators of the orchestrator.
#[derive(Debug, Clone)]
pub struct Collaborators<W, S, G> {
    /// Explored map.
    pub world: W,
    /// Asset state.
    pub state: S,
    /// Default state of never-claimed assets.
    pub generator: G,
}

/// What happened during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Instant the cycle planned against.
    pub started_at: DateTime<Utc>,
    /// Outcomes applied before planning.
    pub reconciled: ReconcileReport,
    /// Owned assets returned by the state service.
    pub owned: usize,
    /// Owned assets skipped because they already have an action in flight.
    pub busy: usize,
    /// Sources that had at least one reachable candidate.
    pub sources: usize,
    /// Distinct candidate targets looked up.
    pub targets: usize,
    /// Candidate targets with no recorded state, given default state.
    pub synthesized: usize,
    /// Candidate targets dropped because their lookup failed.
    pub dropped: usize,
    /// (source, target) pairs left after filtering.
    pub filtered_pairs: usize,
    /// Moves selected by the ranker.
    pub moves: Vec<Move>,
    /// What dispatch did with them.
    pub dispatch: DispatchReport,
    /// Why the cycle ended before planning, if it did.
    pub aborted: Option<String>,
}

impl CycleReport {
    fn new(cycle: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            started_at,
            reconciled: ReconcileReport::default(),
            owned: 0,
            busy: 0,
            sources: 0,
            targets: 0,
            synthesized: 0,
            dropped: 0,
            filtered_pairs: 0,
            moves: Vec::new(),
            dispatch: DispatchReport::default(),
            aborted: None,
        }
    }
}

/// Drives planning cycles for one identity.
pub struct Orchestrator<W, S, G, B, E, J = NoJournal> {
    identity: Identity,
    collaborators: Collaborators<W, S, G>,
    tracker: DispatchTracker<B, E, J>,
    policy: FilterPolicy,
    ranker: MoveRanker,
    commit_percent: f64,
    query_limit: usize,
    call_timeout: Duration,
    cycles: u64,
}

impl<W, S, G, B, E, J> Orchestrator<W, S, G, B, E, J>
where
    W: WorldIndex,
    S: StateQuery,
    G: DefaultStateGenerator,
    B: ArgumentBuilder,
    E: TransactionExecutor,
    J: PendingJournal,
{
    /// Create an orchestrator playing for `identity` with the planner and
    /// dispatch settings from `config`.
    pub fn new(
        identity: Identity,
        config: &OutpostConfig,
        collaborators: Collaborators<W, S, G>,
        tracker: DispatchTracker<B, E, J>,
    ) -> Self {
        Self {
            identity,
            collaborators,
            tracker,
            policy: FilterPolicy::from(&config.planner),
            ranker: MoveRanker::from(&config.planner),
            commit_percent: config.planner.commit_percent,
            query_limit: config.planner.query_limit.max(1),
            call_timeout: config.dispatch.call_timeout(),
            cycles: 0,
        }
    }

    /// The identity being played.
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The dispatch tracker.
    pub const fn tracker(&self) -> &DispatchTracker<B, E, J> {
        &self.tracker
    }

    /// The dispatch tracker, mutably.
    pub const fn tracker_mut(&mut self) -> &mut DispatchTracker<B, E, J> {
        &mut self.tracker
    }

    /// Number of cycles run so far.
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one cycle against the current time.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle, evaluating resource growth at `now`.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> CycleReport {
        self.cycles = self.cycles.saturating_add(1);
        let mut report = CycleReport::new(self.cycles, now);
        report.reconciled = self.tracker.reconcile(now).await;

        let deadline = self.call_timeout;
        let (index, owned, radius) = tokio::join!(
            bounded(deadline, self.collaborators.world.known_locations()),
            self.fetch_owned(),
            bounded(deadline, self.collaborators.state.world_radius()),
        );
        let index = match index {
            Ok(index) => index,
            Err(err) => return abort(report, "world index", &err),
        };
        let owned = match owned {
            Ok(owned) => owned,
            Err(err) => return abort(report, "owned assets", &err),
        };
        let radius = match radius {
            Ok(radius) => radius,
            Err(err) => return abort(report, "world radius", &err),
        };
        report.owned = owned.len();

        let mut candidates = discover(&owned, &index, radius, self.commit_percent);
        let tracker = &self.tracker;
        let ranker = &self.ranker;
        let mut busy = 0usize;
        candidates.retain(|source_id| {
            if tracker.is_busy(source_id) {
                busy = busy.saturating_add(1);
                return false;
            }
            owned
                .iter()
                .find(|asset| &asset.id == source_id)
                .is_some_and(|asset| ranker.eligible(asset, now).is_some())
        });
        report.busy = busy;
        report.sources = candidates.len();

        let targets = candidates.all_targets();
        report.targets = targets.len();
        let resolved = resolve_targets(
            &self.collaborators.state,
            &self.collaborators.generator,
            &index,
            &targets,
            self.query_limit,
            deadline,
            now,
        )
        .await;
        report.synthesized = resolved.synthesized;
        report.dropped = resolved.dropped;

        let owned_by_level = count_by_level(&owned);
        let sources: BTreeMap<AssetId, &AssetSnapshot> =
            owned.iter().map(|asset| (asset.id.clone(), asset)).collect();
        let filtered = self
            .policy
            .apply(&candidates, &sources, &resolved, &owned_by_level);
        report.filtered_pairs = filtered.pair_count();

        let moves = self.ranker.rank(&owned, &filtered, &index, now);
        report.dispatch = self
            .tracker
            .dispatch(moves.clone(), &index, radius, now)
            .await;
        report.moves = moves;

        info!(
            cycle = report.cycle,
            owned = report.owned,
            sources = report.sources,
            targets = report.targets,
            moves = report.moves.len(),
            submitted = report.dispatch.submitted,
            in_flight = self.tracker.in_flight(),
            "cycle complete"
        );
        report
    }

    /// Every owned asset, fetched one page at a time.
    ///
    /// A failure after the first page keeps what was fetched so far.
    async fn fetch_owned(&self) -> Result<Vec<AssetSnapshot>, QueryError> {
        let mut owned: Vec<AssetSnapshot> = Vec::new();
        loop {
            let page = Page {
                first: self.query_limit,
                skip: owned.len(),
            };
            let batch = match bounded(
                self.call_timeout,
                self.collaborators
                    .state
                    .query_by_owner(&self.identity, page),
            )
            .await
            {
                Ok(batch) => batch,
                Err(err) if owned.is_empty() => return Err(err),
                Err(err) => {
                    warn!(fetched = owned.len(), error = %err, "owned asset page failed, continuing with partial list");
                    break;
                }
            };
            let last = batch.len() < self.query_limit;
            owned.extend(batch);
            if last {
                break;
            }
            debug!(fetched = owned.len(), "fetching next page of owned assets");
        }
        Ok(owned)
    }
}

async fn bounded<T>(
    deadline: Duration,
    call: impl Future<Output = Result<T, QueryError>>,
) -> Result<T, QueryError> {
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or(Err(QueryError::Timeout(deadline)))
}

fn abort(mut report: CycleReport, stage: &str, err: &QueryError) -> CycleReport {
    warn!(cycle = report.cycle, stage, error = %err, "cycle ended early");
    report.aborted = Some(format!("{stage}: {err}"));
    report
}
