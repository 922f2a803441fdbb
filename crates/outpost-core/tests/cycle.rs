//! End-to-end planning cycles over the in-memory collaborators.
//!
//! The world is small: one owned asset at the origin and a handful of
//! unclaimed locations along the x axis, inside a world of radius 100.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::missing_panics_doc
)]

use chrono::{DateTime, Utc};
use outpost_core::collaborators::WorldIndex;
use outpost_core::config::OutpostConfig;
use outpost_core::cycle::{Collaborators, Orchestrator};
use outpost_core::defaults::ConstantsGenerator;
use outpost_core::dispatch::{DispatchSettings, DispatchTracker};
use outpost_core::error::QueryError;
use outpost_core::index::LocationIndex;
use outpost_core::memory::{MemoryState, MemoryWorld, ScriptedExecutor, StaticBuilder};
use outpost_types::{
    AssetId, AssetSnapshot, AssetType, Coords, Identity, Location, Owner, PendingState,
};

const PLAYER: &str = "beef";

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn snapshot(id: &str, owner: Owner, level: u32, current: f64, cap: f64) -> AssetSnapshot {
    AssetSnapshot {
        id: AssetId::new(id),
        owner,
        level,
        asset_type: AssetType::Planet,
        defense: 100.0,
        resource_current: current,
        resource_cap: cap,
        resource_growth: 1.0,
        last_updated: now(),
        range: 50.0,
    }
}

fn mine(id: &str, level: u32, current: f64) -> AssetSnapshot {
    snapshot(id, Owner::Identity(Identity::new(PLAYER)), level, current, 100.0)
}

fn unclaimed(id: &str, level: u32) -> AssetSnapshot {
    snapshot(id, Owner::Unclaimed, level, 10.0, 50.0)
}

/// Source `a0` at the origin, `b1` at (30, 0) and `b2` at (10, 0).
fn world() -> (MemoryWorld, MemoryState) {
    let world = MemoryWorld::new(vec![
        Location::new("a0", Coords::new(0, 0)),
        Location::new("b1", Coords::new(30, 0)),
        Location::new("b2", Coords::new(10, 0)),
    ]);
    let state = MemoryState::new(100.0);
    state.upsert(mine("a0", 3, 80.0));
    state.upsert(unclaimed("b1", 3));
    state.upsert(unclaimed("b2", 3));
    (world, state)
}

type Planner<W = MemoryWorld> =
    Orchestrator<W, MemoryState, ConstantsGenerator, StaticBuilder, ScriptedExecutor>;

fn planner<W: WorldIndex>(
    world: W,
    state: MemoryState,
    builder: StaticBuilder,
    executor: ScriptedExecutor,
) -> Planner<W> {
    let tracker = DispatchTracker::new(builder, executor, DispatchSettings::default());
    Orchestrator::new(
        Identity::new(PLAYER),
        &OutpostConfig::default(),
        Collaborators {
            world,
            state,
            generator: ConstantsGenerator::default(),
        },
        tracker,
    )
}

#[tokio::test]
async fn moves_half_the_reserves_to_the_nearest_candidate() {
    let (world, state) = world();
    let executor = ScriptedExecutor::accepting();
    let mut planner = planner(world, state, StaticBuilder::new(), executor.clone());

    let report = planner.run_cycle_at(now()).await;
    assert!(report.aborted.is_none());
    assert_eq!(report.owned, 1);
    assert_eq!(report.targets, 2);
    assert_eq!(report.filtered_pairs, 2);
    assert_eq!(report.moves.len(), 1);

    let planned = &report.moves[0];
    assert_eq!(planned.source_id, AssetId::new("a0"));
    assert_eq!(planned.target_id, AssetId::new("b2"));
    assert!((planned.resource_amount - 40.0).abs() < 1e-9);

    assert_eq!(report.dispatch.submitted, 1);
    assert_eq!(executor.submissions().len(), 1);
    assert_eq!(
        planner.tracker().get(&AssetId::new("a0")).map(|p| p.state),
        Some(PendingState::Submitted)
    );
}

#[tokio::test]
async fn in_flight_source_is_not_planned_again() {
    let (world, state) = world();
    let executor = ScriptedExecutor::accepting();
    let mut planner = planner(world, state.clone(), StaticBuilder::new(), executor.clone());

    planner.run_cycle_at(now()).await;
    let queries_after_first = state.id_queries();

    let report = planner.run_cycle_at(now()).await;
    assert_eq!(report.busy, 1);
    assert_eq!(report.sources, 0);
    assert!(report.moves.is_empty());
    assert_eq!(executor.submissions().len(), 1);
    assert_eq!(state.id_queries(), queries_after_first);
}

#[tokio::test]
async fn confirmed_source_becomes_eligible_again() {
    let (world, state) = world();
    let executor = ScriptedExecutor::accepting();
    let mut planner = planner(world, state, StaticBuilder::new(), executor.clone());

    planner.run_cycle_at(now()).await;
    assert_eq!(executor.confirm_all(), 1);
    assert_eq!(
        planner.tracker_mut().next_outcome().await,
        Some((AssetId::new("a0"), PendingState::Confirmed))
    );

    let report = planner.run_cycle_at(now()).await;
    assert_eq!(report.dispatch.submitted, 1);
    assert_eq!(executor.submissions().len(), 2);
}

#[tokio::test]
async fn build_failure_frees_the_source_for_the_next_cycle() {
    let (world, state) = world();
    let builder = StaticBuilder::failing_for(&[Coords::new(10, 0)]);
    let executor = ScriptedExecutor::accepting();
    let mut planner = planner(world, state, builder.clone(), executor.clone());

    let report = planner.run_cycle_at(now()).await;
    assert_eq!(report.dispatch.build_failed, 1);
    assert_eq!(planner.tracker().in_flight(), 0);

    let report = planner.run_cycle_at(now()).await;
    assert_eq!(report.busy, 0);
    assert_eq!(report.dispatch.build_failed, 1);
    assert_eq!(builder.calls(), 2);
    assert!(executor.submissions().is_empty());
}

#[tokio::test]
async fn rejected_submission_frees_the_source() {
    let (world, state) = world();
    let executor = ScriptedExecutor::rejecting("insufficient funds");
    let mut planner = planner(world, state, StaticBuilder::new(), executor.clone());

    let report = planner.run_cycle_at(now()).await;
    assert_eq!(report.dispatch.rejected, 1);
    assert_eq!(planner.tracker().in_flight(), 0);
}

#[tokio::test]
async fn source_at_half_capacity_stays_put() {
    let (world, state) = world();
    state.upsert(mine("a0", 3, 50.0));
    let executor = ScriptedExecutor::accepting();
    let mut planner = planner(world, state.clone(), StaticBuilder::new(), executor.clone());

    let report = planner.run_cycle_at(now()).await;
    assert_eq!(report.sources, 0);
    assert!(report.moves.is_empty());
    assert_eq!(state.id_queries(), 0);
    assert!(executor.submissions().is_empty());
}

#[tokio::test]
async fn failed_target_lookup_drops_candidates_instead_of_guessing() {
    let (world, state) = world();
    state.fail_id_queries(true);
    let executor = ScriptedExecutor::accepting();
    let mut planner = planner(world, state, StaticBuilder::new(), executor.clone());

    let report = planner.run_cycle_at(now()).await;
    assert!(report.aborted.is_none());
    assert_eq!(report.dropped, 2);
    assert_eq!(report.synthesized, 0);
    assert!(report.moves.is_empty());
    assert!(executor.submissions().is_empty());
}

#[tokio::test]
async fn never_claimed_targets_get_default_state() {
    let (world, state) = world();
    world.explore(Location::new("c1", Coords::new(0, 20)));
    let mut planner = planner(world, state, StaticBuilder::new(), ScriptedExecutor::accepting());

    let report = planner.run_cycle_at(now()).await;
    assert_eq!(report.targets, 3);
    assert_eq!(report.synthesized, 1);
    assert_eq!(report.dropped, 0);
}

#[tokio::test]
async fn claimed_targets_are_never_attacked() {
    let (world, state) = world();
    state.upsert(snapshot(
        "b2",
        Owner::Identity(Identity::new("cafe")),
        3,
        10.0,
        50.0,
    ));
    let mut planner = planner(world, state, StaticBuilder::new(), ScriptedExecutor::accepting());

    let report = planner.run_cycle_at(now()).await;
    assert_eq!(report.filtered_pairs, 1);
    assert_eq!(report.moves[0].target_id, AssetId::new("b1"));
}

#[tokio::test]
async fn level_cap_blocks_levels_already_owned_enough() {
    let (world, state) = world();
    state.upsert(mine("a0", 1, 80.0));
    state.upsert(unclaimed("b1", 1));
    state.upsert(unclaimed("b2", 1));
    let mut config = OutpostConfig::default();
    config.planner.level_caps = [(1, 1)].into_iter().collect();

    let tracker = DispatchTracker::new(
        StaticBuilder::new(),
        ScriptedExecutor::accepting(),
        DispatchSettings::default(),
    );
    let mut planner = Orchestrator::new(
        Identity::new(PLAYER),
        &config,
        Collaborators {
            world,
            state,
            generator: ConstantsGenerator::default(),
        },
        tracker,
    );

    let report = planner.run_cycle_at(now()).await;
    assert_eq!(report.targets, 2);
    assert_eq!(report.filtered_pairs, 0);
    assert!(report.moves.is_empty());
}

struct UnreachableWorld;

impl WorldIndex for UnreachableWorld {
    async fn known_locations(&self) -> Result<LocationIndex, QueryError> {
        Err(QueryError::Transport("connection refused".to_owned()))
    }
}

#[tokio::test]
async fn unreadable_world_ends_the_cycle_early() {
    let (_, state) = world();
    let executor = ScriptedExecutor::accepting();
    let mut planner = planner(UnreachableWorld, state, StaticBuilder::new(), executor.clone());

    let report = planner.run_cycle_at(now()).await;
    let reason = report.aborted.unwrap();
    assert!(reason.starts_with("world index"));
    assert!(report.moves.is_empty());
    assert!(executor.submissions().is_empty());
    assert_eq!(planner.cycles(), 1);
}

/// Three owned sources around the origin and one unclaimed target, planned
/// with owner pages of a single asset.
fn fleet(state: &MemoryState) -> Planner {
    let world = MemoryWorld::new(vec![
        Location::new("a0", Coords::new(0, 0)),
        Location::new("a1", Coords::new(0, 5)),
        Location::new("a2", Coords::new(0, -5)),
        Location::new("b2", Coords::new(10, 0)),
    ]);
    state.upsert(mine("a0", 3, 80.0));
    state.upsert(mine("a1", 3, 80.0));
    state.upsert(mine("a2", 3, 80.0));
    state.upsert(unclaimed("b2", 3));

    let mut config = OutpostConfig::default();
    config.planner.query_limit = 1;
    let tracker = DispatchTracker::new(
        StaticBuilder::new(),
        ScriptedExecutor::accepting(),
        DispatchSettings::default(),
    );
    Orchestrator::new(
        Identity::new(PLAYER),
        &config,
        Collaborators {
            world,
            state: state.clone(),
            generator: ConstantsGenerator::default(),
        },
        tracker,
    )
}

#[tokio::test]
async fn owned_assets_are_read_page_by_page() {
    let state = MemoryState::new(100.0);
    let mut planner = fleet(&state);

    let report = planner.run_cycle_at(now()).await;
    assert!(report.aborted.is_none());
    assert_eq!(report.owned, 3);
    // three full pages, then the short one that ends the walk
    assert_eq!(state.owner_queries(), 4);
    let sources: Vec<&str> = report.moves.iter().map(|m| m.source_id.as_str()).collect();
    assert_eq!(sources, vec!["a0", "a1", "a2"]);
    assert!(report.moves.iter().all(|m| m.target_id == AssetId::new("b2")));
    assert_eq!(report.dispatch.submitted, 3);
}

#[tokio::test]
async fn later_owner_page_failure_keeps_the_partial_list() {
    let state = MemoryState::new(100.0);
    let mut planner = fleet(&state);
    state.fail_owner_pages_from(Some(2));

    let report = planner.run_cycle_at(now()).await;
    assert!(report.aborted.is_none());
    assert_eq!(report.owned, 2);
    assert_eq!(state.owner_queries(), 3);
    assert_eq!(report.moves.len(), 2);
    assert_eq!(report.dispatch.submitted, 2);
}

#[tokio::test]
async fn first_owner_page_failure_ends_the_cycle_early() {
    let state = MemoryState::new(100.0);
    let mut planner = fleet(&state);
    state.fail_owner_pages_from(Some(0));

    let report = planner.run_cycle_at(now()).await;
    assert!(report.aborted.unwrap().starts_with("owned assets"));
    assert_eq!(report.owned, 0);
    assert!(report.moves.is_empty());
    assert_eq!(state.id_queries(), 0);
}

#[tokio::test]
async fn unreadable_world_radius_ends_the_cycle_early() {
    let (world, state) = world();
    state.fail_world_radius(true);
    let executor = ScriptedExecutor::accepting();
    let mut planner = planner(world, state.clone(), StaticBuilder::new(), executor.clone());

    let report = planner.run_cycle_at(now()).await;
    assert!(report.aborted.unwrap().starts_with("world radius"));
    assert!(executor.submissions().is_empty());

    state.fail_world_radius(false);
    let report = planner.run_cycle_at(now()).await;
    assert!(report.aborted.is_none());
    assert_eq!(report.dispatch.submitted, 1);
}
