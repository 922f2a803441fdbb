//! Capture agent entry point for the Outpost planner.
//!
//! Reads the explored map from `Dragonfly`, asset state from the GraphQL
//! indexer, move proofs from the prover, and submits moves through the
//! relay, one planning cycle at a time.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`OUTPOST_CONFIG`, default `outpost-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `Dragonfly`
//! 4. Build the HTTP collaborators and the argument cache
//! 5. Restore journaled actions, if the journal is enabled
//! 6. Run cycles until `max_cycles` or Ctrl-C
//! 7. Log the summary

mod error;
mod graph;
mod prover;
mod relay;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use outpost_core::cache::CachedArgumentBuilder;
use outpost_core::collaborators::PendingJournal;
use outpost_core::config::{LoggingConfig, OutpostConfig};
use outpost_core::cycle::{Collaborators, Orchestrator};
use outpost_core::defaults::ConstantsGenerator;
use outpost_core::dispatch::{DispatchSettings, DispatchTracker};
use outpost_core::runner::{CycleControl, RunSummary, run_cycles};
use outpost_db::{DragonflyJournal, DragonflyPool, DragonflyWorldIndex};
use outpost_types::Identity;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::AgentError;
use crate::graph::GraphStateQuery;
use crate::prover::ProverClient;
use crate::relay::{DEFAULT_POLL_INTERVAL, RelayExecutor};

/// Config file read when `OUTPOST_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "outpost-config.yaml";

type AgentCollaborators = Collaborators<DragonflyWorldIndex, GraphStateQuery, ConstantsGenerator>;
type AgentTracker<J> = DispatchTracker<CachedArgumentBuilder<ProverClient>, RelayExecutor, J>;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging, or any connection fails
/// during start-up.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path =
        std::env::var("OUTPOST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let config = OutpostConfig::load_or_default(Path::new(&config_path))?;

    init_logging(&config.logging);
    info!(config_path, "outpost-agent starting");

    let identity = config.identity().ok_or(AgentError::MissingIdentity)?;
    let infrastructure = &config.infrastructure;
    info!(
        identity = %identity,
        dragonfly_url = infrastructure.dragonfly_url,
        graph_url = infrastructure.graph_url,
        relay_url = infrastructure.relay_url,
        prover_url = infrastructure.prover_url,
        cycle_interval_ms = config.schedule.cycle_interval_ms,
        "configuration loaded"
    );

    let pool = DragonflyPool::connect(&infrastructure.dragonfly_url).await?;
    let call_timeout = config.dispatch.call_timeout();

    let collaborators = Collaborators {
        world: DragonflyWorldIndex::new(
            pool.clone(),
            &infrastructure.chunks_key,
            config.planner.grid_cell_size,
        ),
        state: GraphStateQuery::new(
            &infrastructure.graph_url,
            &infrastructure.relay_url,
            call_timeout,
        )?,
        generator: ConstantsGenerator::new(config.constants.clone()),
    };
    let builder = CachedArgumentBuilder::new(
        ProverClient::new(&infrastructure.prover_url, call_timeout)?,
        config.dispatch.argument_cache_size,
    );
    let executor = RelayExecutor::new(&infrastructure.relay_url, call_timeout, DEFAULT_POLL_INTERVAL)?;
    let settings = DispatchSettings::from(&config.dispatch);

    let summary = if config.dispatch.journal_enabled {
        let journal = DragonflyJournal::new(pool, &infrastructure.journal_key);
        info!(journal_key = journal.key(), "pending-action journal enabled");
        let tracker = DispatchTracker::with_journal(builder, executor, journal, settings);
        run(identity, &config, collaborators, tracker).await
    } else {
        let tracker = DispatchTracker::new(builder, executor, settings);
        run(identity, &config, collaborators, tracker).await
    };

    info!(
        end_reason = ?summary.end_reason,
        cycles = summary.cycles,
        aborted_cycles = summary.aborted_cycles,
        submitted = summary.submitted,
        confirmed = summary.confirmed,
        failed = summary.failed,
        "outpost-agent stopped"
    );
    Ok(())
}

/// Restore journaled actions, then run cycles until stopped.
async fn run<J: PendingJournal>(
    identity: Identity,
    config: &OutpostConfig,
    collaborators: AgentCollaborators,
    tracker: AgentTracker<J>,
) -> RunSummary {
    let mut orchestrator = Orchestrator::new(identity, config, collaborators, tracker);
    let restored = orchestrator.tracker_mut().restore(Utc::now()).await;
    if restored > 0 {
        info!(restored, "pending actions restored from journal");
    }

    let control = Arc::new(CycleControl::new());
    let signal_control = Arc::clone(&control);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current cycle");
            signal_control.request_stop();
        }
    });

    let summary = run_cycles(
        &mut orchestrator,
        &control,
        config.schedule.cycle_interval(),
        config.schedule.max_cycles,
    )
    .await;

    let cache = orchestrator.tracker().builder();
    info!(
        hits = cache.hits(),
        misses = cache.misses(),
        entries = cache.len().await,
        "argument cache"
    );
    summary
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured
/// level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
