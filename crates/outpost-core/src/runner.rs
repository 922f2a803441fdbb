//! The cycle loop.
//!
//! Runs [`Orchestrator::run_cycle`] on a fixed interval until the cycle
//! limit is reached or a stop is requested through [`CycleControl`]. A
//! cycle that overruns its interval delays the next one rather than
//! triggering a burst of catch-up cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::collaborators::{
    ArgumentBuilder, DefaultStateGenerator, PendingJournal, StateQuery, TransactionExecutor,
    WorldIndex,
};
use crate::cycle::Orchestrator;

/// Reason why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEndReason {
    /// Reached the configured `max_cycles` limit.
    MaxCyclesReached,
    /// A stop was requested.
    StopRequested,
}

/// Totals over one run of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Why the loop ended.
    pub end_reason: RunEndReason,
    /// Cycles run.
    pub cycles: u64,
    /// Cycles that ended before planning.
    pub aborted_cycles: u64,
    /// Actions accepted by the executor.
    pub submitted: usize,
    /// Actions confirmed.
    pub confirmed: usize,
    /// Actions that failed after submission.
    pub failed: usize,
}

/// Shared stop switch for the loop.
#[derive(Debug, Default)]
pub struct CycleControl {
    stop_requested: AtomicBool,
    stop_notify: Notify,
}

impl CycleControl {
    /// Create a control with no stop pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop. A cycle already running is allowed to finish.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_one();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    async fn stopped(&self) {
        while !self.is_stop_requested() {
            self.stop_notify.notified().await;
        }
    }
}

/// Run cycles every `interval` until `max_cycles` have run (0 = unlimited)
/// or `control` requests a stop.
///
/// Outcomes delivered after the last cycle are applied before returning.
pub async fn run_cycles<W, S, G, B, E, J>(
    orchestrator: &mut Orchestrator<W, S, G, B, E, J>,
    control: &CycleControl,
    interval: Duration,
    max_cycles: u64,
) -> RunSummary
where
    W: WorldIndex,
    S: StateQuery,
    G: DefaultStateGenerator,
    B: ArgumentBuilder,
    E: TransactionExecutor,
    J: PendingJournal,
{
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut summary = RunSummary {
        end_reason: RunEndReason::StopRequested,
        cycles: 0,
        aborted_cycles: 0,
        submitted: 0,
        confirmed: 0,
        failed: 0,
    };

    info!(
        identity = %orchestrator.identity(),
        interval_ms = interval.as_millis(),
        max_cycles,
        "cycle loop starting"
    );

    loop {
        if control.is_stop_requested() {
            summary.end_reason = RunEndReason::StopRequested;
            break;
        }
        if max_cycles > 0 && summary.cycles >= max_cycles {
            summary.end_reason = RunEndReason::MaxCyclesReached;
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            () = control.stopped() => {
                summary.end_reason = RunEndReason::StopRequested;
                break;
            }
        }

        let report = orchestrator.run_cycle().await;
        summary.cycles = summary.cycles.saturating_add(1);
        if report.aborted.is_some() {
            summary.aborted_cycles = summary.aborted_cycles.saturating_add(1);
        }
        summary.submitted = summary.submitted.saturating_add(report.dispatch.submitted);
        summary.confirmed = summary.confirmed.saturating_add(report.reconciled.confirmed);
        summary.failed = summary.failed.saturating_add(report.reconciled.failed);
    }

    let drained = orchestrator.tracker_mut().reconcile(Utc::now()).await;
    summary.confirmed = summary.confirmed.saturating_add(drained.confirmed);
    summary.failed = summary.failed.saturating_add(drained.failed);

    info!(
        end_reason = ?summary.end_reason,
        cycles = summary.cycles,
        submitted = summary.submitted,
        confirmed = summary.confirmed,
        failed = summary.failed,
        in_flight = orchestrator.tracker().in_flight(),
        "cycle loop ended"
    );
    summary
}
