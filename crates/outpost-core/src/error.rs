//! Error types shared by the planner and its collaborators.
//!
//! Every variant is recoverable at the cycle boundary: query failures shrink
//! the data a cycle works with, build and executor failures free the affected
//! slot. None of them stop the orchestrator.

use std::time::Duration;

/// A world-index or state-query call failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// The remote service could not be reached or returned an error status.
    #[error("query transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("query decode error: {0}")]
    Decode(String),

    /// The call did not finish within its deadline.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

/// The proof/argument builder could not produce a payload.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    /// The builder rejected the input or failed internally.
    #[error("argument build failed: {0}")]
    Failed(String),

    /// A move endpoint has no known coordinates.
    #[error("no coordinates known for asset {0}")]
    MissingLocation(String),

    /// The build did not finish within its deadline.
    #[error("argument build timed out after {0:?}")]
    Timeout(Duration),
}

/// The transaction executor did not carry an action through.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    /// The executor refused the request or failed to submit it.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The executor reported a failure after submission.
    #[error("confirmation failed: {0}")]
    Confirmation(String),

    /// The executor dropped the handle without reporting an outcome.
    #[error("executor dropped the action without an outcome")]
    Dropped,

    /// Submission or confirmation did not finish within its deadline.
    #[error("executor timed out after {0:?}")]
    Timeout(Duration),
}

/// The pending-action journal could not be read or written.
#[derive(Debug, Clone, thiserror::Error)]
#[error("journal error: {0}")]
pub struct JournalError(pub String);
