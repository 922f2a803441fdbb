//! Moves, pending-action states, and executor request payloads.

use serde::{Deserialize, Serialize};

use crate::ids::{ActionId, AssetId};

/// Fixed-point precision the game uses for resource amounts on the wire.
pub const CONTRACT_PRECISION: f64 = 1000.0;

/// A planned capture: send part of a source's resources to a target.
///
/// At most one `Move` references a given source per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// Owned asset the resources leave from.
    pub source_id: AssetId,
    /// Asset being captured.
    pub target_id: AssetId,
    /// Amount of resource committed.
    pub resource_amount: f64,
}

/// Lifecycle state of a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    /// Selected; argument build in flight.
    Queued,
    /// Accepted by the executor; awaiting confirmation.
    Submitted,
    /// Executor reported success (terminal).
    Confirmed,
    /// Rejected, timed out, or failed to confirm (terminal).
    Failed,
    /// Reloaded from the journal after a restart; blocks the slot until it
    /// expires.
    Restored,
}

impl PendingState {
    /// Lowercase name for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Restored => "restored",
        }
    }
}

/// Argument payload produced by the proof builder for a move.
///
/// Opaque to the planner; passed through to the executor unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveProof {
    /// Proof point A.
    pub a: Vec<String>,
    /// Proof point B.
    pub b: Vec<Vec<String>>,
    /// Proof point C.
    pub c: Vec<String>,
    /// Public signals, in circuit order.
    pub inputs: Vec<String>,
}

/// Contract method invoked by an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMethod {
    /// Send resources from one asset to another.
    Move,
}

/// Arguments of a move call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveArgs {
    /// Proof payload.
    pub proof: MoveProof,
    /// Resource amount in contract precision.
    pub resource_units: u64,
}

/// Request handed to the transaction executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Locally generated action identifier.
    pub action_id: ActionId,
    /// Contract the call is addressed to.
    pub target: String,
    /// Contract method.
    pub method: ActionMethod,
    /// Call arguments.
    pub args: MoveArgs,
}

/// Convert a resource amount into contract precision, flooring.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_contract_units(amount: f64) -> u64 {
    if amount.is_finite() && amount > 0.0 {
        (amount * CONTRACT_PRECISION).floor() as u64
    } else {
        0
    }
}
