//! Shared type definitions for the Outpost capture planner.
//!
//! This crate is the single source of truth for the data exchanged between
//! the planner, its storage layer, and the agent binary.
//!
//! # Modules
//!
//! - [`ids`] -- Asset, identity, and action identifiers
//! - [`location`] -- Coordinates and discovered locations
//! - [`asset`] -- Asset snapshots, owners, asset and space types
//! - [`actions`] -- Moves, pending states, and executor payloads

pub mod actions;
pub mod asset;
pub mod ids;
pub mod location;

// Re-export all public types at crate root for convenience.
pub use actions::{
    ActionMethod, ActionRequest, CONTRACT_PRECISION, Move, MoveArgs, MoveProof, PendingState,
    to_contract_units,
};
pub use asset::{AssetSnapshot, AssetType, EMPTY_ADDRESS, Owner, SpaceType};
pub use ids::{ActionId, AssetId, Identity};
pub use location::{Coords, Location};
