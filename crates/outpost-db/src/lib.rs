//! Storage layer for the Outpost capture planner (`Dragonfly`).
//!
//! The planner reads the explored map that the explorer writes to
//! `Dragonfly` and, when enabled, keeps its in-flight actions there so a
//! restart does not dispatch them twice.
//!
//! # Modules
//!
//! - [`dragonfly`] -- Connection handle and typed list/hash operations
//! - [`world_index`] -- [`WorldIndex`] over the explored-chunk list
//! - [`journal`] -- [`PendingJournal`] over a hash of pending actions
//! - [`error`] -- Shared error type
//!
//! [`WorldIndex`]: outpost_core::collaborators::WorldIndex
//! [`PendingJournal`]: outpost_core::collaborators::PendingJournal

pub mod dragonfly;
pub mod error;
pub mod journal;
pub mod world_index;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use journal::DragonflyJournal;
pub use world_index::{DragonflyWorldIndex, index_from_chunks};
