//! Planning and dispatch engine for the Outpost capture planner.
//!
//! Every cycle the planner looks at the assets an identity controls, finds
//! the explored locations each of them can reach, keeps the ones worth
//! capturing, picks the nearest per source, and hands the resulting moves to
//! an executor while guaranteeing at most one action in flight per source.
//!
//! # Modules
//!
//! - [`growth`] -- Resource level of an asset at an arbitrary instant.
//! - [`geometry`] -- Distances and effective move range.
//! - [`index`] -- Explored locations with a grid for radius lookups.
//! - [`discovery`] -- Reachable candidates per owned asset.
//! - [`filter`] -- Target state resolution and the capture policy.
//! - [`ranker`] -- Greedy nearest-target move selection.
//! - [`dispatch`] -- The pending-action table and its lifecycle.
//! - [`cycle`] -- [`Orchestrator`], one full planning cycle.
//! - [`runner`] -- The interval loop around the orchestrator.
//! - [`collaborators`] -- Traits for the external services.
//! - [`cache`] -- LRU cache in front of an argument builder.
//! - [`defaults`] -- Game constants and synthesized unclaimed state.
//! - [`memory`] -- In-memory collaborators for tests and dry runs.
//! - [`config`] -- Configuration loading from `outpost-config.yaml`.
//! - [`error`] -- Collaborator error types.
//!
//! [`Orchestrator`]: cycle::Orchestrator

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod cycle;
pub mod defaults;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod growth;
pub mod index;
pub mod memory;
pub mod ranker;
pub mod runner;
