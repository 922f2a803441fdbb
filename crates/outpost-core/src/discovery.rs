//! Candidate discovery: which explored locations each owned asset can reach.
//!
//! Reach is evaluated at a fixed commitment percentage rather than the amount
//! actually sent, so discovery does not depend on resource state and its
//! result only changes when the map, the owned set, or the world radius do.

use std::collections::BTreeSet;

use outpost_types::{AssetId, AssetSnapshot, Coords, Location};
use tracing::debug;

use crate::geometry::{distance, distance_from_origin, effective_range};
use crate::index::LocationIndex;

/// Targets within reach of one source, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidates {
    /// Owned asset the move would start from.
    pub source_id: AssetId,
    /// Reachable target ids, ordered as first seen in the location index.
    pub targets: Vec<AssetId>,
}

/// Per-source candidate lists, in owned-asset order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateMap {
    entries: Vec<SourceCandidates>,
}

impl CandidateMap {
    /// Create an empty map.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append the candidate list for a source. Empty lists are not stored.
    pub fn push(&mut self, source_id: AssetId, targets: Vec<AssetId>) {
        if !targets.is_empty() {
            self.entries.push(SourceCandidates { source_id, targets });
        }
    }

    /// Candidates of `source_id`; empty if it has none.
    pub fn targets(&self, source_id: &AssetId) -> &[AssetId] {
        self.entries
            .iter()
            .find(|entry| &entry.source_id == source_id)
            .map(|entry| entry.targets.as_slice())
            .unwrap_or_default()
    }

    /// Keep only the sources for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&AssetId) -> bool) {
        self.entries.retain(|entry| keep(&entry.source_id));
    }

    /// Iterate over sources and their candidates.
    pub fn iter(&self) -> impl Iterator<Item = &SourceCandidates> {
        self.entries.iter()
    }

    /// Every distinct target id across all sources, first-seen order.
    pub fn all_targets(&self) -> Vec<AssetId> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .flat_map(|entry| entry.targets.iter())
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }

    /// Number of sources with at least one candidate.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no source has a candidate.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of (source, target) pairs.
    pub fn pair_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.targets.len()).sum()
    }
}

/// Find, for each owned asset, the explored locations it can reach.
///
/// Owned assets without a known location or outside `world_radius` are
/// skipped. A location is a candidate for a source when it lies inside
/// `world_radius`, is not one of the owned assets, and is strictly closer
/// than the source's effective range at `commit_percent`.
pub fn discover(
    owned: &[AssetSnapshot],
    index: &LocationIndex,
    world_radius: f64,
    commit_percent: f64,
) -> CandidateMap {
    let owned_ids: BTreeSet<&AssetId> = owned.iter().map(|asset| &asset.id).collect();
    let mut candidates = CandidateMap::new();

    for source in owned {
        let Some(origin) = index.get(&source.id) else {
            debug!(source_id = %source.id, "owned asset has no explored location");
            continue;
        };
        if !inside(origin.coords, world_radius) {
            debug!(source_id = %source.id, "owned asset lies outside the world radius");
            continue;
        }

        let reach = effective_range(source.range, commit_percent);
        if reach <= 0.0 {
            continue;
        }

        let targets: Vec<AssetId> = index
            .near(origin.coords, reach)
            .into_iter()
            .filter(|target| !owned_ids.contains(&target.id))
            .filter(|target| inside(target.coords, world_radius))
            .filter(|target| in_reach(origin, target, reach))
            .map(|target| target.id.clone())
            .collect();

        candidates.push(source.id.clone(), targets);
    }

    candidates
}

fn inside(coords: Coords, world_radius: f64) -> bool {
    distance_from_origin(coords) <= world_radius
}

fn in_reach(origin: &Location, target: &Location, reach: f64) -> bool {
    distance(origin.coords, target.coords) < reach
}
