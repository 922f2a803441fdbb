//! Candidate filtering: resolve target state and apply the capture policy.
//!
//! Resolution asks the state query service for every candidate id, one page
//! of `query_limit` ids at a time, with all pages in flight together. An id
//! missing from a page that succeeded has never been claimed and gets a
//! synthesized default snapshot. A page that failed contributes nothing: its
//! ids are dropped for the cycle rather than mistaken for unclaimed assets.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use outpost_types::{AssetId, AssetSnapshot, AssetType};
use tracing::{debug, warn};

use crate::collaborators::{DefaultStateGenerator, StateQuery};
use crate::config::PlannerConfig;
use crate::discovery::CandidateMap;
use crate::error::QueryError;
use crate::index::LocationIndex;

/// Snapshots resolved for a set of candidate ids.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTargets {
    /// Snapshot per resolved id.
    pub snapshots: BTreeMap<AssetId, AssetSnapshot>,
    /// How many of them were synthesized.
    pub synthesized: usize,
    /// Ids dropped because their page failed.
    pub dropped: usize,
}

impl ResolvedTargets {
    /// Snapshot for `id`, if resolved.
    pub fn get(&self, id: &AssetId) -> Option<&AssetSnapshot> {
        self.snapshots.get(id)
    }

    /// Number of resolved ids.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Resolve the current snapshot of every id in `ids`.
pub async fn resolve_targets<S, G>(
    state: &S,
    generator: &G,
    index: &LocationIndex,
    ids: &[AssetId],
    limit: usize,
    call_timeout: Duration,
    now: DateTime<Utc>,
) -> ResolvedTargets
where
    S: StateQuery,
    G: DefaultStateGenerator,
{
    let pages: Vec<&[AssetId]> = ids.chunks(limit.max(1)).collect();
    let results = join_all(pages.iter().map(|page| async move {
        tokio::time::timeout(call_timeout, state.query_by_ids(page, limit))
            .await
            .unwrap_or(Err(QueryError::Timeout(call_timeout)))
    }))
    .await;

    let mut resolved = ResolvedTargets::default();
    for (page, result) in pages.into_iter().zip(results) {
        let returned = match result {
            Ok(returned) => returned,
            Err(err) => {
                warn!(ids = page.len(), error = %err, "target state page failed, dropping its ids");
                resolved.dropped = resolved.dropped.saturating_add(page.len());
                continue;
            }
        };

        let mut by_id: BTreeMap<AssetId, AssetSnapshot> = returned
            .into_iter()
            .map(|snapshot| (snapshot.id.clone(), snapshot))
            .collect();

        for id in page {
            if let Some(snapshot) = by_id.remove(id) {
                resolved.snapshots.insert(id.clone(), snapshot);
            } else if let Some(location) = index.get(id) {
                resolved
                    .snapshots
                    .insert(id.clone(), generator.default_snapshot(location, now));
                resolved.synthesized = resolved.synthesized.saturating_add(1);
            } else {
                debug!(target_id = %id, "candidate has neither state nor location");
            }
        }
    }
    resolved
}

/// Capture policy applied to resolved candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Types never attacked.
    pub excluded_types: Vec<AssetType>,
    /// Owned-count ceiling per target level; absent levels are unlimited.
    pub level_caps: BTreeMap<u32, usize>,
    /// Lowest target level relative to the source.
    pub levels_below: u32,
    /// Highest target level relative to the source.
    pub levels_above: u32,
}

impl From<&PlannerConfig> for FilterPolicy {
    fn from(config: &PlannerConfig) -> Self {
        Self {
            excluded_types: config.excluded_types.clone(),
            level_caps: config.level_caps.clone(),
            levels_below: config.levels_below,
            levels_above: config.levels_above,
        }
    }
}

impl FilterPolicy {
    /// Whether `target` is worth capturing at all, independent of the source.
    pub fn admits_target(&self, target: &AssetSnapshot, owned_by_level: &BTreeMap<u32, usize>) -> bool {
        if self.excluded_types.contains(&target.asset_type) {
            return false;
        }
        if !target.owner.is_unclaimed() {
            return false;
        }
        if let Some(&ceiling) = self.level_caps.get(&target.level) {
            let owned = owned_by_level.get(&target.level).copied().unwrap_or(0);
            if owned >= ceiling {
                return false;
            }
        }
        true
    }

    /// Whether `target` falls inside the level window of `source`.
    pub const fn in_level_window(&self, source: &AssetSnapshot, target: &AssetSnapshot) -> bool {
        let too_low = target.level.saturating_add(self.levels_below) < source.level;
        let too_high = target.level > source.level.saturating_add(self.levels_above);
        !too_low && !too_high
    }

    /// Filter every source's candidates. Sources whose snapshot is missing
    /// and candidates that were not resolved are dropped.
    pub fn apply(
        &self,
        candidates: &CandidateMap,
        sources: &BTreeMap<AssetId, &AssetSnapshot>,
        resolved: &ResolvedTargets,
        owned_by_level: &BTreeMap<u32, usize>,
    ) -> CandidateMap {
        let mut filtered = CandidateMap::new();
        for entry in candidates.iter() {
            let Some(source) = sources.get(&entry.source_id) else {
                continue;
            };
            let kept: Vec<AssetId> = entry
                .targets
                .iter()
                .filter(|id| {
                    resolved.get(id).is_some_and(|target| {
                        self.admits_target(target, owned_by_level)
                            && self.in_level_window(source, target)
                    })
                })
                .cloned()
                .collect();
            filtered.push(entry.source_id.clone(), kept);
        }
        filtered
    }
}

/// Count owned assets per level.
pub fn count_by_level(owned: &[AssetSnapshot]) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for asset in owned {
        let count: &mut usize = counts.entry(asset.level).or_default();
        *count = count.saturating_add(1);
    }
    counts
}
