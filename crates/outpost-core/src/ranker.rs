//! Greedy move selection.
//!
//! Each source with enough reserves picks its nearest surviving candidate.
//! Sources are handled independently: two sources may pick the same target
//! in one cycle, and no global assignment is attempted.

use chrono::{DateTime, Utc};
use outpost_types::{AssetId, AssetSnapshot, Move};
use tracing::debug;

use crate::config::PlannerConfig;
use crate::discovery::CandidateMap;
use crate::geometry::distance;
use crate::growth::resource_at;
use crate::index::LocationIndex;

/// Reserve and commitment policy for move selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRanker {
    reserve_threshold: f64,
    commit_fraction: f64,
}

impl MoveRanker {
    /// Create a ranker.
    ///
    /// A source must hold more than `reserve_threshold` of its cap to move and
    /// commits `commit_fraction` of what it holds.
    pub const fn new(reserve_threshold: f64, commit_fraction: f64) -> Self {
        Self {
            reserve_threshold,
            commit_fraction,
        }
    }

    /// Resource level of `source` at `at` if it may initiate a move.
    pub fn eligible(&self, source: &AssetSnapshot, at: DateTime<Utc>) -> Option<f64> {
        let level = resource_at(source, at);
        (level > self.reserve_threshold * source.resource_cap).then_some(level)
    }

    /// At most one move per source, in candidate-map order.
    pub fn rank(
        &self,
        sources: &[AssetSnapshot],
        filtered: &CandidateMap,
        index: &LocationIndex,
        at: DateTime<Utc>,
    ) -> Vec<Move> {
        let mut moves = Vec::new();
        for entry in filtered.iter() {
            let Some(source) = sources.iter().find(|s| s.id == entry.source_id) else {
                continue;
            };
            let Some(available) = self.eligible(source, at) else {
                debug!(source_id = %source.id, "reserves below threshold");
                continue;
            };
            let Some(origin) = index.get(&source.id) else {
                continue;
            };

            let mut best: Option<(f64, &AssetId)> = None;
            for target_id in &entry.targets {
                let Some(target) = index.get(target_id) else {
                    continue;
                };
                let d = distance(origin.coords, target.coords);
                if best.is_none_or(|(best_d, _)| d < best_d) {
                    best = Some((d, target_id));
                }
            }

            if let Some((d, target_id)) = best {
                debug!(source_id = %source.id, target_id = %target_id, distance = d, "nearest candidate selected");
                moves.push(Move {
                    source_id: source.id.clone(),
                    target_id: target_id.clone(),
                    resource_amount: available * self.commit_fraction,
                });
            }
        }
        moves
    }
}

impl From<&PlannerConfig> for MoveRanker {
    fn from(config: &PlannerConfig) -> Self {
        Self::new(config.reserve_threshold, config.commit_fraction)
    }
}

impl Default for MoveRanker {
    fn default() -> Self {
        Self::from(&PlannerConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use outpost_types::{AssetType, Coords, Identity, Location, Owner};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn owned(id: &str, current: f64, cap: f64) -> AssetSnapshot {
        AssetSnapshot {
            id: AssetId::new(id),
            owner: Owner::Identity(Identity::new("beef")),
            level: 3,
            asset_type: AssetType::Planet,
            defense: 100.0,
            resource_current: current,
            resource_cap: cap,
            resource_growth: 1.0,
            last_updated: now(),
            range: 50.0,
        }
    }

    fn ids(raw: &[&str]) -> Vec<AssetId> {
        raw.iter().map(|id| AssetId::new(*id)).collect()
    }

    fn index() -> LocationIndex {
        LocationIndex::from_locations(
            [
                ("a0", 0, 0),
                ("a1", 500, 500),
                ("b3", 30, 0),
                ("b1", 10, 0),
                ("b2", 0, 20),
                ("c1", 500, 510),
                ("c2", 490, 500),
            ]
            .into_iter()
            .map(|(id, x, y)| Location::new(id, Coords::new(x, y))),
            64,
        )
    }

    #[test]
    fn picks_the_nearest_candidate_per_source() {
        let sources = [owned("a0", 90.0, 100.0), owned("a1", 90.0, 100.0)];
        let mut filtered = CandidateMap::new();
        filtered.push(AssetId::new("a0"), ids(&["b3", "b1", "b2"]));
        filtered.push(AssetId::new("a1"), ids(&["c1"]));

        let moves = MoveRanker::default().rank(&sources, &filtered, &index(), now());

        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].source_id, AssetId::new("a0"));
        assert_eq!(moves[0].target_id, AssetId::new("b1"));
        assert_eq!(moves[0].resource_amount, 45.0);
        assert_eq!(moves[1].target_id, AssetId::new("c1"));
    }

    #[test]
    fn ties_go_to_the_first_seen_candidate() {
        let sources = [owned("a1", 90.0, 100.0)];
        let mut filtered = CandidateMap::new();
        filtered.push(AssetId::new("a1"), ids(&["c2", "c1"]));

        let moves = MoveRanker::default().rank(&sources, &filtered, &index(), now());
        assert_eq!(moves[0].target_id, AssetId::new("c2"));
    }

    #[test]
    fn half_full_source_does_not_move() {
        let sources = [owned("a0", 50.0, 100.0)];
        let mut filtered = CandidateMap::new();
        filtered.push(AssetId::new("a0"), ids(&["b1"]));

        assert!(MoveRanker::default().rank(&sources, &filtered, &index(), now()).is_empty());
    }

    #[test]
    fn threshold_is_exclusive() {
        let ranker = MoveRanker::default();
        assert_eq!(ranker.eligible(&owned("a0", 75.0, 100.0), now()), None);
        assert_eq!(ranker.eligible(&owned("a0", 80.0, 100.0), now()), Some(80.0));
    }

    #[test]
    fn sources_without_candidates_produce_nothing() {
        let sources = [owned("a0", 90.0, 100.0)];
        let moves = MoveRanker::default().rank(&sources, &CandidateMap::new(), &index(), now());
        assert!(moves.is_empty());
    }
}
