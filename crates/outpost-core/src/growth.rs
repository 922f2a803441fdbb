//! Time-dependent resource model.
//!
//! Snapshots record the resource level observed at `last_updated`. The level
//! at any later instant follows a logistic curve toward the cap, with three
//! exceptions checked first: depleted assets stay at zero, unclaimed assets
//! do not grow, and reservoirs saturate at their cap instead of growing.

use chrono::{DateTime, Utc};
use outpost_types::{AssetSnapshot, AssetType};

/// Resource level of `snapshot` at instant `at`.
///
/// `at` earlier than `last_updated` is treated as zero elapsed time. The
/// result is always finite and non-negative for snapshots with a positive
/// cap.
pub fn resource_at(snapshot: &AssetSnapshot, at: DateTime<Utc>) -> f64 {
    let current = snapshot.resource_current;
    if current <= 0.0 {
        return 0.0;
    }
    if snapshot.owner.is_unclaimed() {
        return current;
    }
    if snapshot.asset_type == AssetType::Reservoir {
        return current.min(snapshot.resource_cap);
    }

    let elapsed = elapsed_seconds(snapshot.last_updated, at);
    logistic(current, snapshot.resource_cap, snapshot.resource_growth, elapsed)
}

/// Logistic growth from `current` toward `cap` after `elapsed` seconds.
fn logistic(current: f64, cap: f64, growth: f64, elapsed: f64) -> f64 {
    let decay = (-4.0 * growth * elapsed / cap).exp();
    let denom = decay.mul_add(cap / current - 1.0, 1.0);
    let level = cap / denom;
    if level.is_finite() { level.max(0.0) } else { current }
}

fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let millis = to.signed_duration_since(from).num_milliseconds().max(0);
    millis as f64 / 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::Duration;
    use outpost_types::{AssetId, Identity, Owner};

    use super::*;

    fn owned(current: f64, cap: f64, growth: f64) -> AssetSnapshot {
        AssetSnapshot {
            id: AssetId::new("aa"),
            owner: Owner::Identity(Identity::new("beef")),
            level: 1,
            asset_type: AssetType::Planet,
            defense: 100.0,
            resource_current: current,
            resource_cap: cap,
            resource_growth: growth,
            last_updated: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            range: 50.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn full_asset_stays_full() {
        let snapshot = owned(100.0, 100.0, 3.0);
        for secs in [0, 1, 60, 86_400, 10_000_000] {
            let at = snapshot.last_updated + Duration::seconds(secs);
            assert!(close(resource_at(&snapshot, at), 100.0));
        }
    }

    #[test]
    fn depleted_asset_stays_empty() {
        let snapshot = owned(0.0, 100.0, 3.0);
        for secs in [0, 1, 86_400] {
            let at = snapshot.last_updated + Duration::seconds(secs);
            assert_eq!(resource_at(&snapshot, at), 0.0);
        }
    }

    #[test]
    fn zero_elapsed_returns_current() {
        let snapshot = owned(37.5, 100.0, 3.0);
        assert!(close(resource_at(&snapshot, snapshot.last_updated), 37.5));
    }

    #[test]
    fn growth_is_monotonic_and_bounded() {
        let snapshot = owned(10.0, 100.0, 2.0);
        let mut previous = resource_at(&snapshot, snapshot.last_updated);
        for secs in [5, 10, 20, 40] {
            let level = resource_at(&snapshot, snapshot.last_updated + Duration::seconds(secs));
            assert!(level > previous);
            assert!(level <= 100.0);
            previous = level;
        }
    }

    #[test]
    fn unclaimed_assets_do_not_grow() {
        let mut snapshot = owned(10.0, 100.0, 2.0);
        snapshot.owner = Owner::Unclaimed;
        let at = snapshot.last_updated + Duration::seconds(10_000);
        assert_eq!(resource_at(&snapshot, at), 10.0);
    }

    #[test]
    fn reservoirs_saturate_at_cap() {
        let mut snapshot = owned(150.0, 100.0, 2.0);
        snapshot.asset_type = AssetType::Reservoir;
        let at = snapshot.last_updated + Duration::seconds(10_000);
        assert_eq!(resource_at(&snapshot, at), 100.0);

        snapshot.resource_current = 40.0;
        assert_eq!(resource_at(&snapshot, at), 40.0);
    }

    #[test]
    fn evaluation_before_observation_counts_as_zero_elapsed() {
        let snapshot = owned(20.0, 100.0, 2.0);
        let at = snapshot.last_updated - Duration::seconds(500);
        assert!(close(resource_at(&snapshot, at), 20.0));
    }
}
