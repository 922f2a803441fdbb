//! Distance and range calculations on the game plane.

use outpost_types::Coords;

/// Commitments below this percentage cannot reach anything.
pub const MIN_REACH_PERCENT: f64 = 5.0;

/// Euclidean distance between two points.
pub fn distance(a: Coords, b: Coords) -> f64 {
    let dx = a.x.saturating_sub(b.x) as f64;
    let dy = a.y.saturating_sub(b.y) as f64;
    dx.hypot(dy)
}

/// Distance of a point from the world origin.
pub fn distance_from_origin(point: Coords) -> f64 {
    distance(point, Coords::ORIGIN)
}

/// Maximum distance an asset with base range `base_range` can reach when
/// committing `percent_committed` percent of its resources.
///
/// Zero for no commitment and for commitments at or below
/// [`MIN_REACH_PERCENT`]; grows with the base-2 logarithm above that.
pub fn effective_range(base_range: f64, percent_committed: f64) -> f64 {
    if percent_committed <= 0.0 {
        return 0.0;
    }
    (percent_committed / MIN_REACH_PERCENT).log2().max(0.0) * base_range
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric_and_zero_on_equal_points() {
        let a = Coords::new(3, -4);
        let b = Coords::new(-9, 12);
        assert_eq!(distance(a, b), distance(b, a));
        assert_eq!(distance(a, a), 0.0);
        assert_eq!(distance_from_origin(a), 5.0);
        assert_eq!(distance(a, b), 20.0);
    }

    #[test]
    fn no_commitment_has_no_range() {
        assert_eq!(effective_range(80.0, 0.0), 0.0);
        assert_eq!(effective_range(80.0, 3.0), 0.0);
        assert_eq!(effective_range(80.0, 5.0), 0.0);
    }

    #[test]
    fn range_doubles_per_commitment_doubling() {
        assert_eq!(effective_range(80.0, 10.0), 80.0);
        assert_eq!(effective_range(80.0, 20.0), 160.0);
        assert_eq!(effective_range(80.0, 40.0), 240.0);
    }

    #[test]
    fn half_commitment_scales_by_log2_of_ten() {
        let range = effective_range(50.0, 50.0);
        assert!((range - 50.0 * 10f64.log2()).abs() < 1e-9);
    }

    #[test]
    fn range_is_monotonic_above_threshold() {
        let mut previous = 0.0;
        for percent in [5.0, 6.0, 12.5, 25.0, 50.0, 75.0, 100.0] {
            let range = effective_range(30.0, percent);
            assert!(range >= previous);
            previous = range;
        }
    }
}
