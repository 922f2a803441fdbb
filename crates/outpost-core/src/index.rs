//! In-memory snapshot of the world index.
//!
//! A [`LocationIndex`] holds every explored location in discovery order and
//! buckets them into a square grid so that range queries only touch nearby
//! cells. The grid is purely an accelerator: [`LocationIndex::near`] returns
//! a superset of the locations within the radius, always in discovery order,
//! and callers apply the exact distance test themselves.

use std::collections::BTreeMap;

use outpost_types::{AssetId, Coords, Location};

/// Default grid cell side length, matching the explorer's chunk size.
pub const DEFAULT_CELL_SIZE: u32 = 256;

/// Explored locations indexed by id and by grid cell.
#[derive(Debug, Clone)]
pub struct LocationIndex {
    /// Locations in discovery order.
    locations: Vec<Location>,
    /// Position in `locations` for each id.
    by_id: BTreeMap<AssetId, usize>,
    /// Positions in `locations` per grid cell, ascending.
    cells: BTreeMap<(i64, i64), Vec<usize>>,
    /// Side length of a grid cell.
    cell_size: i64,
}

impl LocationIndex {
    /// Create an empty index with the given grid cell size.
    ///
    /// A cell size of zero falls back to [`DEFAULT_CELL_SIZE`].
    pub fn new(cell_size: u32) -> Self {
        let cell_size = if cell_size == 0 {
            DEFAULT_CELL_SIZE
        } else {
            cell_size
        };
        Self {
            locations: Vec::new(),
            by_id: BTreeMap::new(),
            cells: BTreeMap::new(),
            cell_size: i64::from(cell_size),
        }
    }

    /// Build an index from locations in discovery order.
    ///
    /// Later duplicates of an id are ignored.
    pub fn from_locations(locations: impl IntoIterator<Item = Location>, cell_size: u32) -> Self {
        let mut index = Self::new(cell_size);
        for location in locations {
            index.insert(location);
        }
        index
    }

    /// Add a location. Returns `false` if the id was already present.
    pub fn insert(&mut self, location: Location) -> bool {
        if self.by_id.contains_key(&location.id) {
            return false;
        }
        let position = self.locations.len();
        self.by_id.insert(location.id.clone(), position);
        self.cells
            .entry(self.cell_of(location.coords))
            .or_default()
            .push(position);
        self.locations.push(location);
        true
    }

    /// Look up a location by id.
    pub fn get(&self, id: &AssetId) -> Option<&Location> {
        self.by_id
            .get(id)
            .and_then(|&position| self.locations.get(position))
    }

    /// Whether the id has been explored.
    pub fn contains(&self, id: &AssetId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of known locations.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether no location is known.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Iterate over all locations in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    /// Locations in every grid cell touched by the square around `center`
    /// with half-side `radius`, in discovery order.
    ///
    /// The result contains every location within `radius` of `center` and
    /// possibly some farther ones.
    pub fn near(&self, center: Coords, radius: f64) -> Vec<&Location> {
        if !radius.is_finite() {
            return self.locations.iter().collect();
        }
        let reach = radius.max(0.0).ceil();
        let (min_x, min_y) = self.cell_of(offset(center, -reach));
        let (max_x, max_y) = self.cell_of(offset(center, reach));

        let span_x = max_x.saturating_sub(min_x).saturating_add(1);
        let span_y = max_y.saturating_sub(min_y).saturating_add(1);
        let span = span_x.saturating_mul(span_y);

        let mut positions: Vec<usize> = Vec::new();
        let sparse = !matches!(usize::try_from(span), Ok(span) if span <= self.cells.len());
        if sparse {
            for (&(cx, cy), bucket) in &self.cells {
                if (min_x..=max_x).contains(&cx) && (min_y..=max_y).contains(&cy) {
                    positions.extend_from_slice(bucket);
                }
            }
        } else {
            for cx in min_x..=max_x {
                for cy in min_y..=max_y {
                    if let Some(bucket) = self.cells.get(&(cx, cy)) {
                        positions.extend_from_slice(bucket);
                    }
                }
            }
        }
        positions.sort_unstable();
        positions
            .into_iter()
            .filter_map(|position| self.locations.get(position))
            .collect()
    }

    const fn cell_of(&self, coords: Coords) -> (i64, i64) {
        (
            coords.x.div_euclid(self.cell_size),
            coords.y.div_euclid(self.cell_size),
        )
    }
}

impl Default for LocationIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn offset(center: Coords, delta: f64) -> Coords {
    let delta = delta.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
    Coords::new(
        center.x.saturating_add(delta),
        center.y.saturating_add(delta),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(id: &str, x: i64, y: i64) -> Location {
        Location::new(id, Coords::new(x, y))
    }

    #[test]
    fn duplicates_keep_first_discovery() {
        let index = LocationIndex::from_locations(
            vec![loc("01", 1, 1), loc("02", 2, 2), loc("01", 9, 9)],
            16,
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&AssetId::new("01")).map(|l| l.coords), Some(Coords::new(1, 1)));
    }

    #[test]
    fn near_returns_discovery_order_across_cells() {
        let index = LocationIndex::from_locations(
            vec![
                loc("0a", 40, 0),
                loc("0b", -5, -5),
                loc("0c", 1000, 1000),
                loc("0d", 3, 3),
            ],
            16,
        );
        let ids: Vec<&str> = index
            .near(Coords::ORIGIN, 40.0)
            .into_iter()
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(ids, vec!["0a", "0b", "0d"]);
    }

    #[test]
    fn near_with_huge_radius_scans_occupied_cells() {
        let index = LocationIndex::from_locations(
            vec![loc("0a", -100_000, 0), loc("0b", 100_000, 0)],
            1,
        );
        assert_eq!(index.near(Coords::ORIGIN, 1e9).len(), 2);
        assert_eq!(index.near(Coords::ORIGIN, f64::INFINITY).len(), 2);
    }

    #[test]
    fn negative_coordinates_bucket_correctly() {
        let index = LocationIndex::from_locations(vec![loc("0a", -1, -1)], 16);
        assert_eq!(index.near(Coords::new(-2, -2), 1.0).len(), 1);
        assert!(index.near(Coords::new(100, 100), 1.0).is_empty());
    }
}
