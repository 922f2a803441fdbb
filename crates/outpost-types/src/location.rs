//! Planar coordinates and discovered locations.

use serde::{Deserialize, Serialize};

use crate::ids::AssetId;

/// A point on the game plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coords {
    /// Horizontal coordinate.
    pub x: i64,
    /// Vertical coordinate.
    pub y: i64,
}

impl Coords {
    /// The world origin.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a coordinate pair.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// A discovered location.
///
/// Produced by the exploration subsystem and read back through the world
/// index. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Identifier of the asset at this location.
    pub id: AssetId,
    /// Where the location is.
    pub coords: Coords,
    /// Space-type noise value sampled at the coordinates.
    ///
    /// Used only when synthesizing the default state of never-claimed assets.
    #[serde(default)]
    pub perlin: u32,
}

impl Location {
    /// Create a location with a zero perlin value.
    pub fn new(id: impl Into<AssetId>, coords: Coords) -> Self {
        Self {
            id: id.into(),
            coords,
            perlin: 0,
        }
    }

    /// Set the perlin value.
    #[must_use]
    pub fn with_perlin(mut self, perlin: u32) -> Self {
        self.perlin = perlin;
        self
    }
}
