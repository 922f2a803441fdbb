//! The explored map, read from the explorer's chunk list.
//!
//! Each list element is one explored chunk in the explorer's persisted form:
//!
//! ```json
//! { "x": 0, "y": 0, "s": 16, "p": 14,
//!   "l": [ { "x": 3, "y": 9, "h": "00000a1f...", "p": 14, "b": 1 } ] }
//! ```
//!
//! Only the planet locations (`l`) matter here: coordinates, hash, and the
//! perlin value used to synthesize default state. Chunk bounds and biome
//! data are ignored.

use outpost_core::collaborators::WorldIndex;
use outpost_core::error::QueryError;
use outpost_core::index::LocationIndex;
use outpost_types::{Coords, Location};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::dragonfly::DragonflyPool;

#[derive(Debug, Deserialize)]
struct PersistedChunk {
    #[serde(rename = "l", default)]
    locations: Vec<PersistedLocation>,
}

#[derive(Debug, Deserialize)]
struct PersistedLocation {
    x: i64,
    y: i64,
    #[serde(rename = "h")]
    hash: String,
    #[serde(rename = "p", default)]
    perlin: f64,
}

impl PersistedLocation {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn into_location(self) -> Location {
        let perlin = self.perlin.round().clamp(0.0, f64::from(u32::MAX)) as u32;
        Location::new(self.hash, Coords::new(self.x, self.y)).with_perlin(perlin)
    }
}

/// Build a [`LocationIndex`] from raw chunk JSON, in list order.
///
/// Chunks that fail to parse are skipped. A location seen in an earlier
/// chunk wins over any later duplicate.
pub fn index_from_chunks(raw: &[String], cell_size: u32) -> LocationIndex {
    let mut index = LocationIndex::new(cell_size);
    let mut malformed = 0usize;
    for json in raw {
        let chunk: PersistedChunk = match serde_json::from_str(json) {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!(error = %err, "skipping malformed chunk");
                malformed = malformed.saturating_add(1);
                continue;
            }
        };
        for location in chunk.locations {
            index.insert(location.into_location());
        }
    }
    if malformed > 0 {
        warn!(malformed, chunks = raw.len(), "some explored chunks could not be parsed");
    }
    index
}

/// World index over the explorer's chunk list in `Dragonfly`.
#[derive(Debug, Clone)]
pub struct DragonflyWorldIndex {
    pool: DragonflyPool,
    chunks_key: String,
    cell_size: u32,
}

impl DragonflyWorldIndex {
    /// Read chunks from the list at `chunks_key`, indexing them with grid
    /// cells of `cell_size` units.
    pub fn new(pool: DragonflyPool, chunks_key: impl Into<String>, cell_size: u32) -> Self {
        Self {
            pool,
            chunks_key: chunks_key.into(),
            cell_size,
        }
    }
}

impl WorldIndex for DragonflyWorldIndex {
    async fn known_locations(&self) -> Result<LocationIndex, QueryError> {
        let raw = self.pool.list_all(&self.chunks_key).await?;
        let index = index_from_chunks(&raw, self.cell_size);
        debug!(chunks = raw.len(), locations = index.len(), "explored map loaded");
        Ok(index)
    }
}
