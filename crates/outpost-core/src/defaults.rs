//! Deterministic state of assets nobody has claimed yet.
//!
//! The state query service only knows assets that have been touched by a
//! player. Everything else starts from per-level defaults, derived from the
//! location hash and its perlin value exactly like the game does:
//!
//! - bytes 4..7 of the hash pick the level against `level_thresholds`;
//! - the perlin value picks the space type, which caps the level and scales
//!   the stats;
//! - byte 8 of the hash picks the asset type from `type_weights`.

use chrono::{DateTime, Utc};
use outpost_types::{AssetSnapshot, AssetType, Location, Owner, SpaceType};
use serde::Deserialize;

use crate::collaborators::DefaultStateGenerator;

/// Game constants the default state is derived from.
///
/// Per-level tables are indexed by level; missing entries read as zero.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameConstants {
    /// Upper bound (exclusive) of the level bytes for each level.
    pub level_thresholds: Vec<u64>,
    /// Highest level a natural asset can have.
    pub max_natural_level: u32,
    /// Perlin boundaries between nebula/space, space/deep space, and
    /// deep/dead space.
    pub perlin_thresholds: [u32; 3],
    /// Growth multiplier in hundredths.
    pub time_factor_hundredths: u32,
    /// Resource cap per level.
    pub resource_cap: Vec<f64>,
    /// Resource growth per level.
    pub resource_growth: Vec<f64>,
    /// Base range per level.
    pub range: Vec<f64>,
    /// Defense per level.
    pub defense: Vec<f64>,
    /// Percentage of the cap held by the default garrison, per level.
    pub garrison_percent: Vec<f64>,
    /// Asset type weights, indexed by space type then level, in type-code
    /// order.
    pub type_weights: [Vec<[u32; 5]>; 4],
}

impl Default for GameConstants {
    fn default() -> Self {
        let weights = vec![[1, 0, 0, 0, 0], [13, 2, 0, 1, 0], [13, 2, 0, 1, 0], [13, 2, 0, 0, 1]];
        let mut deep = weights.clone();
        deep.extend([[12, 2, 1, 1, 1]; 6]);
        let mut near = weights;
        near.extend([[13, 2, 0, 1, 1]; 6]);
        Self {
            level_thresholds: vec![
                16_777_216, 4_194_292, 262_136, 32_763, 2_047, 511, 127, 63, 31, 15,
            ],
            max_natural_level: 9,
            perlin_thresholds: [14, 15, 19],
            time_factor_hundredths: 100,
            resource_cap: vec![
                100_000.0,
                400_000.0,
                1_600_000.0,
                6_000_000.0,
                25_000_000.0,
                100_000_000.0,
                200_000_000.0,
                300_000_000.0,
                400_000_000.0,
                500_000_000.0,
            ],
            resource_growth: vec![
                417.0, 833.0, 1_250.0, 1_667.0, 2_083.0, 2_500.0, 2_917.0, 3_333.0, 3_750.0,
                4_167.0,
            ],
            range: vec![
                99.0, 177.0, 315.0, 591.0, 1_025.0, 1_734.0, 2_838.0, 4_414.0, 6_306.0, 8_829.0,
            ],
            defense: vec![
                400.0, 400.0, 300.0, 300.0, 300.0, 200.0, 200.0, 200.0, 200.0, 200.0,
            ],
            garrison_percent: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0, 20.0, 25.0],
            type_weights: [near.clone(), near, deep.clone(), deep],
        }
    }
}

impl GameConstants {
    /// Space type at the given perlin value.
    pub fn space_type(&self, perlin: u32) -> SpaceType {
        let [nebula, space, deep] = self.perlin_thresholds;
        if perlin < nebula {
            SpaceType::Nebula
        } else if perlin < space {
            SpaceType::Space
        } else if perlin < deep {
            SpaceType::DeepSpace
        } else {
            SpaceType::DeadSpace
        }
    }

    /// Natural level of the asset with hash bytes `hash` in `space`.
    pub fn level(&self, hash: &[u8], space: SpaceType) -> u32 {
        let value = be_bytes(hash, 4, 7);
        let mut level = 0;
        for (candidate, &threshold) in self.level_thresholds.iter().enumerate().rev() {
            if value < threshold {
                level = u32::try_from(candidate).unwrap_or(u32::MAX);
                break;
            }
        }
        let space_cap = match space {
            SpaceType::Nebula => 4,
            SpaceType::Space => 5,
            SpaceType::DeepSpace | SpaceType::DeadSpace => u32::MAX,
        };
        level.min(space_cap).min(self.max_natural_level)
    }

    /// Natural asset type for the given hash, level, and space type.
    pub fn asset_type(&self, hash: &[u8], level: u32, space: SpaceType) -> AssetType {
        let Some(weights) = self
            .type_weights
            .get(space_index(space))
            .and_then(|per_level| per_level.get(level as usize))
        else {
            return AssetType::Planet;
        };
        let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
        if total == 0 {
            return AssetType::Planet;
        }
        let type_byte = be_bytes(hash, 8, 9);
        let mut remaining = total;
        for (code, &weight) in weights.iter().enumerate() {
            remaining = remaining.saturating_sub(u64::from(weight));
            let threshold = remaining.saturating_mul(256) / total;
            if type_byte >= threshold {
                return u8::try_from(code)
                    .ok()
                    .and_then(AssetType::from_code)
                    .unwrap_or(AssetType::Planet);
            }
        }
        AssetType::Planet
    }
}

const fn space_index(space: SpaceType) -> usize {
    match space {
        SpaceType::Nebula => 0,
        SpaceType::Space => 1,
        SpaceType::DeepSpace => 2,
        SpaceType::DeadSpace => 3,
    }
}

/// Big-endian value of `hash[start..end]`; missing bytes read as zero.
fn be_bytes(hash: &[u8], start: usize, end: usize) -> u64 {
    (start..end).fold(0u64, |acc, i| {
        (acc << 8) | u64::from(hash.get(i).copied().unwrap_or(0))
    })
}

fn table(values: &[f64], level: u32) -> f64 {
    values.get(level as usize).copied().unwrap_or(0.0)
}

/// Default-state generator backed by [`GameConstants`].
#[derive(Debug, Clone, Default)]
pub struct ConstantsGenerator {
    constants: GameConstants,
}

impl ConstantsGenerator {
    /// Create a generator from game constants.
    pub const fn new(constants: GameConstants) -> Self {
        Self { constants }
    }
}

impl DefaultStateGenerator for ConstantsGenerator {
    fn default_snapshot(&self, location: &Location, now: DateTime<Utc>) -> AssetSnapshot {
        let constants = &self.constants;
        let hash = location.id.to_bytes().unwrap_or_default();
        let space = constants.space_type(location.perlin);
        let level = constants.level(&hash, space);
        let asset_type = constants.asset_type(&hash, level, space);

        let mut cap = table(&constants.resource_cap, level);
        let mut growth = table(&constants.resource_growth, level);
        let mut range = table(&constants.range, level);
        let mut defense = table(&constants.defense, level);

        let (stat_multiplier, garrison_multiplier) = match space {
            SpaceType::Nebula => (1.0, 1.0),
            SpaceType::Space => (1.25, 4.0),
            SpaceType::DeepSpace => (1.5, 10.0),
            SpaceType::DeadSpace => (2.0, 20.0),
        };
        cap *= stat_multiplier;
        growth *= stat_multiplier;
        range *= stat_multiplier;
        defense = match space {
            SpaceType::Nebula => defense,
            SpaceType::Space => defense * 0.5,
            SpaceType::DeepSpace => defense * 0.25,
            SpaceType::DeadSpace => (defense * 3.0 / 20.0).floor(),
        };

        match asset_type {
            AssetType::Mine | AssetType::TradingPost => defense *= 0.5,
            AssetType::Reservoir => {
                growth = 0.0;
                cap *= 5.0;
            }
            AssetType::Planet | AssetType::Ruins => {}
        }

        let garrison = cap * table(&constants.garrison_percent, level) / 100.0 * garrison_multiplier;
        growth *= f64::from(constants.time_factor_hundredths) / 100.0;

        AssetSnapshot {
            id: location.id.clone(),
            owner: Owner::Unclaimed,
            level,
            asset_type,
            defense,
            resource_current: garrison,
            resource_cap: cap,
            resource_growth: growth,
            last_updated: now,
            range,
        }
    }
}
