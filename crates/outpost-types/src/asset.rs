//! Asset snapshots and their enumerations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssetId, Identity};

/// The zero address the game uses for assets nobody controls.
pub const EMPTY_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Who controls an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Owner {
    /// No identity controls the asset.
    Unclaimed,
    /// The asset is controlled by the given identity.
    Identity(Identity),
}

impl Owner {
    /// Whether no identity controls the asset.
    pub const fn is_unclaimed(&self) -> bool {
        matches!(self, Self::Unclaimed)
    }

    /// Whether the asset is controlled by `identity`.
    pub fn is(&self, identity: &Identity) -> bool {
        matches!(self, Self::Identity(owner) if owner == identity)
    }
}

impl From<String> for Owner {
    fn from(raw: String) -> Self {
        let identity = Identity::new(raw);
        if identity.as_str().chars().all(|c| c == '0') {
            Self::Unclaimed
        } else {
            Self::Identity(identity)
        }
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        match owner {
            Owner::Unclaimed => EMPTY_ADDRESS.to_owned(),
            Owner::Identity(identity) => identity.to_prefixed(),
        }
    }
}

/// Kind of asset.
///
/// Numeric codes match the game's on-chain encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// A regular planet with logistic resource growth.
    Planet,
    /// A mine producing the secondary resource.
    Mine,
    /// Ruins that may hold artifacts.
    Ruins,
    /// A trading post.
    TradingPost,
    /// A high-capacity store whose resource saturates instead of growing.
    Reservoir,
}

impl AssetType {
    /// All asset types in code order.
    pub const ALL: [Self; 5] = [
        Self::Planet,
        Self::Mine,
        Self::Ruins,
        Self::TradingPost,
        Self::Reservoir,
    ];

    /// Decode the game's numeric type code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Planet),
            1 => Some(Self::Mine),
            2 => Some(Self::Ruins),
            3 => Some(Self::TradingPost),
            4 => Some(Self::Reservoir),
            _ => None,
        }
    }

    /// The game's numeric type code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Planet => 0,
            Self::Mine => 1,
            Self::Ruins => 2,
            Self::TradingPost => 3,
            Self::Reservoir => 4,
        }
    }
}

/// Space zone an asset sits in, derived from its perlin value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    /// Innermost zone.
    Nebula,
    /// Regular space.
    Space,
    /// Deep space.
    DeepSpace,
    /// Outermost, most hostile zone.
    DeadSpace,
}

/// Point-in-time state of one asset.
///
/// Produced fresh every cycle, either from the state query service or by the
/// default-state generator for assets that have never been claimed. Never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    /// The asset.
    pub id: AssetId,
    /// Controlling identity, if any.
    pub owner: Owner,
    /// Asset level (0 is the smallest).
    pub level: u32,
    /// Asset kind.
    pub asset_type: AssetType,
    /// Defense rating.
    pub defense: f64,
    /// Resource level at `last_updated`.
    pub resource_current: f64,
    /// Resource ceiling. Always positive.
    pub resource_cap: f64,
    /// Growth rate parameter of the logistic model.
    pub resource_growth: f64,
    /// When `resource_current` was observed.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_updated: DateTime<Utc>,
    /// Base range used to compute effective range.
    pub range: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_address_is_unclaimed() {
        assert_eq!(Owner::from(EMPTY_ADDRESS.to_owned()), Owner::Unclaimed);
        assert_eq!(Owner::from(String::new()), Owner::Unclaimed);
        assert_eq!(String::from(Owner::Unclaimed), EMPTY_ADDRESS);
    }

    #[test]
    fn owner_matches_normalized_identity() {
        let owner = Owner::from("0xAbC1".to_owned());
        assert!(owner.is(&Identity::new("abc1")));
        assert!(!owner.is_unclaimed());
    }

    #[test]
    fn type_codes_roundtrip() {
        for asset_type in AssetType::ALL {
            assert_eq!(AssetType::from_code(asset_type.code()), Some(asset_type));
        }
        assert_eq!(AssetType::from_code(9), None);
    }
}
