//! Type-safe identifier wrappers.
//!
//! Assets are addressed by the hex location hash assigned by the game, the
//! controlling identity by its account address, and dispatched actions by a
//! locally generated UUID. Each gets its own newtype so the three can never
//! be mixed up at compile time.
//!
//! Hex identifiers are normalized on construction: surrounding whitespace and
//! a leading `0x` are stripped and the digits are lowercased, so ids coming
//! from the chunk store and from the state query compare equal.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around a normalized hex string.
macro_rules! define_hex_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any hex representation.
            pub fn new(raw: impl AsRef<str>) -> Self {
                Self(normalize_hex(raw.as_ref()))
            }

            /// Return the normalized hex digits (no `0x` prefix).
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the identifier with a `0x` prefix, as the game APIs expect.
            pub fn to_prefixed(&self) -> String {
                format!("0x{}", self.0)
            }

            /// Decode the identifier into raw bytes.
            ///
            /// Returns `None` if the digits are not valid hex.
            pub fn to_bytes(&self) -> Option<Vec<u8>> {
                hex::decode(&self.0).ok()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::new(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_hex_id! {
    /// Identifier of an asset (the location hash of the planet it sits on).
    AssetId
}

define_hex_id! {
    /// Account address of a controlling identity.
    Identity
}

/// Identifier of a single dispatched action.
///
/// Generated locally (UUID v7, time-ordered) and handed to the executor so
/// that submissions, journal entries, and outcomes can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Uuid);

impl ActionId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ActionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn normalize_hex(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    digits.to_ascii_lowercase()
}
