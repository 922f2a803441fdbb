//! Pending-action journal stored in a `Dragonfly` hash.
//!
//! One field per source id, holding the JSON [`JournalEntry`]. Writing a
//! field replaces the previous entry for that source, which matches the
//! one-action-per-source rule the tracker enforces.

use outpost_core::collaborators::{JournalEntry, PendingJournal};
use outpost_core::error::JournalError;
use outpost_types::AssetId;
use tracing::warn;

use crate::dragonfly::DragonflyPool;

/// Journal backed by the hash at `key`.
#[derive(Debug, Clone)]
pub struct DragonflyJournal {
    pool: DragonflyPool,
    key: String,
}

impl DragonflyJournal {
    /// Store entries in the hash at `key`.
    pub fn new(pool: DragonflyPool, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }

    /// Name of the backing hash.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PendingJournal for DragonflyJournal {
    async fn record(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        self.pool
            .hash_set_json(&self.key, entry.source_id.as_str(), entry)
            .await?;
        Ok(())
    }

    async fn clear(&self, source_id: &AssetId) -> Result<(), JournalError> {
        self.pool.hash_delete(&self.key, source_id.as_str()).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let raw = self.pool.hash_all(&self.key).await?;
        let mut entries = Vec::with_capacity(raw.len());
        for (field, json) in raw {
            match serde_json::from_str::<JournalEntry>(&json) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(field = %field, error = %err, "skipping unreadable journal entry"),
            }
        }
        entries.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        Ok(entries)
    }
}
