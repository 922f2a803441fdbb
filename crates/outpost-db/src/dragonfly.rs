//! `Dragonfly` (Redis-compatible) connection and typed operations.
//!
//! The explorer and the planner share one `Dragonfly` instance. The explorer
//! appends every chunk it finishes to a list; the planner only reads that
//! list, and owns the pending-action hash.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `explorer:chunks` | List | Explored chunks, JSON, in discovery order |
//! | `outpost:pending` | Hash | Pending actions by source id, JSON |
//!
//! Both key names are configurable.

use std::collections::HashMap;

use fred::prelude::*;
use serde::Serialize;

use crate::error::DbError;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    // =========================================================================
    // Lists
    // =========================================================================

    /// Every element of the list at `key`, oldest first. A missing key reads
    /// as an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn list_all(&self, key: &str) -> Result<Vec<String>, DbError> {
        let values: Vec<String> = self.client.lrange(key, 0, -1).await?;
        Ok(values)
    }

    /// Serialize `value` as JSON and append it to the list at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or write fails.
    pub async fn push_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: u64 = self.client.rpush(key, json.as_str()).await?;
        Ok(())
    }

    // =========================================================================
    // Hashes
    // =========================================================================

    /// Serialize `value` as JSON and store it under `field` of the hash at
    /// `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or write fails.
    pub async fn hash_set_json<T: Serialize>(
        &self,
        key: &str,
        field: &str,
        value: &T,
    ) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: u64 = self.client.hset(key, (field, json.as_str())).await?;
        Ok(())
    }

    /// Remove `field` from the hash at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn hash_delete(&self, key: &str, field: &str) -> Result<(), DbError> {
        let _: u64 = self.client.hdel(key, field).await?;
        Ok(())
    }

    /// Every field and raw value of the hash at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn hash_all(&self, key: &str) -> Result<HashMap<String, String>, DbError> {
        let values: HashMap<String, String> = self.client.hgetall(key).await?;
        Ok(values)
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Delete a key from `Dragonfly`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }
}

impl std::fmt::Debug for DragonflyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragonflyPool").finish_non_exhaustive()
    }
}
