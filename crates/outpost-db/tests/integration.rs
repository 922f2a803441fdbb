//! Integration tests for the `outpost-db` storage layer.
//!
//! These tests require a live `Dragonfly` (or Redis) instance. Run with:
//!
//! ```bash
//! docker run -d -p 6379:6379 docker.dragonflydb.io/dragonflydb/dragonfly
//! cargo test -p outpost-db -- --ignored
//! ```
//!
//! All tests are marked `#[ignore]` so they are skipped during normal
//! `cargo test` runs. Each test uses its own keys and deletes them first.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use chrono::{DateTime, Utc};
use outpost_core::collaborators::{JournalEntry, PendingJournal, WorldIndex};
use outpost_db::{DragonflyJournal, DragonflyPool, DragonflyWorldIndex};
use outpost_types::{ActionId, AssetId, Coords};

/// `Dragonfly` connection URL for the local Docker instance.
const DRAGONFLY_URL: &str = "redis://localhost:6379";

async fn pool() -> DragonflyPool {
    DragonflyPool::connect(DRAGONFLY_URL)
        .await
        .expect("Dragonfly must be running on localhost:6379")
}

fn entry(source: &str, expires_at: DateTime<Utc>) -> JournalEntry {
    JournalEntry {
        source_id: AssetId::new(source),
        target_id: AssetId::new("b1"),
        action_id: ActionId::new(),
        resource_amount: 40.0,
        expires_at,
    }
}

#[tokio::test]
#[ignore = "requires live Dragonfly on localhost:6379"]
async fn world_index_reads_the_chunk_list() {
    let pool = pool().await;
    let key = "test:outpost:chunks";
    pool.delete(key).await.unwrap();

    let chunk = serde_json::json!({
        "x": 0, "y": 0, "s": 16, "p": 14,
        "l": [
            { "x": 3, "y": 9, "h": "00ab", "p": 14, "b": 1 },
            { "x": 5, "y": 2, "h": "00cd", "p": 15, "b": 0 }
        ]
    });
    pool.push_json(key, &chunk).await.unwrap();

    let world = DragonflyWorldIndex::new(pool.clone(), key, 16);
    let index = world.known_locations().await.unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(
        index.get(&AssetId::new("00ab")).unwrap().coords,
        Coords::new(3, 9)
    );

    pool.delete(key).await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Dragonfly on localhost:6379"]
async fn missing_chunk_list_is_an_empty_map() {
    let pool = pool().await;
    let key = "test:outpost:no-chunks";
    pool.delete(key).await.unwrap();

    let world = DragonflyWorldIndex::new(pool, key, 16);
    assert!(world.known_locations().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires live Dragonfly on localhost:6379"]
async fn journal_records_replaces_and_clears() {
    let pool = pool().await;
    let key = "test:outpost:pending";
    pool.delete(key).await.unwrap();
    let journal = DragonflyJournal::new(pool.clone(), key);
    let expires_at = DateTime::from_timestamp(1_700_000_900, 0).unwrap();

    journal.record(&entry("a0", expires_at)).await.unwrap();
    journal.record(&entry("a1", expires_at)).await.unwrap();
    let replacement = entry("a0", expires_at);
    journal.record(&replacement).await.unwrap();

    let loaded = journal.load().await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0], replacement);
    assert_eq!(loaded[1].source_id, AssetId::new("a1"));

    journal.clear(&AssetId::new("a0")).await.unwrap();
    let loaded = journal.load().await.unwrap();
    assert_eq!(loaded.len(), 1);

    pool.delete(key).await.unwrap();
}
