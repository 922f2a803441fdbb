//! LRU cache in front of an argument builder.
//!
//! Proof generation is the slowest step of a dispatch and its output only
//! depends on the move geometry, so payloads are kept by
//! [`ArgumentRequest::cache_key`] and evicted least-recently-used first.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use outpost_types::MoveProof;
use tokio::sync::Mutex;
use tracing::debug;

use crate::collaborators::{ArgumentBuilder, ArgumentRequest};
use crate::error::BuildError;

/// Argument builder that memoizes successful builds.
///
/// Failures are never cached.
#[derive(Debug)]
pub struct CachedArgumentBuilder<B> {
    inner: B,
    cache: Option<Mutex<LruCache<String, MoveProof>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<B: ArgumentBuilder> CachedArgumentBuilder<B> {
    /// Wrap `inner` with a cache of `capacity` entries. A capacity of zero
    /// disables caching.
    pub fn new(inner: B, capacity: usize) -> Self {
        Self {
            inner,
            cache: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Builds answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Builds forwarded to the wrapped builder.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of cached payloads.
    pub async fn len(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.lock().await.len(),
            None => 0,
        }
    }
}

impl<B: ArgumentBuilder> ArgumentBuilder for CachedArgumentBuilder<B> {
    async fn build(&self, request: ArgumentRequest) -> Result<MoveProof, BuildError> {
        let Some(cache) = &self.cache else {
            return self.inner.build(request).await;
        };

        let key = request.cache_key();
        let cached = cache.lock().await.get(&key).cloned();
        if let Some(proof) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "argument cache hit");
            return Ok(proof);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let proof = self.inner.build(request).await?;
        cache.lock().await.put(key, proof.clone());
        Ok(proof)
    }
}
