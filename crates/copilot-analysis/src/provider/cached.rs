//! Caching decorator to avoid refetching unchanged cards

use async_trait::async_trait;
use cached::{Cached, TimedCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{CardPayload, DataProvider};
use crate::error::ProviderError;
use crate::registry::CardSlot;
use crate::ticker::Ticker;

/// Cache key for card payloads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ticker: Ticker,
    pub slot_id: u8,
}

impl CacheKey {
    pub fn new(ticker: &Ticker, slot: &CardSlot) -> Self {
        Self {
            ticker: ticker.clone(),
            slot_id: slot.id,
        }
    }
}

/// Wraps a provider and caches successful payloads for a fixed lifespan
///
/// Failures always go through to the inner provider on the next call.
pub struct CachedProvider {
    inner: Arc<dyn DataProvider>,
    cache: Arc<RwLock<TimedCache<CacheKey, CardPayload>>>,
}

impl CachedProvider {
    /// Create a new cache with specified TTL
    pub fn new(inner: Arc<dyn DataProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Drop every cached payload
    pub async fn clear(&self) {
        self.cache.write().await.cache_clear();
    }

    /// Drop every cached payload for one ticker
    pub async fn invalidate_ticker(&self, ticker: &Ticker) {
        let mut cache = self.cache.write().await;
        for slot in crate::registry::CardSlotRegistry::all_slots() {
            let _ = cache.cache_remove(&CacheKey::new(ticker, slot));
        }
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        self.cache.read().await.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for CachedProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cache: Arc::clone(&self.cache),
        }
    }
}

#[async_trait]
impl DataProvider for CachedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch(&self, ticker: &Ticker, slot: &CardSlot) -> Result<CardPayload, ProviderError> {
        let key = CacheKey::new(ticker, slot);

        // TimedCache::cache_get refreshes expiry bookkeeping, so it needs the write lock
        if let Some(payload) = self.cache.write().await.cache_get(&key).cloned() {
            tracing::debug!(ticker = %ticker, slot = slot.id, "card cache hit");
            return Ok(payload);
        }

        tracing::debug!(ticker = %ticker, slot = slot.id, "card cache miss");
        let payload = self.inner.fetch(ticker, slot).await?;
        let _ = self.cache.write().await.cache_set(key, payload.clone());

        Ok(payload)
    }
}
