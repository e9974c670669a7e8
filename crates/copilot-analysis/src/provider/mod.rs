//! Data provider contract consumed by the orchestrator
//!
//! A provider turns a validated ticker and a card slot into an opaque JSON
//! payload. It knows nothing about requests, retries or timeouts; those are
//! the orchestrator's job.
//!
//! | Type | Role |
//! |------|------|
//! | [`SimulatedProvider`] | Deterministic payloads with scripted latency and failures |
//! | [`CachedProvider`] | Caches ready payloads per ticker and slot |
//! | [`RateLimitedProvider`] | Refuses calls once a per-minute budget is spent |

pub mod cached;
pub mod rate_limited;
pub mod simulated;

pub use cached::CachedProvider;
pub use rate_limited::RateLimitedProvider;
pub use simulated::SimulatedProvider;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::error::ProviderError;
use crate::registry::CardSlot;
use crate::ticker::Ticker;

/// Opaque card content produced by a provider
pub type CardPayload = serde_json::Value;

/// Source of raw per-card data
///
/// Implementations must be `Send + Sync`; the orchestrator calls `fetch`
/// for all seven slots concurrently from spawned tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Short provider name used in logs and rate-limit errors
    fn name(&self) -> &'static str;

    /// Fetch the payload for one card
    ///
    /// # Errors
    ///
    /// `Network`, `Timeout` and `RateLimited` are treated as transient and
    /// retried; `NotFound` fails the card immediately.
    async fn fetch(&self, ticker: &Ticker, slot: &CardSlot) -> Result<CardPayload, ProviderError>;
}

/// Wrap a provider with the standard decorators
///
/// Cache hits are answered before the rate limiter is consulted, so only
/// real upstream calls spend budget.
pub fn layered(inner: Arc<dyn DataProvider>, config: &OrchestratorConfig) -> Arc<dyn DataProvider> {
    let limited: Arc<dyn DataProvider> = Arc::new(RateLimitedProvider::new(inner, config.rate_limit()));
    Arc::new(CachedProvider::new(limited, config.cache_ttl))
}
