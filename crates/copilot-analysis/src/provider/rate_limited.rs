//! Rate-limiting decorator
//!
//! Unlike a client that waits for budget, this decorator refuses the call
//! straight away with [`ProviderError::RateLimited`] so the orchestrator's
//! retry backoff decides when to try again.

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::{CardPayload, DataProvider};
use crate::error::ProviderError;
use crate::registry::CardSlot;
use crate::ticker::Ticker;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Wraps a provider with a per-minute call budget
pub struct RateLimitedProvider {
    inner: Arc<dyn DataProvider>,
    rate_limiter: SharedRateLimiter,
}

impl RateLimitedProvider {
    /// Allow `per_minute` calls per minute, bursting up to the full quota
    pub fn new(inner: Arc<dyn DataProvider>, per_minute: NonZeroU32) -> Self {
        Self::with_quota(inner, Quota::per_minute(per_minute))
    }

    /// Use an explicit governor quota
    pub fn with_quota(inner: Arc<dyn DataProvider>, quota: Quota) -> Self {
        Self {
            inner,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl DataProvider for RateLimitedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch(&self, ticker: &Ticker, slot: &CardSlot) -> Result<CardPayload, ProviderError> {
        if self.rate_limiter.check().is_err() {
            tracing::warn!(
                provider = self.inner.name(),
                ticker = %ticker,
                slot = slot.id,
                "provider call budget exhausted"
            );
            return Err(ProviderError::RateLimited {
                provider: self.inner.name().to_string(),
            });
        }
        self.inner.fetch(ticker, slot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockDataProvider;
    use crate::registry::CardSlotRegistry;
    use serde_json::json;

    #[tokio::test]
    async fn test_budget_exhaustion_is_rate_limit_error() {
        let mut mock = MockDataProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch().times(2).returning(|_, _| Ok(json!({})));

        let provider = RateLimitedProvider::new(
            Arc::new(mock),
            NonZeroU32::new(2).unwrap(),
        );
        let ticker = Ticker::parse("AAPL").unwrap();
        let slot = CardSlotRegistry::slot_by_id(1).unwrap();

        assert!(provider.fetch(&ticker, slot).await.is_ok());
        assert!(provider.fetch(&ticker, slot).await.is_ok());

        let err = provider.fetch(&ticker, slot).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::RateLimited {
                provider: "mock".to_string()
            }
        );
        assert!(err.is_retryable());
    }
}
