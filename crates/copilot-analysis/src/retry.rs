//! Per-card fetch with timeout, bounded retries and cancellation
//!
//! Each provider call runs under `card_timeout`. Transient failures
//! (network, timeout, rate limit) are retried up to `max_retries` times with
//! exponential backoff; anything else fails the card at once. Every await
//! point also watches the request's cancellation signal.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::OrchestratorConfig;
use crate::error::ProviderError;
use crate::provider::{CardPayload, DataProvider};
use crate::registry::CardSlot;
use crate::request::CardError;
use crate::ticker::Ticker;

/// Receiving half of a request's cancellation signal
pub type CancelReceiver = watch::Receiver<bool>;

/// Final result of fetching one card
#[derive(Debug, Clone, PartialEq)]
pub struct CardOutcome {
    pub result: Result<CardPayload, CardError>,
    /// Provider calls made, retries included
    pub attempts: u32,
}

/// Resolves once the signal is raised or its sender is gone
pub async fn cancelled(cancel: &mut CancelReceiver) {
    let _ = cancel.wait_for(|raised| *raised).await;
}

/// Fetch one card, retrying transient failures
///
/// Returns `None` if cancellation was observed; the caller must then not
/// record anything for this card.
pub async fn fetch_with_retry(
    provider: &dyn DataProvider,
    ticker: &Ticker,
    slot: &CardSlot,
    config: &OrchestratorConfig,
    cancel: &mut CancelReceiver,
) -> Option<CardOutcome> {
    let mut attempts = 0;

    loop {
        attempts += 1;
        let started = Instant::now();
        let call = tokio::time::timeout(config.card_timeout, provider.fetch(ticker, slot));

        let result = tokio::select! {
            biased;
            () = cancelled(cancel) => {
                debug!(ticker = %ticker, slot = slot.id, attempt = attempts, "card fetch abandoned");
                return None;
            }
            result = call => result,
        };

        let error = match result {
            Ok(Ok(payload)) => {
                return Some(CardOutcome {
                    result: Ok(payload),
                    attempts,
                });
            }
            Ok(Err(error)) => error,
            Err(_) => ProviderError::Timeout {
                elapsed_ms: elapsed_ms(started.elapsed()),
            },
        };

        let retries_used = attempts - 1;
        if !error.is_retryable() || retries_used >= config.max_retries {
            warn!(
                ticker = %ticker,
                slot = slot.id,
                attempt = attempts,
                %error,
                "card fetch failed"
            );
            return Some(CardOutcome {
                result: Err(CardError::new(error.kind(), error.to_string())),
                attempts,
            });
        }

        let delay = config.retry_backoff(retries_used);
        debug!(
            ticker = %ticker,
            slot = slot.id,
            attempt = attempts,
            delay_ms = elapsed_ms(delay),
            %error,
            "retrying card fetch"
        );

        tokio::select! {
            biased;
            () = cancelled(cancel) => return None,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

fn elapsed_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provider::{MockDataProvider, SimulatedProvider};
    use crate::registry::CardSlotRegistry;
    use serde_json::json;

    fn slot() -> &'static CardSlot {
        CardSlotRegistry::slot_by_id(2).unwrap()
    }

    fn ticker() -> Ticker {
        Ticker::parse("AAPL").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let provider = SimulatedProvider::new();
        let (_tx, mut rx) = watch::channel(false);

        let outcome = fetch_with_retry(&provider, &ticker(), slot(), &OrchestratorConfig::default(), &mut rx)
            .await
            .unwrap();
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let provider = SimulatedProvider::new().fail_slot_times(
            2,
            ProviderError::Network("reset".to_string()),
            2,
        );
        let (_tx, mut rx) = watch::channel(false);

        let outcome = fetch_with_retry(&provider, &ticker(), slot(), &OrchestratorConfig::default(), &mut rx)
            .await
            .unwrap();
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let mut mock = MockDataProvider::new();
        mock.expect_fetch()
            .times(3)
            .returning(|_, _| Err(ProviderError::Network("down".to_string())));
        let (_tx, mut rx) = watch::channel(false);

        let outcome = fetch_with_retry(&mock, &ticker(), slot(), &OrchestratorConfig::default(), &mut rx)
            .await
            .unwrap();
        let error = outcome.result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Network);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let mut mock = MockDataProvider::new();
        mock.expect_fetch().times(1).returning(|ticker, slot| {
            Err(ProviderError::NotFound {
                ticker: ticker.to_string(),
                slot: slot.id,
            })
        });
        let (_tx, mut rx) = watch::channel(false);

        let outcome = fetch_with_retry(&mock, &ticker(), slot(), &OrchestratorConfig::default(), &mut rx)
            .await
            .unwrap();
        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_per_attempt() {
        let provider = SimulatedProvider::new().with_latency(Duration::from_secs(60));
        let config = OrchestratorConfig::builder()
            .card_timeout(Duration::from_secs(1))
            .max_retries(1)
            .build()
            .unwrap();
        let (_tx, mut rx) = watch::channel(false);

        let started = Instant::now();
        let outcome = fetch_with_retry(&provider, &ticker(), slot(), &config, &mut rx)
            .await
            .unwrap();
        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::Timeout);
        assert_eq!(outcome.attempts, 2);
        // two 1s timeouts plus one 250ms backoff
        assert_eq!(started.elapsed(), Duration::from_millis(2250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_fetch() {
        let provider = SimulatedProvider::new().with_latency(Duration::from_secs(5));
        let (tx, mut rx) = watch::channel(false);

        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send_replace(true);
            tx
        });

        let outcome =
            fetch_with_retry(&provider, &ticker(), slot(), &OrchestratorConfig::default(), &mut rx).await;
        assert!(outcome.is_none());
        drop(cancel.await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_cancelled() {
        let mut mock = MockDataProvider::new();
        mock.expect_fetch().returning(|_, _| Ok(json!({})));
        let (tx, mut rx) = watch::channel(false);
        drop(tx);

        let outcome =
            fetch_with_retry(&mock, &ticker(), slot(), &OrchestratorConfig::default(), &mut rx).await;
        assert!(outcome.is_none());
    }
}
