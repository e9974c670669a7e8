//! Deterministic provider for demos and tests
//!
//! Produces placeholder payloads after a configurable delay. Failures can be
//! scripted per slot, either permanently or for the first N calls.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{CardPayload, DataProvider};
use crate::error::ProviderError;
use crate::registry::CardSlot;
use crate::ticker::Ticker;

/// Provider that fabricates card payloads locally
#[derive(Debug, Default)]
pub struct SimulatedProvider {
    latency: Duration,
    slot_latency: HashMap<u8, Duration>,
    permanent_failures: HashMap<u8, ProviderError>,
    scripted_failures: Mutex<HashMap<u8, VecDeque<ProviderError>>>,
    calls: AtomicUsize,
    slot_calls: Mutex<HashMap<u8, u32>>,
}

impl SimulatedProvider {
    /// Create a provider that answers every slot immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay applied to one slot, overriding the default latency
    pub fn with_slot_latency(mut self, slot_id: u8, latency: Duration) -> Self {
        self.slot_latency.insert(slot_id, latency);
        self
    }

    /// Every call for this slot fails with `error`
    pub fn fail_slot(mut self, slot_id: u8, error: ProviderError) -> Self {
        self.permanent_failures.insert(slot_id, error);
        self
    }

    /// The next `times` calls for this slot fail with `error`, later ones succeed
    pub fn fail_slot_times(self, slot_id: u8, error: ProviderError, times: usize) -> Self {
        {
            let mut scripted = self
                .scripted_failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let queue = scripted.entry(slot_id).or_default();
            queue.extend(std::iter::repeat_n(error, times));
        }
        self
    }

    /// Total number of `fetch` calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch` calls for one slot
    pub fn calls_for(&self, slot_id: u8) -> u32 {
        self.slot_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slot_id)
            .copied()
            .unwrap_or(0)
    }

    fn next_failure(&self, slot_id: u8) -> Option<ProviderError> {
        if let Some(error) = self.permanent_failures.get(&slot_id) {
            return Some(error.clone());
        }
        self.scripted_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&slot_id)
            .and_then(VecDeque::pop_front)
    }

    fn payload(ticker: &Ticker, slot: &CardSlot) -> CardPayload {
        json!({
            "ticker": ticker.as_str(),
            "slot": slot.id,
            "key": slot.key,
            "title": slot.title,
            "headline": format!("{}: {}", ticker, slot.title),
            "generated_at": Utc::now().to_rfc3339(),
        })
    }
}

#[async_trait]
impl DataProvider for SimulatedProvider {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn fetch(&self, ticker: &Ticker, slot: &CardSlot) -> Result<CardPayload, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .slot_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(slot.id)
            .or_insert(0) += 1;

        let latency = self
            .slot_latency
            .get(&slot.id)
            .copied()
            .unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.next_failure(slot.id) {
            tracing::debug!(ticker = %ticker, slot = slot.id, %error, "simulated failure");
            return Err(error);
        }

        Ok(Self::payload(ticker, slot))
    }
}
