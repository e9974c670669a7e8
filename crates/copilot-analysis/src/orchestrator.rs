//! Analysis orchestrator: the request state machine
//!
//! ```text
//! Idle -> Loading -> { Succeeded | PartiallySucceeded | Failed }
//!         Loading -> Cancelled
//! ```
//!
//! One orchestrator runs at most one `Loading` request at a time. Within a
//! request the seven card fetches run as independent tasks. Every mutation
//! (card completion, global timeout, cancellation) happens under the single
//! state lock, and the request is finalized by whichever mutation observes
//! the last pending card resolve. Once a request is terminal nothing writes
//! to it again; late fetch results are dropped.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{CopilotError, ErrorKind, Result};
use crate::provider::DataProvider;
use crate::registry::{CardSlot, CardSlotRegistry};
use crate::request::{AnalysisRequest, CardError, RequestId, RequestStatus};
use crate::retry::{CancelReceiver, CardOutcome, cancelled, fetch_with_retry};
use crate::ticker::{Ticker, TickerValidator};

/// Coordinates analysis requests against a data provider
///
/// Cloning is cheap and clones share the same request map, so a clone can
/// be handed to a background task while the first one keeps serving
/// `cancel` and `get_status`.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    provider: Arc<dyn DataProvider>,
    config: Arc<OrchestratorConfig>,
    state: Arc<Mutex<OrchestratorState>>,
}

#[derive(Default)]
struct OrchestratorState {
    requests: HashMap<RequestId, TrackedRequest>,
    active: Option<RequestId>,
    /// Insertion counter, orders eviction
    inserted: u64,
}

struct TrackedRequest {
    request: AnalysisRequest,
    sequence: u64,
    snapshots: watch::Sender<AnalysisRequest>,
    cancel: watch::Sender<bool>,
    deadline: Option<JoinHandle<()>>,
}

impl TrackedRequest {
    fn new(request: AnalysisRequest) -> Self {
        let (snapshots, _) = watch::channel(request.clone());
        let (cancel, _) = watch::channel(false);
        Self {
            request,
            sequence: 0,
            snapshots,
            cancel,
            deadline: None,
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.request.clone());
    }

    fn stop_deadline(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }
    }
}

impl OrchestratorState {
    /// Register a request, then drop the oldest terminal requests beyond `limit`
    fn insert(&mut self, mut tracked: TrackedRequest, limit: usize) {
        self.inserted += 1;
        tracked.sequence = self.inserted;
        self.requests.insert(tracked.request.request_id, tracked);

        let excess = self.requests.len().saturating_sub(limit);
        if excess == 0 {
            return;
        }

        let mut terminal: Vec<_> = self
            .requests
            .values()
            .filter(|tracked| tracked.request.is_terminal())
            .map(|tracked| (tracked.sequence, tracked.request.request_id))
            .collect();
        terminal.sort_unstable_by_key(|(sequence, _)| *sequence);

        for (_, request_id) in terminal.into_iter().take(excess) {
            self.requests.remove(&request_id);
            debug!(%request_id, "evicted from request history");
        }
    }

    fn tracked(&self, request_id: RequestId) -> Result<&TrackedRequest> {
        self.requests
            .get(&request_id)
            .ok_or(CopilotError::RequestNotFound(request_id))
    }

    fn complete_card(&mut self, request_id: RequestId, slot_id: u8, outcome: CardOutcome) {
        let Some(tracked) = self.requests.get_mut(&request_id) else {
            return;
        };

        let kind = outcome.result.as_ref().err().map(|e| e.kind);
        if !tracked
            .request
            .resolve_card(slot_id, outcome.result, outcome.attempts)
        {
            debug!(
                %request_id,
                slot = slot_id,
                status = %tracked.request.status,
                "discarding late card result"
            );
            return;
        }

        info!(
            %request_id,
            slot = slot_id,
            attempts = outcome.attempts,
            error = kind.map(ErrorKind::as_str),
            "card resolved"
        );

        if tracked.request.pending_count() == 0 {
            self.finalize(request_id);
        } else {
            tracked.publish();
        }
    }

    fn expire(&mut self, request_id: RequestId, timeout_secs: u64) {
        let Some(tracked) = self.requests.get_mut(&request_id) else {
            return;
        };
        if tracked.request.status != RequestStatus::Loading {
            return;
        }

        let error = CardError::new(
            ErrorKind::Timeout,
            format!("analysis did not finish within {timeout_secs}s"),
        );
        let closed = tracked.request.fail_pending(&error);
        warn!(%request_id, closed, "analysis timed out, failing pending cards");

        self.finalize(request_id);
    }

    fn finalize(&mut self, request_id: RequestId) {
        let Some(tracked) = self.requests.get_mut(&request_id) else {
            return;
        };

        let status = tracked.request.finalize();
        if !status.is_terminal() {
            return;
        }
        tracked.stop_deadline();
        tracked.publish();

        info!(
            %request_id,
            %status,
            ready = tracked.request.ready_count(),
            error = tracked.request.error.as_ref().map(|e| e.kind.as_str()),
            "analysis finished"
        );

        if self.active == Some(request_id) {
            self.active = None;
        }
    }
}

impl AnalysisOrchestrator {
    /// Create an orchestrator with default timeouts and retries
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self::from_parts(provider, OrchestratorConfig::default())
    }

    /// Create an orchestrator with explicit configuration
    ///
    /// The configuration is validated here as well, so a struct literal
    /// cannot slip a zero timeout past the builder.
    pub fn with_config(provider: Arc<dyn DataProvider>, config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(provider, config))
    }

    fn from_parts(provider: Arc<dyn DataProvider>, config: OrchestratorConfig) -> Self {
        Self {
            provider,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(OrchestratorState::default())),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Submit a raw ticker for analysis
    ///
    /// An invalid ticker is not an `Err`: it yields a request that is
    /// already `Failed` with a validation error, and no provider call is
    /// made. The only `Err` is [`CopilotError::ConcurrentRequest`] when
    /// another request is still loading.
    pub async fn submit(&self, raw_ticker: &str) -> Result<AnalysisRequest> {
        let mut state = self.state.lock().await;

        if let Some(active) = state.active {
            warn!(%active, raw_ticker, "rejecting submission while another analysis is loading");
            return Err(CopilotError::ConcurrentRequest { active });
        }

        let ticker = match TickerValidator::validate(raw_ticker) {
            Ok(ticker) => ticker,
            Err(error) => {
                let request = AnalysisRequest::rejected(raw_ticker, &error);
                info!(request_id = %request.request_id, raw_ticker, %error, "ticker rejected");
                state.insert(TrackedRequest::new(request.clone()), self.config.history_limit);
                return Ok(request);
            }
        };

        let request = AnalysisRequest::loading(ticker.clone(), raw_ticker);
        let request_id = request.request_id;
        let mut tracked = TrackedRequest::new(request.clone());

        // Spawned while holding the lock, so no completion can arrive
        // before the request is registered
        for slot in CardSlotRegistry::all_slots() {
            tokio::spawn(run_card(
                Arc::clone(&self.provider),
                Arc::clone(&self.config),
                Arc::downgrade(&self.state),
                request_id,
                ticker.clone(),
                slot,
                tracked.cancel.subscribe(),
            ));
        }
        tracked.deadline = Some(tokio::spawn(run_deadline(
            Arc::downgrade(&self.state),
            request_id,
            Arc::clone(&self.config),
            tracked.cancel.subscribe(),
        )));

        state.active = Some(request_id);
        state.insert(tracked, self.config.history_limit);

        info!(%request_id, ticker = %ticker, "analysis submitted");
        Ok(request)
    }

    /// Cancel a loading request
    ///
    /// Pending cards are closed as cancelled and in-flight fetches are
    /// abandoned. Cancelling a terminal request returns it unchanged.
    pub async fn cancel(&self, request_id: RequestId) -> Result<AnalysisRequest> {
        let mut state = self.state.lock().await;
        let tracked = state
            .requests
            .get_mut(&request_id)
            .ok_or(CopilotError::RequestNotFound(request_id))?;

        if !tracked.request.cancel() {
            debug!(%request_id, status = %tracked.request.status, "cancel is a no-op");
            return Ok(tracked.request.clone());
        }

        tracked.cancel.send_replace(true);
        tracked.stop_deadline();
        tracked.publish();
        let snapshot = tracked.request.clone();

        if state.active == Some(request_id) {
            state.active = None;
        }

        info!(%request_id, "analysis cancelled");
        Ok(snapshot)
    }

    /// Read-only snapshot of a request
    pub async fn get_status(&self, request_id: RequestId) -> Result<AnalysisRequest> {
        let state = self.state.lock().await;
        Ok(state.tracked(request_id)?.request.clone())
    }

    /// Watch a request; a new snapshot is published after every change
    pub async fn subscribe(&self, request_id: RequestId) -> Result<watch::Receiver<AnalysisRequest>> {
        let state = self.state.lock().await;
        Ok(state.tracked(request_id)?.snapshots.subscribe())
    }

    /// Wait until a request reaches a terminal status
    pub async fn wait(&self, request_id: RequestId) -> Result<AnalysisRequest> {
        let mut receiver = self.subscribe(request_id).await?;
        let waited = receiver
            .wait_for(AnalysisRequest::is_terminal)
            .await
            .map(|snapshot| snapshot.clone());
        let snapshot = match waited {
            Ok(snapshot) => snapshot,
            Err(_) => receiver.borrow().clone(),
        };
        Ok(snapshot)
    }

    /// Id of the request currently loading, if any
    pub async fn active_request(&self) -> Option<RequestId> {
        self.state.lock().await.active
    }

    /// Snapshots of the retained requests, oldest first
    ///
    /// Only the most recent `history_limit` requests are kept; a loading
    /// request is never evicted.
    pub async fn requests(&self) -> Vec<AnalysisRequest> {
        let state = self.state.lock().await;
        let mut tracked: Vec<_> = state.requests.values().collect();
        tracked.sort_by_key(|tracked| tracked.sequence);
        tracked
            .into_iter()
            .map(|tracked| tracked.request.clone())
            .collect()
    }
}

async fn run_card(
    provider: Arc<dyn DataProvider>,
    config: Arc<OrchestratorConfig>,
    state: Weak<Mutex<OrchestratorState>>,
    request_id: RequestId,
    ticker: Ticker,
    slot: &'static CardSlot,
    mut cancel: CancelReceiver,
) {
    let Some(outcome) =
        fetch_with_retry(provider.as_ref(), &ticker, slot, &config, &mut cancel).await
    else {
        return;
    };

    let Some(state) = state.upgrade() else {
        return;
    };
    state.lock().await.complete_card(request_id, slot.id, outcome);
}

async fn run_deadline(
    state: Weak<Mutex<OrchestratorState>>,
    request_id: RequestId,
    config: Arc<OrchestratorConfig>,
    mut cancel: CancelReceiver,
) {
    tokio::select! {
        biased;
        () = cancelled(&mut cancel) => return,
        () = tokio::time::sleep(config.request_timeout) => {}
    }

    let Some(state) = state.upgrade() else {
        return;
    };
    state
        .lock()
        .await
        .expire(request_id, config.request_timeout.as_secs());
}
