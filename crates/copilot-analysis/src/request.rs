//! Analysis request value objects
//!
//! An [`AnalysisRequest`] always holds exactly seven [`CardResult`]s, one per
//! [`CardSlot`](crate::CardSlot), in slot order. Cards move from `Pending` to
//! `Ready` or `Failed` once and never go back; the request itself stops
//! changing as soon as its status is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ErrorKind, ValidationError};
use crate::provider::CardPayload;
use crate::registry::{CARD_COUNT, CardSlotRegistry};
use crate::ticker::Ticker;

/// Unique id of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Lifecycle status of a whole request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Idle,
    Loading,
    Succeeded,
    PartiallySucceeded,
    Failed,
    Cancelled,
}

impl RequestStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::PartiallySucceeded | Self::Failed | Self::Cancelled
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Succeeded => "succeeded",
            Self::PartiallySucceeded => "partially_succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for RequestStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-card status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Pending,
    Ready,
    Failed,
}

impl CardStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Error recorded on a failed card or request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CardError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for CardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of one card within one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardResult {
    pub slot_id: u8,
    pub status: CardStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<CardPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CardError>,
    /// Provider calls made for this card, retries included
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CardResult {
    pub fn pending(slot_id: u8) -> Self {
        Self {
            slot_id,
            status: CardStatus::Pending,
            payload: None,
            error: None,
            attempts: 0,
            completed_at: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == CardStatus::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.status == CardStatus::Failed
    }

    fn resolve(&mut self, outcome: std::result::Result<CardPayload, CardError>, attempts: u32) {
        match outcome {
            Ok(payload) => {
                self.status = CardStatus::Ready;
                self.payload = Some(payload);
            }
            Err(error) => {
                self.status = CardStatus::Failed;
                self.error = Some(error);
            }
        }
        self.attempts = attempts;
        self.completed_at = Some(Utc::now());
    }
}

/// One submitted analysis and its seven card outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub request_id: RequestId,
    /// `None` when the raw input never validated
    pub ticker: Option<Ticker>,
    /// Input exactly as submitted
    pub raw_ticker: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub cards: Vec<CardResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CardError>,
}

impl AnalysisRequest {
    /// A new request in `Loading` state with seven pending cards
    pub fn loading(ticker: Ticker, raw_ticker: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            ticker: Some(ticker),
            raw_ticker: raw_ticker.into(),
            submitted_at: Utc::now(),
            completed_at: None,
            status: RequestStatus::Loading,
            cards: CardSlotRegistry::all_slots()
                .iter()
                .map(|slot| CardResult::pending(slot.id))
                .collect(),
            error: None,
        }
    }

    /// A request that failed validation; every card is closed as failed
    pub fn rejected(raw_ticker: impl Into<String>, error: &ValidationError) -> Self {
        let now = Utc::now();
        let card_error = CardError::new(ErrorKind::Validation, error.to_string());
        let cards = CardSlotRegistry::all_slots()
            .iter()
            .map(|slot| CardResult {
                slot_id: slot.id,
                status: CardStatus::Failed,
                payload: None,
                error: Some(card_error.clone()),
                attempts: 0,
                completed_at: Some(now),
            })
            .collect();

        Self {
            request_id: RequestId::new(),
            ticker: None,
            raw_ticker: raw_ticker.into(),
            submitted_at: now,
            completed_at: Some(now),
            status: RequestStatus::Failed,
            cards,
            error: Some(card_error),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Card for a slot id
    pub fn card(&self, slot_id: u8) -> Option<&CardResult> {
        self.cards.iter().find(|card| card.slot_id == slot_id)
    }

    pub fn pending_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|card| card.status == CardStatus::Pending)
            .count()
    }

    pub fn ready_count(&self) -> usize {
        self.cards.iter().filter(|card| card.is_ready()).count()
    }

    /// Record a card outcome
    ///
    /// Returns `false` and changes nothing when the request is terminal or the
    /// card already resolved.
    pub(crate) fn resolve_card(
        &mut self,
        slot_id: u8,
        outcome: std::result::Result<CardPayload, CardError>,
        attempts: u32,
    ) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self.cards.iter_mut().find(|card| card.slot_id == slot_id) {
            Some(card) if card.status == CardStatus::Pending => {
                card.resolve(outcome, attempts);
                true
            }
            _ => false,
        }
    }

    /// Close every still-pending card with the same error, returning how many
    pub(crate) fn fail_pending(&mut self, error: &CardError) -> usize {
        if self.is_terminal() {
            return 0;
        }
        let mut closed = 0;
        for card in &mut self.cards {
            if card.status == CardStatus::Pending {
                card.resolve(Err(error.clone()), card.attempts);
                closed += 1;
            }
        }
        closed
    }

    /// Compute and store the terminal status once every card is resolved
    pub(crate) fn finalize(&mut self) -> RequestStatus {
        if self.is_terminal() || self.pending_count() > 0 {
            return self.status;
        }
        let (status, error) = resolve_status(&self.cards);
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
        status
    }

    /// Move a loading request to `Cancelled`, closing pending cards
    pub(crate) fn cancel(&mut self) -> bool {
        if self.status != RequestStatus::Loading {
            return false;
        }
        let error = CardError::new(ErrorKind::Cancelled, "analysis cancelled");
        self.fail_pending(&error);
        self.status = RequestStatus::Cancelled;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        true
    }
}

/// Derive the request status from seven resolved cards
///
/// All ready is a success. Any failed required card, or every card failed,
/// is a failure. Anything else is a partial success.
pub fn resolve_status(cards: &[CardResult]) -> (RequestStatus, Option<CardError>) {
    debug_assert_eq!(cards.len(), CARD_COUNT);

    if cards.iter().all(CardResult::is_ready) {
        return (RequestStatus::Succeeded, None);
    }

    let is_required = |card: &&CardResult| {
        CardSlotRegistry::slot_by_id(card.slot_id).is_ok_and(|slot| slot.required)
    };

    let failed_required = cards
        .iter()
        .filter(|card| card.is_failed())
        .find(is_required);
    if let Some(card) = failed_required {
        return (RequestStatus::Failed, card.error.clone());
    }

    if cards.iter().all(CardResult::is_failed) {
        return (
            RequestStatus::Failed,
            cards.iter().find_map(|card| card.error.clone()),
        );
    }

    (RequestStatus::PartiallySucceeded, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ticker() -> Ticker {
        Ticker::parse("AAPL").unwrap()
    }

    fn resolved(failed: &[u8]) -> AnalysisRequest {
        let mut request = AnalysisRequest::loading(ticker(), "AAPL");
        for id in 1..=7 {
            let outcome = if failed.contains(&id) {
                Err(CardError::new(ErrorKind::NotFound, "no data"))
            } else {
                Ok(json!({ "slot": id }))
            };
            assert!(request.resolve_card(id, outcome, 1));
        }
        request
    }

    #[test]
    fn test_loading_has_seven_pending_cards() {
        let request = AnalysisRequest::loading(ticker(), "aapl");
        assert_eq!(request.status, RequestStatus::Loading);
        assert_eq!(request.cards.len(), CARD_COUNT);
        assert_eq!(request.pending_count(), CARD_COUNT);
        let ids: Vec<u8> = request.cards.iter().map(|c| c.slot_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_rejected_request_is_terminal() {
        let request = AnalysisRequest::rejected("AA$PL", &ValidationError::Empty);
        assert_eq!(request.status, RequestStatus::Failed);
        assert!(request.ticker.is_none());
        assert_eq!(request.cards.len(), CARD_COUNT);
        assert!(request.cards.iter().all(CardResult::is_failed));
        assert_eq!(request.error.as_ref().map(|e| e.kind), Some(ErrorKind::Validation));
    }

    #[test]
    fn test_all_ready_succeeds() {
        let mut request = resolved(&[]);
        assert_eq!(request.finalize(), RequestStatus::Succeeded);
        assert!(request.error.is_none());
        assert!(request.completed_at.is_some());
    }

    #[test]
    fn test_required_failure_fails_request() {
        let mut request = resolved(&[4]);
        assert_eq!(request.finalize(), RequestStatus::Failed);
        assert_eq!(request.error.as_ref().map(|e| e.kind), Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_optional_failure_is_partial() {
        let mut request = resolved(&[3]);
        assert_eq!(request.finalize(), RequestStatus::PartiallySucceeded);
        assert!(request.error.is_none());

        let mut request = resolved(&[2, 3, 5, 6]);
        assert_eq!(request.finalize(), RequestStatus::PartiallySucceeded);
    }

    #[test]
    fn test_all_failed_fails_request() {
        let mut request = resolved(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(request.finalize(), RequestStatus::Failed);
    }

    #[test]
    fn test_finalize_waits_for_pending_cards() {
        let mut request = AnalysisRequest::loading(ticker(), "AAPL");
        request.resolve_card(1, Ok(json!({})), 1);
        assert_eq!(request.finalize(), RequestStatus::Loading);
        assert!(request.completed_at.is_none());
    }

    #[test]
    fn test_card_resolves_once() {
        let mut request = AnalysisRequest::loading(ticker(), "AAPL");
        assert!(request.resolve_card(2, Ok(json!({"v": 1})), 1));
        assert!(!request.resolve_card(2, Err(CardError::new(ErrorKind::Network, "late")), 3));
        let card = request.card(2).unwrap();
        assert_eq!(card.status, CardStatus::Ready);
        assert_eq!(card.payload, Some(json!({"v": 1})));
        assert_eq!(card.attempts, 1);
    }

    #[test]
    fn test_unknown_slot_is_ignored() {
        let mut request = AnalysisRequest::loading(ticker(), "AAPL");
        assert!(!request.resolve_card(9, Ok(json!({})), 1));
        assert_eq!(request.pending_count(), CARD_COUNT);
    }

    #[test]
    fn test_cancel_closes_pending_and_freezes() {
        let mut request = AnalysisRequest::loading(ticker(), "AAPL");
        request.resolve_card(1, Ok(json!({})), 1);

        assert!(request.cancel());
        assert_eq!(request.status, RequestStatus::Cancelled);
        assert_eq!(request.pending_count(), 0);
        assert_eq!(request.card(1).unwrap().status, CardStatus::Ready);
        assert_eq!(
            request.card(2).unwrap().error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Cancelled)
        );

        let snapshot = request.clone();
        assert!(!request.cancel());
        assert!(!request.resolve_card(2, Ok(json!({})), 1));
        assert_eq!(request.finalize(), RequestStatus::Cancelled);
        assert_eq!(request, snapshot);
    }

    #[test]
    fn test_request_id_parses() {
        let id = RequestId::new();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<RequestId>().is_err());
    }

    #[test]
    fn test_snapshot_serializes_snake_case() {
        let request = resolved(&[6]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["status"], json!("loading"));
        assert_eq!(value["cards"][5]["status"], json!("failed"));
        assert_eq!(value["cards"][5]["error"]["kind"], json!("not_found"));
        assert_eq!(value["ticker"], json!("AAPL"));
    }
}
