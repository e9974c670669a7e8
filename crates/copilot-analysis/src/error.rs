//! Error types for the analysis request lifecycle

use crate::request::RequestId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat classification of every failure the lifecycle can record
///
/// This is what gets attached to [`CardResult`](crate::CardResult) and
/// [`AnalysisRequest`](crate::AnalysisRequest) state, so the presentation
/// layer can always pick a distinguishing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad ticker, never retried
    Validation,
    /// Another analysis is still loading on the same orchestrator
    ConcurrentRequest,
    /// Transport failure talking to the data provider
    Network,
    /// A card fetch or the whole request ran out of time
    Timeout,
    /// The data provider refused the call for lack of budget
    RateLimit,
    /// The provider has no data for this ticker/slot
    NotFound,
    /// Slot id outside 1..=7
    UnknownSlot,
    /// Request id unknown to this orchestrator
    RequestNotFound,
    /// The card was closed by a cancellation
    Cancelled,
}

impl ErrorKind {
    /// Stable machine-readable code
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::ConcurrentRequest => "concurrent_request_error",
            Self::Network => "network_error",
            Self::Timeout => "timeout_error",
            Self::RateLimit => "rate_limit_error",
            Self::NotFound => "not_found_error",
            Self::UnknownSlot => "unknown_slot_error",
            Self::RequestNotFound => "request_not_found_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the orchestrator retries a card fetch that failed this way
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::RateLimit)
    }

    /// Message suitable for showing to an end user
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Validation => "That ticker doesn't look right. Use 1-5 letters or digits, e.g. AAPL or BRK.A.",
            Self::ConcurrentRequest => "An analysis is already running. Cancel it or wait for it to finish.",
            Self::Network => "Unable to reach the data provider. Please try again.",
            Self::Timeout => "The data provider took too long to respond.",
            Self::RateLimit => "Too many requests to the data provider. Please wait a moment.",
            Self::NotFound => "No data is available for this ticker.",
            Self::UnknownSlot => "This card does not exist.",
            Self::RequestNotFound => "This analysis could not be found.",
            Self::Cancelled => "The analysis was cancelled.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a raw ticker string is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("ticker must not be empty")]
    Empty,

    #[error("ticker is {len} characters long, at most {max} are allowed before the class suffix")]
    TooLong { len: usize, max: usize },

    #[error("invalid character '{ch}' at position {index}")]
    InvalidChar { ch: char, index: usize },

    #[error("ticker may contain at most one dot")]
    MultipleDots,

    #[error("dot must separate a symbol and a class suffix")]
    MisplacedDot,

    #[error("class suffix is {len} characters long, at most {max} are allowed")]
    SuffixTooLong { len: usize, max: usize },
}

/// Failures reported by a [`DataProvider`](crate::DataProvider)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Provider did not answer in time
    #[error("Timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// No data for this ticker/slot
    #[error("No data for {ticker} in slot {slot}")]
    NotFound { ticker: String, slot: u8 },

    /// Provider budget exhausted
    #[error("Rate limit exceeded for {provider}")]
    RateLimited { provider: String },
}

impl ProviderError {
    /// Classify the error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
        }
    }

    /// Network, timeout and rate-limit failures are transient
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Request-level errors returned by orchestrator operations
#[derive(Debug, Error)]
pub enum CopilotError {
    /// Ticker rejected before any fetch
    #[error("Invalid ticker: {0}")]
    Validation(#[from] ValidationError),

    /// Orchestrator already has a loading request
    #[error("Analysis {active} is still loading")]
    ConcurrentRequest { active: RequestId },

    /// Request id unknown to this orchestrator
    #[error("Analysis request {0} not found")]
    RequestNotFound(RequestId),

    /// Slot id outside the fixed catalog
    #[error("Unknown card slot: {0}")]
    UnknownSlot(u8),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CopilotError {
    /// Classify the error; configuration problems have no lifecycle kind
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Validation(_) => Some(ErrorKind::Validation),
            Self::ConcurrentRequest { .. } => Some(ErrorKind::ConcurrentRequest),
            Self::RequestNotFound(_) => Some(ErrorKind::RequestNotFound),
            Self::UnknownSlot(_) => Some(ErrorKind::UnknownSlot),
            Self::ConfigError(_) => None,
        }
    }
}

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, CopilotError>;
