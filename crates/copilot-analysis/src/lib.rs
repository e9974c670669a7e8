//! Analysis request lifecycle for the market intelligence co-pilot
//!
//! A user submits a ticker; the crate validates it, fans out seven
//! independent card fetches to a [`DataProvider`], and aggregates the card
//! outcomes into one [`AnalysisRequest`] with a terminal status.
//!
//! - [`TickerValidator`]: normalizes and validates raw ticker input
//! - [`CardSlotRegistry`]: the fixed seven-card layout and which cards are required
//! - [`AnalysisOrchestrator`]: the request state machine (submit, cancel, status)
//! - [`provider`]: the data contract plus simulated, cached and rate-limited providers
//!
//! # Example
//!
//! ```rust,no_run
//! use copilot_analysis::{AnalysisOrchestrator, SimulatedProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> copilot_analysis::Result<()> {
//!     let orchestrator = AnalysisOrchestrator::new(Arc::new(SimulatedProvider::new()));
//!
//!     let request = orchestrator.submit("aapl").await?;
//!     let finished = orchestrator.wait(request.request_id).await?;
//!     println!("{}: {}", request.raw_ticker, finished.status);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod meta;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod request;
pub mod retry;
pub mod ticker;

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};
pub use error::{CopilotError, ErrorKind, ProviderError, Result, ValidationError};
pub use meta::TickerMeta;
pub use orchestrator::AnalysisOrchestrator;
pub use provider::{
    CachedProvider, CardPayload, DataProvider, RateLimitedProvider, SimulatedProvider,
};
pub use registry::{CARD_COUNT, CardSlot, CardSlotRegistry};
pub use request::{
    AnalysisRequest, CardError, CardResult, CardStatus, RequestId, RequestStatus, resolve_status,
};
pub use ticker::{Ticker, TickerValidator};
