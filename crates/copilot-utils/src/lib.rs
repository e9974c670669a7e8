//! Shared utilities for the market intelligence co-pilot
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and the service identity reported by status
//! endpoints and commands.

pub mod config;
pub mod logging;

pub use config::{HealthReport, ServiceInfo, ServiceStatus};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
