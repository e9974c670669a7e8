//! Configuration for the analysis orchestrator

use crate::error::{CopilotError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// Configuration for analysis requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Timeout for a single provider call
    pub card_timeout: Duration,

    /// Timeout for the whole request, after which pending cards fail
    pub request_timeout: Duration,

    /// Automatic retries per card on transient failure
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Upper bound for a single backoff
    pub retry_backoff_max: Duration,

    /// Lifespan of cached card payloads
    pub cache_ttl: Duration,

    /// Provider calls allowed per minute
    pub provider_rate_limit_per_minute: u32,

    /// Finished requests kept for `get_status` before the oldest are dropped
    pub history_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            card_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff_base: Duration::from_millis(250),
            retry_backoff_max: Duration::from_secs(2),
            cache_ttl: Duration::from_secs(300), // 5 minutes
            provider_rate_limit_per_minute: 120,
            history_limit: 100,
        }
    }
}

impl OrchestratorConfig {
    /// Create a new configuration builder
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    /// Overlay `COPILOT_*` environment variables that are set and parse
    pub fn with_env(mut self) -> Self {
        if let Some(secs) = env_u64("COPILOT_CARD_TIMEOUT_SECS") {
            self.card_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("COPILOT_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_u64("COPILOT_MAX_RETRIES") {
            self.max_retries = u32::try_from(retries).unwrap_or(u32::MAX);
        }
        if let Some(secs) = env_u64("COPILOT_CACHE_TTL_SECS") {
            self.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(limit) = env_u64("COPILOT_RATE_LIMIT_PER_MINUTE") {
            self.provider_rate_limit_per_minute = u32::try_from(limit).unwrap_or(u32::MAX);
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.card_timeout.is_zero() {
            return Err(CopilotError::ConfigError(
                "card_timeout must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(CopilotError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.retry_backoff_max < self.retry_backoff_base {
            return Err(CopilotError::ConfigError(
                "retry_backoff_max must not be smaller than retry_backoff_base".to_string(),
            ));
        }

        if self.provider_rate_limit_per_minute == 0 {
            return Err(CopilotError::ConfigError(
                "provider_rate_limit_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.history_limit == 0 {
            return Err(CopilotError::ConfigError(
                "history_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get retry backoff duration for attempt number
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.retry_backoff_base
            .checked_mul(factor)
            .unwrap_or(self.retry_backoff_max)
            .min(self.retry_backoff_max)
    }

    /// Rate limit as a governor-friendly non-zero value
    pub fn rate_limit(&self) -> NonZeroU32 {
        NonZeroU32::new(self.provider_rate_limit_per_minute).unwrap_or(NonZeroU32::MIN)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(key, value = %value, "ignoring unparseable setting: {e}");
            None
        }
    }
}

/// Builder for OrchestratorConfig
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    card_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    retry_backoff_max: Option<Duration>,
    cache_ttl: Option<Duration>,
    provider_rate_limit_per_minute: Option<u32>,
    history_limit: Option<usize>,
    use_env: bool,
}

impl OrchestratorConfigBuilder {
    /// Set the per-card provider timeout
    pub fn card_timeout(mut self, duration: Duration) -> Self {
        self.card_timeout = Some(duration);
        self
    }

    /// Set the whole-request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set the backoff cap
    pub fn retry_backoff_max(mut self, duration: Duration) -> Self {
        self.retry_backoff_max = Some(duration);
        self
    }

    /// Set cache TTL for card payloads
    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.cache_ttl = Some(duration);
        self
    }

    /// Set provider calls allowed per minute
    pub fn provider_rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.provider_rate_limit_per_minute = Some(limit);
        self
    }

    /// Set how many requests are retained
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Apply `COPILOT_*` environment overrides before explicit settings
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<OrchestratorConfig> {
        let defaults = if self.use_env {
            OrchestratorConfig::default().with_env()
        } else {
            OrchestratorConfig::default()
        };

        let config = OrchestratorConfig {
            card_timeout: self.card_timeout.unwrap_or(defaults.card_timeout),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            retry_backoff_max: self.retry_backoff_max.unwrap_or(defaults.retry_backoff_max),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            provider_rate_limit_per_minute: self
                .provider_rate_limit_per_minute
                .unwrap_or(defaults.provider_rate_limit_per_minute),
            history_limit: self.history_limit.unwrap_or(defaults.history_limit),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.card_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = OrchestratorConfig::builder()
            .max_retries(5)
            .card_timeout(Duration::from_secs(3))
            .request_timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.card_timeout, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_retries_is_valid() {
        let config = OrchestratorConfig::builder().max_retries(0).build().unwrap();
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_validation_rejects_zero_timeouts() {
        let config = OrchestratorConfig {
            card_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let result = OrchestratorConfig::builder()
            .request_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(CopilotError::ConfigError(_))));
    }

    #[test]
    fn test_validation_rejects_inverted_backoff() {
        let result = OrchestratorConfig::builder()
            .retry_backoff_base(Duration::from_secs(5))
            .retry_backoff_max(Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_empty_history() {
        let result = OrchestratorConfig::builder().history_limit(0).build();
        assert!(matches!(result, Err(CopilotError::ConfigError(_))));
        assert_eq!(OrchestratorConfig::default().history_limit, 100);
    }

    #[test]
    fn test_retry_backoff() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.retry_backoff(0), Duration::from_millis(250));
        assert_eq!(config.retry_backoff(1), Duration::from_millis(500));
        assert_eq!(config.retry_backoff(2), Duration::from_secs(1));
        assert_eq!(config.retry_backoff(3), Duration::from_secs(2));
        assert_eq!(config.retry_backoff(4), Duration::from_secs(2)); // capped
        assert_eq!(config.retry_backoff(40), Duration::from_secs(2));
    }

    #[test]
    fn test_rate_limit() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.rate_limit().get(), 120);
    }
}
