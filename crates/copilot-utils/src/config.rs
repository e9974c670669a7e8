//! Service identity and status reporting

use serde::{Deserialize, Serialize};

/// Service name reported by status checks
pub const SERVICE_NAME: &str = "ai-market-intelligence-copilot";

/// API version reported by status checks
pub const API_VERSION: &str = "v1";

/// Static identity of the running service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name
    pub service: String,
    /// API version
    pub version: String,
    /// Environment (development, production, etc.)
    pub environment: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            version: API_VERSION.to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Status payload describing service readiness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: String,
    pub version: String,
    pub status: String,
}

/// Liveness payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
}

impl ServiceInfo {
    /// Build service info, reading the environment name from `COPILOT_ENV`
    pub fn from_env() -> Self {
        let mut info = Self::default();
        if let Ok(env) = std::env::var("COPILOT_ENV") {
            if !env.trim().is_empty() {
                info.environment = env.trim().to_string();
            }
        }
        info
    }

    /// Readiness report
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            service: self.service.clone(),
            version: self.version.clone(),
            status: "ready".to_string(),
        }
    }

    /// Liveness report
    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok".to_string(),
        }
    }

    /// One-line banner used by the CLI
    pub fn banner(&self) -> String {
        format!("{} {} ({})", self.service, self.version, self.environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_payload() {
        let info = ServiceInfo::default();
        let status = info.status();

        assert_eq!(status.service, "ai-market-intelligence-copilot");
        assert_eq!(status.version, "v1");
        assert_eq!(status.status, "ready");
    }

    #[test]
    fn test_health_serializes() {
        let json = serde_json::to_value(ServiceInfo::default().health()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok"}));
    }

    #[test]
    fn test_banner() {
        let info = ServiceInfo {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert_eq!(info.banner(), "ai-market-intelligence-copilot v1 (production)");
    }
}
