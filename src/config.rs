//! Application and server configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants as cn;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// What goes into response envelopes.
///
/// `return_traceback_on_error` exposes internal error chains to callers and
/// is meant for development only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub return_request_id: bool,
    pub return_message_on_error: bool,
    pub return_traceback_on_error: bool,
    pub return_user_data_on_error: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            return_request_id: true,
            return_message_on_error: true,
            return_traceback_on_error: false,
            return_user_data_on_error: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    /// Reported in health checks.
    pub meta: Map<String, Value>,
    pub expose_docs: bool,
    pub docs_json_url: String,
    /// Headers checked, in order, for a caller-supplied request id.
    pub request_id_headers: Vec<String>,
    pub responses: ResponseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            description: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            meta: Map::new(),
            expose_docs: false,
            docs_json_url: "/_docs.json".to_string(),
            request_id_headers: vec!["x-request-id".to_string()],
            responses: ResponseConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "name".to_string(),
            });
        }
        if !self.docs_json_url.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "docs_json_url".to_string(),
                value: self.docs_json_url.clone(),
                reason: "must start with '/'".to_string(),
            });
        }
        let reserved = [
            cn::LIVENESS_ENDPOINT,
            cn::READINESS_ENDPOINT,
            cn::ROOT_ENDPOINT,
        ];
        if reserved.contains(&self.docs_json_url.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "docs_json_url".to_string(),
                value: self.docs_json_url.clone(),
                reason: "collides with a built-in route".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_payload_size: usize,
    pub workers: Option<usize>,
    /// Seconds between readiness summaries in the log; 0 disables them.
    pub health_log_interval: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_payload_size: 256 * 1024 * 1024,
            workers: None,
            health_log_interval: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.responses.return_message_on_error);
        assert!(!config.responses.return_traceback_on_error);
        assert!(!config.responses.return_user_data_on_error);
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "name": "ratings",
            "responses": {"return_traceback_on_error": true}
        }))
        .unwrap();
        assert_eq!(config.name, "ratings");
        assert_eq!(config.docs_json_url, "/_docs.json");
        assert!(config.responses.return_traceback_on_error);
        assert!(config.responses.return_message_on_error);
    }

    #[test]
    fn test_docs_url_cannot_shadow_health_checks() {
        let config = AppConfig {
            docs_json_url: "/-/alive".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
