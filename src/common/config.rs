use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default cap applied to a single field when its rule declares none
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 1000;
/// Default cap on one front-end request line
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 10000;
/// Default sliding-window length (1 minute)
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
/// Default number of actions allowed per window
pub const DEFAULT_RATE_LIMIT_MAX: usize = 30;
/// Default number of retained audit events
pub const DEFAULT_AUDIT_LOG_CAPACITY: usize = 1000;
/// Default namespace prefix for persisted keys
pub const DEFAULT_STORAGE_PREFIX: &str = "narrativeos_";

/// Security configuration shared by every stage of the pipeline.
///
/// Every field has a default, so a config file only needs to name the
/// values it overrides:
///
/// ```
/// use narrative_guard::common::config::SecurityConfig;
///
/// let config: SecurityConfig = serde_json::from_str(r#"{ "rate_limit_max": 5 }"#).unwrap();
/// assert_eq!(config.rate_limit_max, 5);
/// assert_eq!(config.max_field_length, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum characters in one front-end request line; longer lines are refused unparsed
    pub max_input_length: usize,
    /// Field length cap used when a rule does not declare one
    pub max_field_length: usize,
    /// Sliding-window length in milliseconds
    pub rate_limit_window_ms: u64,
    /// Actions allowed within one window
    pub rate_limit_max: usize,
    /// When false, audit records are dropped
    pub audit_log_enabled: bool,
    /// Number of audit events retained before the oldest is evicted
    pub audit_log_capacity: usize,
    /// Prefix prepended to every persisted key
    pub storage_prefix: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
            rate_limit_window_ms: DEFAULT_RATE_LIMIT_WINDOW_MS,
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            audit_log_enabled: true,
            audit_log_capacity: DEFAULT_AUDIT_LOG_CAPACITY,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
        }
    }
}

impl SecurityConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded security configuration");
        Ok(config)
    }
}
