/// Audit logging infrastructure for security events
/// Keeps a bounded in-memory history and mirrors every event to tracing
use crate::common::clock::{Clock, SystemClock};
use crate::common::config::SecurityConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

/// Keys stripped from event data before it is stored
const REDACTED_KEYS: &[&str] = &["password", "token", "credential"];

/// Security levels for audit events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SecurityLevel {
    /// Informational security event (normal operation)
    Info,
    /// Warning - suspicious but allowed
    Warning,
    /// Error - security violation or failure
    Error,
    /// Critical - serious security breach attempt
    Critical,
}

/// Audit event types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditEventKind {
    /// Input matched a prompt-injection signature
    PromptInjectionAttempt,
    /// An action was refused by the rate limiter
    RateLimitExceeded,
    /// A field was accepted but sanitization produced warnings
    InputWarning,
    /// The page reported a content-security-policy violation
    CspViolation,
    /// The user moved to another page
    Navigation,
    /// The front end finished starting up
    AppInitialized,
    /// Any other caller-defined tag
    Custom(String),
}

impl AuditEventKind {
    /// Wire tag for this kind
    pub fn as_str(&self) -> &str {
        match self {
            AuditEventKind::PromptInjectionAttempt => "PROMPT_INJECTION_ATTEMPT",
            AuditEventKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AuditEventKind::InputWarning => "INPUT_WARNING",
            AuditEventKind::CspViolation => "CSP_VIOLATION",
            AuditEventKind::Navigation => "NAVIGATION",
            AuditEventKind::AppInitialized => "APP_INITIALIZED",
            AuditEventKind::Custom(tag) => tag,
        }
    }

    /// Level the event is mirrored to tracing at
    pub fn level(&self) -> SecurityLevel {
        match self {
            AuditEventKind::PromptInjectionAttempt => SecurityLevel::Error,
            AuditEventKind::RateLimitExceeded
            | AuditEventKind::InputWarning
            | AuditEventKind::CspViolation => SecurityLevel::Warning,
            AuditEventKind::Navigation
            | AuditEventKind::AppInitialized
            | AuditEventKind::Custom(_) => SecurityLevel::Info,
        }
    }
}

impl From<&str> for AuditEventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "PROMPT_INJECTION_ATTEMPT" => AuditEventKind::PromptInjectionAttempt,
            "RATE_LIMIT_EXCEEDED" => AuditEventKind::RateLimitExceeded,
            "INPUT_WARNING" => AuditEventKind::InputWarning,
            "CSP_VIOLATION" => AuditEventKind::CspViolation,
            "NAVIGATION" => AuditEventKind::Navigation,
            "APP_INITIALIZED" => AuditEventKind::AppInitialized,
            other => AuditEventKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AuditEventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditEventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(AuditEventKind::from(tag.as_str()))
    }
}

/// Ambient metadata attached to every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    /// Client identification (user-agent equivalent)
    pub user_agent: String,
    /// Where the event happened (URL equivalent)
    pub location: String,
}

impl Default for AuditContext {
    fn default() -> Self {
        Self {
            user_agent: format!("narrative-guard/{}", env!("CARGO_PKG_VERSION")),
            location: String::new(),
        }
    }
}

/// Immutable record of one security-relevant occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: AuditEventKind,
    /// Caller data with sensitive keys removed
    pub data: Map<String, Value>,
    pub user_agent: String,
    pub location: String,
}

/// Browser content-security-policy violation report.
///
/// Field names follow the browser's `SecurityPolicyViolationEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CspViolation {
    #[serde(rename = "violatedDirective")]
    pub violated_directive: String,
    #[serde(rename = "blockedURI")]
    pub blocked_uri: String,
    #[serde(rename = "documentURI")]
    pub document_uri: String,
}

/// Generate a random unique identifier for an event
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Shallow copy of `data` as a map, minus the redacted keys.
///
/// Objects are copied; `null` becomes an empty map; any other value is
/// stored under `"value"`.
fn redact(data: Value) -> Map<String, Value> {
    let mut map = match data {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    for key in REDACTED_KEYS {
        map.remove(*key);
    }
    map
}

/// Bounded audit log.
///
/// Events are appended in order; once more than `capacity` are held the
/// oldest are evicted. A capacity of 0 means unbounded.
///
/// # Examples
///
/// ```
/// use narrative_guard::common::security::{AuditEventKind, AuditLog};
/// use serde_json::json;
///
/// let log = AuditLog::with_capacity(1000);
/// log.record(AuditEventKind::Navigation, json!({ "page": "positioning", "token": "abc" }));
///
/// let events = log.snapshot();
/// assert_eq!(events.len(), 1);
/// assert!(events[0].data.get("token").is_none());
/// ```
pub struct AuditLog {
    events: Mutex<VecDeque<AuditEvent>>,
    context: Mutex<AuditContext>,
    capacity: usize,
    enabled: bool,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    /// Create an audit log from configuration
    pub fn new(config: &SecurityConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            context: Mutex::new(AuditContext::default()),
            capacity: config.audit_log_capacity,
            enabled: config.audit_log_enabled,
            clock,
        }
    }

    /// Enabled log on the system clock with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let config = SecurityConfig {
            audit_log_capacity: capacity,
            ..SecurityConfig::default()
        };
        Self::new(&config, Arc::new(SystemClock))
    }

    /// Log that drops every record
    pub fn disabled() -> Self {
        let config = SecurityConfig {
            audit_log_enabled: false,
            ..SecurityConfig::default()
        };
        Self::new(&config, Arc::new(SystemClock))
    }

    /// Whether records are kept
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Replace the ambient context attached to subsequent events
    pub fn set_context(&self, context: AuditContext) {
        *self.context.lock().unwrap_or_else(PoisonError::into_inner) = context;
    }

    /// Current ambient context
    pub fn context(&self) -> AuditContext {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record an event. Returns the new event id, or `None` when the log is disabled.
    pub fn record(&self, kind: AuditEventKind, data: Value) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let context = self.context();
        let event = AuditEvent {
            id: generate_id(),
            timestamp: self.clock.now(),
            kind,
            data: redact(data),
            user_agent: context.user_agent,
            location: context.location,
        };
        let id = event.id.clone();

        Self::log_to_tracing(&event);

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_back(event);
        if self.capacity > 0 {
            while events.len() > self.capacity {
                events.pop_front();
            }
        }

        Some(id)
    }

    /// Record a content-security-policy violation
    pub fn record_csp_violation(&self, violation: &CspViolation) -> Option<String> {
        let data = serde_json::to_value(violation).unwrap_or(Value::Null);
        self.record(AuditEventKind::CspViolation, data)
    }

    /// Copy of every retained event, oldest first
    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Drop every retained event
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if no events are retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mirror an event to tracing at its security level
    fn log_to_tracing(event: &AuditEvent) {
        let event_json = serde_json::to_string(event)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize event: {}\"}}", e));

        match event.kind.level() {
            SecurityLevel::Info => {
                info!(
                    security_level = "info",
                    event_type = %event.kind,
                    event = %event_json,
                    "Security audit event"
                );
            }
            SecurityLevel::Warning => {
                warn!(
                    security_level = "warning",
                    event_type = %event.kind,
                    event = %event_json,
                    "Security audit warning"
                );
            }
            SecurityLevel::Error => {
                error!(
                    security_level = "error",
                    event_type = %event.kind,
                    event = %event_json,
                    "Security audit error"
                );
            }
            SecurityLevel::Critical => {
                error!(
                    security_level = "critical",
                    event_type = %event.kind,
                    event = %event_json,
                    "CRITICAL security audit event"
                );
            }
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(&SecurityConfig::default(), Arc::new(SystemClock))
    }
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::clock::ManualClock;
    use serde_json::json;

    #[test]
    fn test_record_redacts_sensitive_keys() {
        let log = AuditLog::default();
        log.record(
            AuditEventKind::Custom("LOGIN".to_string()),
            json!({
                "user": "alice",
                "password": "hunter2",
                "token": "abc",
                "credential": "key",
                "Password": "kept",
            }),
        );

        let events = log.snapshot();
        let data = &events[0].data;
        assert_eq!(data.get("user"), Some(&json!("alice")));
        assert!(data.get("password").is_none());
        assert!(data.get("token").is_none());
        assert!(data.get("credential").is_none());
        // Matching is exact and case-sensitive
        assert_eq!(data.get("Password"), Some(&json!("kept")));
    }

    #[test]
    fn test_record_non_object_data() {
        let log = AuditLog::default();
        log.record(AuditEventKind::Navigation, json!(null));
        log.record(AuditEventKind::Navigation, json!("dashboard"));

        let events = log.snapshot();
        assert!(events[0].data.is_empty());
        assert_eq!(events[1].data.get("value"), Some(&json!("dashboard")));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = AuditLog::with_capacity(3);
        for i in 0..5 {
            log.record(AuditEventKind::Navigation, json!({ "seq": i }));
        }

        let events = log.snapshot();
        assert_eq!(events.len(), 3);
        let seqs: Vec<_> = events.iter().map(|e| e.data["seq"].clone()).collect();
        assert_eq!(seqs, vec![json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let log = AuditLog::with_capacity(0);
        for _ in 0..50 {
            log.record(AuditEventKind::Navigation, json!({}));
        }
        assert_eq!(log.len(), 50);
    }

    #[test]
    fn test_disabled_log_is_noop() {
        let log = AuditLog::disabled();
        assert!(!log.is_enabled());
        assert!(log.record(AuditEventKind::Navigation, json!({})).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_event_ids_are_unique() {
        let log = AuditLog::default();
        let a = log.record(AuditEventKind::Navigation, json!({})).unwrap();
        let b = log.record(AuditEventKind::Navigation, json!({})).unwrap();
        assert_ne!(a, b);
        assert_eq!(uuid::Uuid::parse_str(&a).unwrap().get_version_num(), 4);
    }

    #[test]
    fn test_timestamp_and_context() {
        let clock = Arc::new(ManualClock::from_millis(1_700_000_000_000));
        let log = AuditLog::new(&SecurityConfig::default(), clock.clone());
        log.set_context(AuditContext {
            user_agent: "test-agent".to_string(),
            location: "app://positioning".to_string(),
        });

        log.record(AuditEventKind::AppInitialized, json!({}));
        let event = &log.snapshot()[0];
        assert_eq!(event.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(event.user_agent, "test-agent");
        assert_eq!(event.location, "app://positioning");
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let log = AuditLog::default();
        log.record(AuditEventKind::Navigation, json!({}));
        let mut snapshot = log.snapshot();
        snapshot.clear();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_clear() {
        let log = AuditLog::default();
        log.record(AuditEventKind::Navigation, json!({}));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_csp_violation() {
        let log = AuditLog::default();
        log.record_csp_violation(&CspViolation {
            violated_directive: "script-src".to_string(),
            blocked_uri: "https://evil.example".to_string(),
            document_uri: "https://app.example".to_string(),
        });

        let event = &log.snapshot()[0];
        assert_eq!(event.kind, AuditEventKind::CspViolation);
        assert_eq!(event.data["violatedDirective"], json!("script-src"));
        assert_eq!(event.data["blockedURI"], json!("https://evil.example"));
        assert_eq!(event.data["documentURI"], json!("https://app.example"));
        assert!(event.data.get("violated_directive").is_none());
    }

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in [
            AuditEventKind::PromptInjectionAttempt,
            AuditEventKind::RateLimitExceeded,
            AuditEventKind::InputWarning,
            AuditEventKind::CspViolation,
            AuditEventKind::Navigation,
            AuditEventKind::AppInitialized,
        ] {
            assert_eq!(AuditEventKind::from(kind.as_str()), kind);
        }
        assert_eq!(
            AuditEventKind::from("EXPORT"),
            AuditEventKind::Custom("EXPORT".to_string())
        );
    }

    #[test]
    fn test_event_serializes_type_tag() {
        let log = AuditLog::default();
        log.record(AuditEventKind::RateLimitExceeded, json!({ "requestCount": 30 }));
        let value = serde_json::to_value(&log.snapshot()[0]).unwrap();
        assert_eq!(value["type"], json!("RATE_LIMIT_EXCEEDED"));
        assert_eq!(value["data"]["requestCount"], json!(30));
    }
}
