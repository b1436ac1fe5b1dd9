//! Input-safety pipeline for form submissions.
//!
//! Every value a front end interpolates into generated markup passes through
//! this module first.
//!
//! # Modules
//!
//! - [`encoding`] - Entity encoding of markup-significant characters
//! - [`detection`] - Heuristic prompt-injection signatures
//! - [`rate_limit`] - Sliding-window action limiter
//! - [`audit`] - Bounded, redacting audit log
//! - [`sanitize`] - Per-field trim/cap/strip/detect/encode
//! - [`input_validation`] - Declarative per-form schemas
//! - [`helpers`] - Gating wrappers for front-end actions
//!
//! # Flow
//!
//! ```text
//! FormValidator ──> Sanitizer ──> PatternDetector
//!       │               │    └──> encode
//!       └───────────────┴──> AuditLog <── RateLimiter
//! ```
//!
//! Nothing here fails hard. Rejections come back as structured results and
//! suspicious input is flagged and audited, never blocked.
//!
//! # Examples
//!
//! ```
//! use narrative_guard::common::security::{FieldRule, FormSchema, Security};
//! use serde_json::json;
//!
//! let security = Security::default();
//!
//! let schema = FormSchema::new().field("name", FieldRule::required("Name").max_length(10));
//! let form = [("name".to_string(), json!("  Alice  "))].into_iter().collect();
//!
//! let result = security.validate_form_data(&form, &schema);
//! assert!(result.valid);
//! assert_eq!(result.sanitized["name"], "Alice");
//! ```

pub mod audit;
pub mod detection;
pub mod encoding;
pub mod helpers;
pub mod input_validation;
pub mod rate_limit;
pub mod sanitize;

pub use audit::{
    generate_id, AuditContext, AuditEvent, AuditEventKind, AuditLog, CspViolation, SecurityLevel,
};
pub use detection::{PatternDetector, RegexSignature, SignatureMatcher};
pub use encoding::{encode, encode_value};
pub use helpers::rate_limited;
pub use input_validation::{
    FieldError, FieldRule, FormData, FormSchema, FormValidator, ValidationResult,
};
pub use rate_limit::{RateLimitStatus, RateLimiter};
pub use sanitize::{SanitizeOptions, SanitizeResult, Sanitizer};

use crate::common::clock::{Clock, SystemClock};
use crate::common::config::SecurityConfig;
use crate::common::storage::{MemoryBackend, SecureStorage, StorageBackend};
use serde_json::Value;
use std::sync::Arc;

/// One front end's view of the pipeline.
///
/// Owns a shared audit log, one rate limiter, a sanitizer, a validator and
/// a storage facade, all wired to the same clock and configuration.
pub struct Security {
    config: SecurityConfig,
    audit: Arc<AuditLog>,
    limiter: RateLimiter,
    sanitizer: Arc<Sanitizer>,
    validator: FormValidator,
    storage: SecureStorage,
}

impl Security {
    /// Build the pipeline with in-memory storage
    pub fn new(config: SecurityConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_backend(config, clock, MemoryBackend::new())
    }

    /// Build the pipeline over a specific storage backend
    pub fn with_backend(
        config: SecurityConfig,
        clock: Arc<dyn Clock>,
        backend: impl StorageBackend + 'static,
    ) -> Self {
        Self::with_detector(config, clock, backend, PatternDetector::default())
    }

    /// Build the pipeline with a custom signature list
    pub fn with_detector(
        config: SecurityConfig,
        clock: Arc<dyn Clock>,
        backend: impl StorageBackend + 'static,
        detector: PatternDetector,
    ) -> Self {
        let audit = Arc::new(AuditLog::new(&config, clock.clone()));
        let limiter = RateLimiter::new(&config, clock, Some(audit.clone()));
        let sanitizer = Arc::new(
            Sanitizer::new(Arc::new(detector), Some(audit.clone()))
                .with_default_max_length(config.max_field_length),
        );
        let validator = FormValidator::new(sanitizer.clone(), Some(audit.clone()));
        let storage = SecureStorage::new(backend, config.storage_prefix.clone());

        Self {
            config,
            audit,
            limiter,
            sanitizer,
            validator,
            storage,
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn encode(&self, text: &str) -> String {
        encode(text)
    }

    pub fn sanitize(&self, raw: &Value, options: SanitizeOptions) -> SanitizeResult {
        self.sanitizer.sanitize_value(raw, options)
    }

    pub fn is_suspicious(&self, text: &str) -> bool {
        self.sanitizer.detector().is_suspicious(text)
    }

    pub fn check_rate_limit(&self) -> RateLimitStatus {
        self.limiter.check()
    }

    pub fn validate_form_data(&self, form: &FormData, schema: &FormSchema) -> ValidationResult {
        self.validator.validate(form, schema)
    }

    /// Record an event; a no-op when audit logging is disabled
    pub fn record(&self, kind: AuditEventKind, data: Value) -> Option<String> {
        self.audit.record(kind, data)
    }

    pub fn record_csp_violation(&self, violation: &CspViolation) -> Option<String> {
        self.audit.record_csp_violation(violation)
    }

    /// Copy of the audit history, oldest first
    pub fn audit_log(&self) -> Vec<AuditEvent> {
        self.audit.snapshot()
    }

    pub fn clear_audit_log(&self) {
        self.audit.clear()
    }

    /// Shared handle to the audit log
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn storage(&self) -> &SecureStorage {
        &self.storage
    }
}

impl Default for Security {
    fn default() -> Self {
        Self::new(SecurityConfig::default(), Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Security")
            .field("config", &self.config)
            .field("audit", &self.audit)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}
