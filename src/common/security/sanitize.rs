/// Single-field sanitization: trim, cap, strip, detect, encode
use super::audit::{AuditEventKind, AuditLog};
use super::detection::PatternDetector;
use super::encoding::encode;
use crate::common::config::DEFAULT_MAX_FIELD_LENGTH;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Warning attached when a value is not a string
pub const INVALID_TYPE_WARNING: &str = "Invalid input type";
/// Warning attached when a value matches an injection signature
pub const SUSPICIOUS_WARNING: &str = "Potentially suspicious input pattern detected";
/// Characters of a suspicious value carried into its audit event
const AUDIT_EXCERPT_CHARS: usize = 100;

/// Per-call sanitization options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeOptions {
    /// Character cap; `None` or 0 falls back to the sanitizer default
    pub max_length: Option<usize>,
}

impl SanitizeOptions {
    pub fn max_length(max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
        }
    }
}

/// Outcome of sanitizing one value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeResult {
    pub success: bool,
    /// Encoded value, ready to interpolate into markup
    pub value: String,
    /// Non-fatal findings, in the order they were raised
    pub warnings: Vec<String>,
}

impl SanitizeResult {
    fn invalid_type() -> Self {
        Self {
            success: false,
            value: String::new(),
            warnings: vec![INVALID_TYPE_WARNING.to_string()],
        }
    }
}

/// First `n` characters of `s`
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Runs the sanitization steps over one field value.
///
/// Steps run in a fixed order: trim, length cap, null-byte strip, injection
/// detection, then encoding. Caps and detection see the raw text, never the
/// escaped entities.
pub struct Sanitizer {
    detector: Arc<PatternDetector>,
    audit: Option<Arc<AuditLog>>,
    default_max_length: usize,
}

impl Sanitizer {
    pub fn new(detector: Arc<PatternDetector>, audit: Option<Arc<AuditLog>>) -> Self {
        Self {
            detector,
            audit,
            default_max_length: DEFAULT_MAX_FIELD_LENGTH,
        }
    }

    /// Override the cap used when options carry none
    pub fn with_default_max_length(mut self, max_length: usize) -> Self {
        self.default_max_length = max_length;
        self
    }

    /// The detector consulted in the detection step
    pub fn detector(&self) -> &PatternDetector {
        &self.detector
    }

    /// Sanitize a loosely-typed value; anything but a string fails
    pub fn sanitize_value(&self, raw: &Value, options: SanitizeOptions) -> SanitizeResult {
        match raw {
            Value::String(s) => self.sanitize(s, options),
            _ => SanitizeResult::invalid_type(),
        }
    }

    /// Sanitize a string value
    pub fn sanitize(&self, raw: &str, options: SanitizeOptions) -> SanitizeResult {
        let mut warnings = Vec::new();

        let trimmed = raw.trim();

        let max_length = options
            .max_length
            .filter(|&n| n > 0)
            .unwrap_or(self.default_max_length);
        let capped = take_chars(trimmed, max_length);
        if capped.len() < trimmed.len() {
            warnings.push(format!("Input truncated to {} characters", max_length));
        }

        let value: String = capped.chars().filter(|&c| c != '\0').collect();

        if let Some(signature) = self.detector.first_match(&value) {
            warnings.push(SUSPICIOUS_WARNING.to_string());
            tracing::debug!(signature, "Suspicious input pattern");
            if let Some(audit) = &self.audit {
                audit.record(
                    AuditEventKind::PromptInjectionAttempt,
                    json!({ "input": take_chars(&value, AUDIT_EXCERPT_CHARS) }),
                );
            }
        }

        SanitizeResult {
            success: true,
            value: encode(&value),
            warnings,
        }
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(Arc::new(PatternDetector::default()), None)
    }
}
