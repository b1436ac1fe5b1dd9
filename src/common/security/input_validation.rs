/// Declarative form validation
/// Applies a per-field schema over raw form values and sanitizes what passes
use super::audit::{AuditEventKind, AuditLog};
use super::sanitize::{SanitizeOptions, Sanitizer};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Required { label: String },
    InvalidInput,
    TooShort { min_length: usize },
    InvalidFormat { message: Option<String> },
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Required { label } => write!(f, "{} is required", label),
            FieldError::InvalidInput => write!(f, "Invalid input"),
            FieldError::TooShort { min_length } => {
                write!(f, "Minimum {} characters required", min_length)
            }
            FieldError::InvalidFormat { message } => {
                write!(f, "{}", message.as_deref().unwrap_or("Invalid format"))
            }
        }
    }
}

impl std::error::Error for FieldError {}

/// Validation rule for one form field
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub required: bool,
    /// Human-readable name used in messages; falls back to the field name
    pub label: Option<String>,
    pub max_length: Option<usize>,
    pub min_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub pattern_message: Option<String>,
}

impl FieldRule {
    /// Rule for a field that must be filled in
    pub fn required(label: impl Into<String>) -> Self {
        Self {
            required: true,
            label: Some(label.into()),
            ..Self::optional()
        }
    }

    /// Rule for a field that may be left empty
    pub fn optional() -> Self {
        Self {
            required: false,
            label: None,
            max_length: None,
            min_length: None,
            pattern: None,
            pattern_message: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    /// Require the sanitized (encoded) value to match `pattern`
    pub fn pattern(mut self, pattern: Regex, message: Option<&str>) -> Self {
        self.pattern = Some(pattern);
        self.pattern_message = message.map(str::to_string);
        self
    }
}

/// Ordered table of field rules.
///
/// Fields are validated in declaration order.
///
/// # Examples
///
/// ```
/// use narrative_guard::common::security::{FieldRule, FormSchema};
///
/// let schema = FormSchema::new()
///     .field("name", FieldRule::required("Name").max_length(10))
///     .field("notes", FieldRule::optional());
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormSchema {
    fields: Vec<(String, FieldRule)>,
}

impl FormSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field; re-declaring a name replaces its rule in place
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = rule,
            None => self.fields.push((name, rule)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, rule)| rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Raw form values keyed by field name
pub type FormData = HashMap<String, Value>;

/// Outcome of validating a whole form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True exactly when `errors` is empty
    pub valid: bool,
    pub errors: BTreeMap<String, String>,
    pub sanitized: BTreeMap<String, String>,
}

/// A value counts as empty when it is absent, null, or a blank string
fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Validates form data against a [`FormSchema`].
pub struct FormValidator {
    sanitizer: Arc<Sanitizer>,
    audit: Option<Arc<AuditLog>>,
}

impl FormValidator {
    pub fn new(sanitizer: Arc<Sanitizer>, audit: Option<Arc<AuditLog>>) -> Self {
        Self { sanitizer, audit }
    }

    /// Validate every schema field of `form`.
    ///
    /// Fields not named by the schema are ignored. Failures are reported
    /// per field; nothing here returns an error.
    pub fn validate(&self, form: &FormData, schema: &FormSchema) -> ValidationResult {
        let mut errors = BTreeMap::new();
        let mut sanitized = BTreeMap::new();

        for (field, rule) in schema.iter() {
            match self.validate_field(field, form.get(field), rule) {
                Ok(value) => {
                    sanitized.insert(field.to_string(), value);
                }
                Err(err) => {
                    tracing::debug!(field, error = %err, "Field rejected");
                    errors.insert(field.to_string(), err.to_string());
                }
            }
        }

        ValidationResult {
            valid: errors.is_empty(),
            errors,
            sanitized,
        }
    }

    /// Validate one field, returning its sanitized value
    fn validate_field(
        &self,
        field: &str,
        value: Option<&Value>,
        rule: &FieldRule,
    ) -> Result<String, FieldError> {
        if is_empty_value(value) {
            if rule.required {
                return Err(FieldError::Required {
                    label: rule.label.clone().unwrap_or_else(|| field.to_string()),
                });
            }
            return Ok(String::new());
        }

        let raw = value.unwrap_or(&Value::Null);
        let options = SanitizeOptions {
            max_length: rule.max_length,
        };
        let result = self.sanitizer.sanitize_value(raw, options);
        if !result.success {
            return Err(FieldError::InvalidInput);
        }

        if let Some(min_length) = rule.min_length {
            if result.value.chars().count() < min_length {
                return Err(FieldError::TooShort { min_length });
            }
        }

        if let Some(pattern) = &rule.pattern {
            if !pattern.is_match(&result.value) {
                return Err(FieldError::InvalidFormat {
                    message: rule.pattern_message.clone(),
                });
            }
        }

        if !result.warnings.is_empty() {
            if let Some(audit) = &self.audit {
                audit.record(
                    AuditEventKind::InputWarning,
                    json!({ "field": field, "warnings": result.warnings }),
                );
            }
        }

        Ok(result.value)
    }
}
