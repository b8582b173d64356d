//! Pure, synchronous step validation.
//!
//! Rules are read from the [`StepRegistry`]; message text is produced by an injected
//! [`MessageResolver`] so the engine never hardcodes copy.

mod messages;
mod rules;

pub use messages::{BilingualCatalog, MessageKey, MessageResolver};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{FieldMap, Locale, StepId};
use super::registry::StepRegistry;
use rules::RuleViolation;

/// Field-scoped validation outcome. Recomputed on demand, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: BTreeMap::new(),
        }
    }

    pub fn messages_for(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Numeric value of `field`, accepting JSON numbers and formatted strings.
pub fn field_number(fields: &FieldMap, field: &str) -> Option<f64> {
    fields.get(field).and_then(rules::as_number)
}

/// Boolean value of `field`, accepting JSON booleans and yes/no strings.
pub fn field_bool(fields: &FieldMap, field: &str) -> Option<bool> {
    fields.get(field).and_then(rules::as_bool)
}

#[derive(Clone)]
pub struct ValidationEngine {
    registry: Arc<StepRegistry>,
    messages: Arc<dyn MessageResolver>,
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("steps", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl ValidationEngine {
    pub fn new(registry: Arc<StepRegistry>, messages: Arc<dyn MessageResolver>) -> Self {
        Self { registry, messages }
    }

    /// Standard registry with the built-in bilingual catalog.
    pub fn standard() -> Self {
        Self::new(Arc::new(StepRegistry::standard()), Arc::new(BilingualCatalog))
    }

    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    pub fn validate(&self, step: StepId, fields: &FieldMap, locale: Locale) -> ValidationResult {
        let Some(descriptor) = self.registry.get(step) else {
            let mut errors = BTreeMap::new();
            errors.insert(
                "step".to_string(),
                vec![self.messages.resolve(&MessageKey::UnknownStep, "step", locale)],
            );
            return ValidationResult {
                is_valid: false,
                errors,
            };
        };

        let mut violations: Vec<RuleViolation> =
            rules::check_required(fields, descriptor.required_fields);
        for rule in descriptor.rules {
            violations.extend(rules::check_rule(fields, rule));
        }

        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for violation in violations {
            let message = self
                .messages
                .resolve(&violation.key, violation.field, locale);
            let entry = errors.entry(violation.field.to_string()).or_default();
            if !entry.contains(&message) {
                entry.push(message);
            }
        }

        if !errors.is_empty() {
            tracing::debug!(
                step = step.get(),
                fields = ?errors.keys().collect::<Vec<_>>(),
                "step failed validation"
            );
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::standard()
    }
}
