use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::messages::MessageKey;
use crate::wizard::domain::FieldMap;
use crate::wizard::registry::FieldRule;

/// Single failed check before message resolution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RuleViolation {
    pub field: &'static str,
    pub key: MessageKey,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"))
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\+?1[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}$").expect("phone regex")
    })
}

fn zip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{5}$").expect("zip regex"))
}

fn state_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z]{2}$").expect("state regex"))
}

/// Empty strings, empty lists, empty objects and nulls count as absent.
pub(crate) fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => true,
    }
}

/// Numbers may arrive as JSON numbers or as formatted strings such as `"$350,000"`.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let cleaned: String = text
                .chars()
                .filter(|ch| !matches!(ch, '$' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "si" | "sí" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim)
}

pub(crate) fn check_required(fields: &FieldMap, required: &[&'static str]) -> Vec<RuleViolation> {
    required
        .iter()
        .filter(|field| !is_present(fields.get(**field)))
        .map(|field| RuleViolation {
            field: *field,
            key: MessageKey::Required,
        })
        .collect()
}

fn present_value<'a>(fields: &'a FieldMap, field: &str) -> Option<&'a Value> {
    fields.get(field).filter(|value| is_present(Some(*value)))
}

/// Evaluate one rule. Format rules only fire for present values so that a missing
/// optional field never produces a format message.
pub(crate) fn check_rule(fields: &FieldMap, rule: &FieldRule) -> Vec<RuleViolation> {
    let present = |field: &str| present_value(fields, field);

    let violation = |field: &'static str, key: MessageKey| vec![RuleViolation { field, key }];

    match *rule {
        FieldRule::Email(field) => match present(field) {
            Some(value) if !as_text(value).is_some_and(|text| email_pattern().is_match(text)) => {
                violation(field, MessageKey::InvalidEmail)
            }
            _ => Vec::new(),
        },
        FieldRule::Phone(field) => match present(field) {
            Some(value) if !as_text(value).is_some_and(|text| phone_pattern().is_match(text)) => {
                violation(field, MessageKey::InvalidPhone)
            }
            _ => Vec::new(),
        },
        FieldRule::Zip(field) => match present(field) {
            Some(value) => {
                let text = match value {
                    Value::Number(number) => number.to_string(),
                    other => as_text(other).unwrap_or_default().to_string(),
                };
                if zip_pattern().is_match(&text) {
                    Vec::new()
                } else {
                    violation(field, MessageKey::InvalidZip)
                }
            }
            None => Vec::new(),
        },
        FieldRule::StateCode(field) => match present(field) {
            Some(value) if !as_text(value).is_some_and(|text| state_pattern().is_match(text)) => {
                violation(field, MessageKey::InvalidState)
            }
            _ => Vec::new(),
        },
        FieldRule::Range { field, min, max } => match present(field) {
            Some(value) => match as_number(value) {
                Some(number) if number >= min && number <= max => Vec::new(),
                Some(_) => violation(field, MessageKey::OutOfRange { min, max }),
                None => violation(field, MessageKey::NotANumber),
            },
            None => Vec::new(),
        },
        FieldRule::OneOf { field, choices } => match present(field) {
            Some(value) if !as_text(value).is_some_and(|text| choices.contains(&text)) => {
                violation(field, MessageKey::InvalidChoice { choices })
            }
            _ => Vec::new(),
        },
        FieldRule::Boolean(field) => match present(field) {
            Some(value) if as_bool(value).is_none() => violation(field, MessageKey::NotABoolean),
            _ => Vec::new(),
        },
        FieldRule::AnyOf(candidates) => {
            if candidates.iter().any(|field| present(*field).is_some()) {
                Vec::new()
            } else {
                candidates
                    .iter()
                    .map(|field| RuleViolation {
                        field: *field,
                        key: MessageKey::BudgetAnchorMissing { fields: candidates },
                    })
                    .collect()
            }
        }
        FieldRule::NotAbove { field, limit } => {
            let value = present(field).and_then(as_number);
            let ceiling = present(limit).and_then(as_number);
            match (value, ceiling) {
                (Some(value), Some(ceiling)) if value > ceiling => {
                    violation(field, MessageKey::ExceedsField { limit })
                }
                _ => Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> FieldMap {
        serde_json::from_value(value).expect("field map")
    }

    #[test]
    fn presence_treats_blank_values_as_missing() {
        assert!(!is_present(None));
        assert!(!is_present(Some(&json!(null))));
        assert!(!is_present(Some(&json!("   "))));
        assert!(!is_present(Some(&json!([]))));
        assert!(is_present(Some(&json!(false))));
        assert!(is_present(Some(&json!(0))));
    }

    #[test]
    fn numbers_accept_currency_strings() {
        assert_eq!(as_number(&json!("$350,000")), Some(350_000.0));
        assert_eq!(as_number(&json!(72000)), Some(72_000.0));
        assert_eq!(as_number(&json!("lots")), None);
    }

    #[test]
    fn phone_pattern_accepts_common_formats() {
        for phone in ["512-555-0100", "(512) 555-0100", "+1 512 555 0100", "5125550100"] {
            assert!(phone_pattern().is_match(phone), "{phone} should match");
        }
        assert!(!phone_pattern().is_match("555-0100"));
    }

    #[test]
    fn zip_rule_accepts_numeric_json() {
        let data = fields(json!({ "zip": 78701 }));
        assert!(check_rule(&data, &FieldRule::Zip("zip")).is_empty());
        let data = fields(json!({ "zip": "7870" }));
        assert_eq!(check_rule(&data, &FieldRule::Zip("zip")).len(), 1);
    }

    #[test]
    fn not_above_ignores_missing_limit() {
        let data = fields(json!({ "down_payment": 50000 }));
        let rule = FieldRule::NotAbove {
            field: "down_payment",
            limit: "target_price",
        };
        assert!(check_rule(&data, &rule).is_empty());
    }
}
