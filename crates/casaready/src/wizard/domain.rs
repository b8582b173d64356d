use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enrichment::CensusInsights;

/// Key/value record collected by a single step.
pub type FieldMap = BTreeMap<String, Value>;

/// 1-based position of a step in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u8);

impl StepId {
    pub const FIRST: StepId = StepId(1);

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session language, seeded once by the host environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    pub const fn code(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.split(['-', '_']).next() {
            Some("en") => Some(Locale::En),
            Some("es") => Some(Locale::Es),
            _ => None,
        }
    }

    /// Read the `locale` (or `NEXT_LOCALE`) entry out of a raw `Cookie` header.
    pub fn from_cookie_header(header: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| matches!(name.trim(), "locale" | "NEXT_LOCALE"))
            .and_then(|(_, value)| Locale::parse(value))
    }
}

/// Contact details captured on the terminal step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl ContactInfo {
    /// Shallow merge: only fields present in `update` are replaced.
    pub fn merge(&mut self, update: ContactUpdate) {
        let ContactUpdate {
            first_name,
            last_name,
            email,
            phone,
        } = update;
        if let Some(value) = first_name {
            self.first_name = value;
        }
        if let Some(value) = last_name {
            self.last_name = value;
        }
        if let Some(value) = email {
            self.email = value;
        }
        if let Some(value) = phone {
            self.phone = value;
        }
    }

    /// Field view used when validating the contact step.
    pub fn as_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("first_name".to_string(), Value::from(self.first_name.as_str()));
        fields.insert("last_name".to_string(), Value::from(self.last_name.as_str()));
        fields.insert("email".to_string(), Value::from(self.email.as_str()));
        fields.insert("phone".to_string(), Value::from(self.phone.as_str()));
        fields
    }
}

/// Partial contact record; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ContactUpdate {
    /// Pull contact keys out of a generic field map (terminal step payloads).
    pub fn from_fields(fields: &FieldMap) -> Self {
        let text = |key: &str| {
            fields.get(key).map(|value| match value {
                Value::String(raw) => raw.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
        };
        Self {
            first_name: text("first_name"),
            last_name: text("last_name"),
            email: text("email"),
            phone: text("phone"),
        }
    }
}

/// Aggregate root for a single buyer's pass through the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSession {
    pub current_step: StepId,
    pub total_steps: u8,
    pub completed_steps: BTreeSet<StepId>,
    pub step_data: BTreeMap<StepId, FieldMap>,
    pub contact_info: ContactInfo,
    pub census_data: Option<CensusInsights>,
    pub locale: Locale,
    pub is_transitioning: bool,
}

impl WizardSession {
    pub fn new(total_steps: u8, locale: Locale) -> Self {
        Self {
            current_step: StepId::FIRST,
            total_steps: total_steps.max(1),
            completed_steps: BTreeSet::new(),
            step_data: BTreeMap::new(),
            contact_info: ContactInfo::default(),
            census_data: None,
            locale,
            is_transitioning: false,
        }
    }

    /// Union of every step slice; later steps win on key collisions.
    pub fn buyer_profile(&self) -> FieldMap {
        self.step_data
            .values()
            .flat_map(|slice| slice.iter())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_reads_cookie_header() {
        assert_eq!(
            Locale::from_cookie_header("theme=dark; locale=es-MX"),
            Some(Locale::Es)
        );
        assert_eq!(
            Locale::from_cookie_header("NEXT_LOCALE=en; theme=light"),
            Some(Locale::En)
        );
        assert_eq!(Locale::from_cookie_header("theme=dark"), None);
        assert_eq!(Locale::from_cookie_header("locale=fr"), None);
    }

    #[test]
    fn contact_merge_keeps_unset_fields() {
        let mut contact = ContactInfo {
            first_name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            ..ContactInfo::default()
        };
        contact.merge(ContactUpdate {
            phone: Some("512-555-0100".to_string()),
            ..ContactUpdate::default()
        });

        assert_eq!(contact.first_name, "Ana");
        assert_eq!(contact.email, "ana@example.com");
        assert_eq!(contact.phone, "512-555-0100");
    }
}
