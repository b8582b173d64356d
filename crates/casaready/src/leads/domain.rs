use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wizard::domain::{ContactInfo, FieldMap, Locale};

pub const LEAD_SOURCE: &str = "casaready-wizard";

/// Identifier assigned by the primary intake endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// JSON lead record accepted by both delivery channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub locale: Locale,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    /// Merged wizard answers.
    #[serde(default)]
    pub profile: FieldMap,
    pub source: String,
    pub submitted_at: DateTime<Utc>,
}

impl LeadRecord {
    pub fn from_wizard(
        step_data: &FieldMap,
        contact: &ContactInfo,
        locale: Locale,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        let text = |key: &str| {
            step_data.get(key).and_then(|value| match value {
                serde_json::Value::String(raw) if !raw.trim().is_empty() => {
                    Some(raw.trim().to_string())
                }
                serde_json::Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
        };

        Self {
            first_name: contact.first_name.trim().to_string(),
            last_name: contact.last_name.trim().to_string(),
            email: contact.email.trim().to_string(),
            phone: contact.phone.trim().to_string(),
            locale,
            city: text("city"),
            zip: text("zip"),
            timeline: text("timeline"),
            profile: step_data.clone(),
            source: LEAD_SOURCE.to_string(),
            submitted_at,
        }
    }

    pub fn contact(&self) -> ContactInfo {
        ContactInfo {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Which destination accepted the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionChannel {
    Primary,
    Fallback,
    None,
}

impl SubmissionChannel {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionChannel::Primary => "primary",
            SubmissionChannel::Fallback => "fallback",
            SubmissionChannel::None => "none",
        }
    }
}

/// Outcome of one terminal submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSubmissionResult {
    pub success: bool,
    pub channel: SubmissionChannel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub(crate) fn success_message(locale: Locale) -> String {
    match locale {
        Locale::En => "Thanks! An advisor will reach out within one business day.".to_string(),
        Locale::Es => "¡Gracias! Un asesor te contactará en un día hábil.".to_string(),
    }
}

pub(crate) fn failure_message(locale: Locale) -> String {
    match locale {
        Locale::En => {
            "We could not send your information. Please try again or contact support.".to_string()
        }
        Locale::Es => {
            "No pudimos enviar tu información. Inténtalo de nuevo o comunícate con soporte."
                .to_string()
        }
    }
}
