use crate::wizard::domain::Locale;

/// Message identifiers produced by the rule checks; text comes from a resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKey {
    Required,
    InvalidEmail,
    InvalidPhone,
    InvalidZip,
    InvalidState,
    NotANumber,
    OutOfRange { min: f64, max: f64 },
    InvalidChoice { choices: &'static [&'static str] },
    NotABoolean,
    BudgetAnchorMissing { fields: &'static [&'static str] },
    ExceedsField { limit: &'static str },
    UnknownStep,
}

/// Resolves a message key into display text. Implemented by the host's i18n table.
pub trait MessageResolver: Send + Sync {
    fn resolve(&self, key: &MessageKey, field: &str, locale: Locale) -> String;
}

/// Built-in English/Spanish catalog.
#[derive(Debug, Default, Clone, Copy)]
pub struct BilingualCatalog;

impl MessageResolver for BilingualCatalog {
    fn resolve(&self, key: &MessageKey, field: &str, locale: Locale) -> String {
        let label = field_label(field, locale);
        match (locale, key) {
            (Locale::En, MessageKey::Required) => format!("{label} is required"),
            (Locale::Es, MessageKey::Required) => format!("{label} es obligatorio"),
            (Locale::En, MessageKey::InvalidEmail) => "Enter a valid email address".to_string(),
            (Locale::Es, MessageKey::InvalidEmail) => {
                "Ingresa un correo electrónico válido".to_string()
            }
            (Locale::En, MessageKey::InvalidPhone) => {
                "Enter a valid 10-digit phone number".to_string()
            }
            (Locale::Es, MessageKey::InvalidPhone) => {
                "Ingresa un número de teléfono válido de 10 dígitos".to_string()
            }
            (Locale::En, MessageKey::InvalidZip) => "Enter a 5-digit ZIP code".to_string(),
            (Locale::Es, MessageKey::InvalidZip) => {
                "Ingresa un código postal de 5 dígitos".to_string()
            }
            (Locale::En, MessageKey::InvalidState) => {
                "Use the two-letter state abbreviation".to_string()
            }
            (Locale::Es, MessageKey::InvalidState) => {
                "Usa la abreviatura de dos letras del estado".to_string()
            }
            (Locale::En, MessageKey::NotANumber) => format!("{label} must be a number"),
            (Locale::Es, MessageKey::NotANumber) => format!("{label} debe ser un número"),
            (Locale::En, MessageKey::OutOfRange { min, max }) => {
                format!("{label} must be between {} and {}", whole(*min), whole(*max))
            }
            (Locale::Es, MessageKey::OutOfRange { min, max }) => {
                format!("{label} debe estar entre {} y {}", whole(*min), whole(*max))
            }
            (Locale::En, MessageKey::InvalidChoice { choices }) => {
                format!("Choose one of: {}", choices.join(", "))
            }
            (Locale::Es, MessageKey::InvalidChoice { choices }) => {
                format!("Elige una opción: {}", choices.join(", "))
            }
            (Locale::En, MessageKey::NotABoolean) => "Answer yes or no".to_string(),
            (Locale::Es, MessageKey::NotABoolean) => "Responde sí o no".to_string(),
            (_, MessageKey::BudgetAnchorMissing { fields }) => {
                let labels: Vec<&str> = fields
                    .iter()
                    .map(|field| field_label(field, locale))
                    .collect();
                match locale {
                    Locale::En => format!("Provide at least one of: {}", labels.join(", ")),
                    Locale::Es => format!("Indica al menos uno: {}", labels.join(", ")),
                }
            }
            (Locale::En, MessageKey::ExceedsField { limit }) => {
                format!("{label} cannot exceed {}", field_label(limit, locale))
            }
            (Locale::Es, MessageKey::ExceedsField { limit }) => {
                format!("{label} no puede superar {}", field_label(limit, locale))
            }
            (Locale::En, MessageKey::UnknownStep) => "Unknown wizard step".to_string(),
            (Locale::Es, MessageKey::UnknownStep) => "Paso del asistente desconocido".to_string(),
        }
    }
}

fn whole(value: f64) -> String {
    format!("{}", value.round() as i64)
}

fn field_label(field: &str, locale: Locale) -> &str {
    let labels: (&str, &str) = match field {
        "city" => ("City", "La ciudad"),
        "zip" => ("ZIP code", "El código postal"),
        "state" => ("State", "El estado"),
        "timeline" => ("Timeline", "El plazo"),
        "annual_income" => ("Annual income", "El ingreso anual"),
        "target_price" => ("Target price", "El precio objetivo"),
        "down_payment" => ("Down payment", "El enganche"),
        "monthly_savings" => ("Monthly savings", "El ahorro mensual"),
        "credit_range" => ("Credit range", "El rango de crédito"),
        "employment_status" => ("Employment status", "La situación laboral"),
        "monthly_debts" => ("Monthly debts", "Las deudas mensuales"),
        "property_type" => ("Property type", "El tipo de propiedad"),
        "bedrooms" => ("Bedrooms", "Las recámaras"),
        "loan_type" => ("Loan type", "El tipo de préstamo"),
        "first_time_buyer" => ("First-time buyer", "Comprador por primera vez"),
        "priorities" => ("Priorities", "Las prioridades"),
        "first_name" => ("First name", "El nombre"),
        "last_name" => ("Last name", "El apellido"),
        "email" => ("Email", "El correo electrónico"),
        "phone" => ("Phone", "El teléfono"),
        _ => return field,
    };
    match locale {
        Locale::En => labels.0,
        Locale::Es => labels.1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_messages_use_field_labels() {
        let catalog = BilingualCatalog;
        assert_eq!(
            catalog.resolve(&MessageKey::Required, "email", Locale::En),
            "Email is required"
        );
        assert_eq!(
            catalog.resolve(&MessageKey::Required, "email", Locale::Es),
            "El correo electrónico es obligatorio"
        );
        assert_eq!(
            catalog.resolve(&MessageKey::Required, "custom_field", Locale::En),
            "custom_field is required"
        );
    }
}
