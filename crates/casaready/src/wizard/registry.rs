use super::domain::{Locale, StepId};

/// Bilingual display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalizedText {
    pub en: &'static str,
    pub es: &'static str,
}

impl LocalizedText {
    pub const fn get(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.en,
            Locale::Es => self.es,
        }
    }
}

/// Declarative format or cross-field rule checked after required presence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule {
    Email(&'static str),
    Phone(&'static str),
    Zip(&'static str),
    StateCode(&'static str),
    Range {
        field: &'static str,
        min: f64,
        max: f64,
    },
    OneOf {
        field: &'static str,
        choices: &'static [&'static str],
    },
    Boolean(&'static str),
    /// At least one of the fields must be present.
    AnyOf(&'static [&'static str]),
    /// `field` may not exceed `limit` when both are numeric.
    NotAbove {
        field: &'static str,
        limit: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub id: StepId,
    /// Name of the data slice this step owns.
    pub slice: &'static str,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub required_fields: &'static [&'static str],
    pub rules: &'static [FieldRule],
}

pub const TIMELINE_CHOICES: &[&str] = &["0-3", "3-6", "6-12", "12+"];
pub const CREDIT_CHOICES: &[&str] = &["excellent", "good", "fair", "poor", "unknown"];
pub const EMPLOYMENT_CHOICES: &[&str] = &[
    "full_time",
    "part_time",
    "self_employed",
    "retired",
    "other",
];
pub const PROPERTY_CHOICES: &[&str] = &["single_family", "townhome", "condo", "multi_family"];
pub const LOAN_CHOICES: &[&str] = &["conventional", "fha", "va", "usda", "unsure"];

/// Static, ordered list of wizard steps.
#[derive(Debug)]
pub struct StepRegistry {
    steps: Vec<StepDescriptor>,
}

impl StepRegistry {
    pub fn standard() -> Self {
        Self {
            steps: standard_steps(),
        }
    }

    pub fn len(&self) -> u8 {
        self.steps.len() as u8
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, id: StepId) -> Option<&StepDescriptor> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    /// The contact step that triggers report generation and lead submission.
    pub fn terminal(&self) -> StepId {
        StepId(self.len())
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_steps() -> Vec<StepDescriptor> {
    vec![
        StepDescriptor {
            id: StepId(1),
            slice: "location",
            title: LocalizedText {
                en: "Where do you want to buy?",
                es: "¿Dónde quieres comprar?",
            },
            description: LocalizedText {
                en: "Tell us the city and ZIP code you are focused on.",
                es: "Cuéntanos la ciudad y el código postal que te interesan.",
            },
            required_fields: &["city", "zip"],
            rules: &[FieldRule::Zip("zip"), FieldRule::StateCode("state")],
        },
        StepDescriptor {
            id: StepId(2),
            slice: "timeline",
            title: LocalizedText {
                en: "When do you plan to buy?",
                es: "¿Cuándo planeas comprar?",
            },
            description: LocalizedText {
                en: "Pick the window that best matches your plans.",
                es: "Elige el plazo que mejor se ajuste a tus planes.",
            },
            required_fields: &["timeline"],
            rules: &[FieldRule::OneOf {
                field: "timeline",
                choices: TIMELINE_CHOICES,
            }],
        },
        StepDescriptor {
            id: StepId(3),
            slice: "budget",
            title: LocalizedText {
                en: "What is your budget?",
                es: "¿Cuál es tu presupuesto?",
            },
            description: LocalizedText {
                en: "Share your household income, a target price, or both.",
                es: "Comparte tu ingreso familiar, un precio objetivo o ambos.",
            },
            required_fields: &[],
            rules: &[
                FieldRule::AnyOf(&["annual_income", "target_price"]),
                FieldRule::Range {
                    field: "annual_income",
                    min: 10_000.0,
                    max: 10_000_000.0,
                },
                FieldRule::Range {
                    field: "target_price",
                    min: 50_000.0,
                    max: 20_000_000.0,
                },
            ],
        },
        StepDescriptor {
            id: StepId(4),
            slice: "savings",
            title: LocalizedText {
                en: "How much have you saved?",
                es: "¿Cuánto has ahorrado?",
            },
            description: LocalizedText {
                en: "Your down payment and monthly savings shape the plan.",
                es: "Tu enganche y ahorro mensual definen el plan.",
            },
            required_fields: &["down_payment"],
            rules: &[
                FieldRule::Range {
                    field: "down_payment",
                    min: 0.0,
                    max: 20_000_000.0,
                },
                FieldRule::Range {
                    field: "monthly_savings",
                    min: 0.0,
                    max: 1_000_000.0,
                },
                FieldRule::NotAbove {
                    field: "down_payment",
                    limit: "target_price",
                },
            ],
        },
        StepDescriptor {
            id: StepId(5),
            slice: "credit",
            title: LocalizedText {
                en: "How is your credit?",
                es: "¿Cómo está tu crédito?",
            },
            description: LocalizedText {
                en: "An estimate is fine; we never run a credit check.",
                es: "Un estimado es suficiente; nunca revisamos tu historial.",
            },
            required_fields: &["credit_range"],
            rules: &[FieldRule::OneOf {
                field: "credit_range",
                choices: CREDIT_CHOICES,
            }],
        },
        StepDescriptor {
            id: StepId(6),
            slice: "employment",
            title: LocalizedText {
                en: "Tell us about your work",
                es: "Cuéntanos sobre tu trabajo",
            },
            description: LocalizedText {
                en: "Employment and monthly debts affect what lenders approve.",
                es: "El empleo y las deudas mensuales influyen en la aprobación.",
            },
            required_fields: &["employment_status"],
            rules: &[
                FieldRule::OneOf {
                    field: "employment_status",
                    choices: EMPLOYMENT_CHOICES,
                },
                FieldRule::Range {
                    field: "monthly_debts",
                    min: 0.0,
                    max: 1_000_000.0,
                },
            ],
        },
        StepDescriptor {
            id: StepId(7),
            slice: "preferences",
            title: LocalizedText {
                en: "What kind of home?",
                es: "¿Qué tipo de casa?",
            },
            description: LocalizedText {
                en: "Property type and size help narrow the search.",
                es: "El tipo de propiedad y tamaño ayudan a enfocar la búsqueda.",
            },
            required_fields: &["property_type"],
            rules: &[
                FieldRule::OneOf {
                    field: "property_type",
                    choices: PROPERTY_CHOICES,
                },
                FieldRule::Range {
                    field: "bedrooms",
                    min: 0.0,
                    max: 10.0,
                },
            ],
        },
        StepDescriptor {
            id: StepId(8),
            slice: "financing",
            title: LocalizedText {
                en: "How will you finance?",
                es: "¿Cómo vas a financiar?",
            },
            description: LocalizedText {
                en: "Loan programs differ in down payment and credit needs.",
                es: "Los programas de préstamo varían en enganche y crédito.",
            },
            required_fields: &["loan_type", "first_time_buyer"],
            rules: &[
                FieldRule::OneOf {
                    field: "loan_type",
                    choices: LOAN_CHOICES,
                },
                FieldRule::Boolean("first_time_buyer"),
            ],
        },
        StepDescriptor {
            id: StepId(9),
            slice: "priorities",
            title: LocalizedText {
                en: "What matters most?",
                es: "¿Qué es lo más importante?",
            },
            description: LocalizedText {
                en: "Pick the priorities your plan should focus on.",
                es: "Elige las prioridades en las que debe enfocarse tu plan.",
            },
            required_fields: &["priorities"],
            rules: &[],
        },
        StepDescriptor {
            id: StepId(10),
            slice: "contact",
            title: LocalizedText {
                en: "Where should we send your plan?",
                es: "¿A dónde enviamos tu plan?",
            },
            description: LocalizedText {
                en: "An advisor will follow up with your personalized plan.",
                es: "Un asesor te contactará con tu plan personalizado.",
            },
            required_fields: &["first_name", "last_name", "email", "phone"],
            rules: &[FieldRule::Email("email"), FieldRule::Phone("phone")],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_is_ordered_and_contiguous() {
        let registry = StepRegistry::standard();
        assert_eq!(registry.len(), 10);
        for (index, step) in registry.steps().iter().enumerate() {
            assert_eq!(step.id, StepId(index as u8 + 1));
        }
        assert_eq!(registry.terminal(), StepId(10));
        assert_eq!(
            registry.get(StepId(10)).map(|step| step.slice),
            Some("contact")
        );
    }

    #[test]
    fn titles_are_localized() {
        let registry = StepRegistry::standard();
        let first = registry.get(StepId(1)).expect("location step");
        assert_ne!(first.title.get(Locale::En), first.title.get(Locale::Es));
    }
}
