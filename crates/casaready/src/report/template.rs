use async_trait::async_trait;

use super::affordability::{self, AffordabilityEstimate, AffordabilityInputs};
use super::{ActionPlan, ActionStep, GeneratedReport, ReportClient, ReportError, ReportRequest};
use crate::enrichment::CensusInsights;
use crate::wizard::domain::Locale;
use crate::wizard::validation::field_bool;

/// Offline plan writer used when no remote generator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateReportGenerator;

#[async_trait]
impl ReportClient for TemplateReportGenerator {
    async fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, ReportError> {
        self.build_plan(request).map(GeneratedReport::Plan)
    }
}

fn pick(locale: Locale, en: &str, es: &str) -> String {
    match locale {
        Locale::En => en.to_string(),
        Locale::Es => es.to_string(),
    }
}

fn money(value: f64) -> String {
    let whole = value.round().max(0.0) as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${grouped}")
}

impl TemplateReportGenerator {
    pub fn build_plan(&self, request: &ReportRequest) -> Result<ActionPlan, ReportError> {
        let profile = &request.step_data;
        let locale = request.locale;
        let inputs = AffordabilityInputs::from_profile(profile);
        let estimate = affordability::estimate(&inputs).ok_or(ReportError::InsufficientData)?;

        let text = |key: &str| {
            profile
                .get(key)
                .and_then(|value| value.as_str())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };
        let city = text("city");
        let first_name = request.contact.first_name.trim();

        let headline = match (locale, city, first_name.is_empty()) {
            (Locale::En, Some(city), false) => format!("{first_name}, your path to a home in {city}"),
            (Locale::Es, Some(city), false) => {
                format!("{first_name}, tu camino hacia una casa en {city}")
            }
            (Locale::En, _, _) => "Your homebuying action plan".to_string(),
            (Locale::Es, _, _) => "Tu plan de acción para comprar casa".to_string(),
        };

        let summary = summary_text(locale, &estimate);
        let timeline = text("timeline").unwrap_or("6-12");
        let credit = text("credit_range").unwrap_or("unknown");
        let first_time = field_bool(profile, "first_time_buyer").unwrap_or(false);
        let loan_type = text("loan_type").unwrap_or("unsure");

        let steps = action_steps(
            locale,
            &estimate,
            timeline,
            credit,
            first_time,
            loan_type,
            city,
        );
        let neighborhood_note = request
            .census
            .as_ref()
            .and_then(|census| neighborhood_note(locale, census, &estimate));

        Ok(ActionPlan {
            headline,
            summary,
            affordability: Some(estimate),
            steps,
            neighborhood_note,
            locale,
        })
    }
}

fn summary_text(locale: Locale, estimate: &AffordabilityEstimate) -> String {
    let price = money(estimate.plan_price);
    let payment = money(estimate.monthly_payment);
    let down = format!("{:.1}", estimate.down_payment_percent);
    let cash = money(estimate.cash_to_close);

    let mut summary = match locale {
        Locale::En => format!(
            "A home around {price} works out to roughly {payment} per month including taxes and insurance at {:.3}% APR. Your savings cover {down}% down; plan on about {cash} cash to close.",
            estimate.interest_rate
        ),
        Locale::Es => format!(
            "Una casa de alrededor de {price} equivale a unos {payment} al mes con impuestos y seguro a una tasa de {:.3}%. Tus ahorros cubren {down}% de enganche; planea cerca de {cash} para el cierre.",
            estimate.interest_rate
        ),
    };

    match (estimate.within_budget, estimate.max_price) {
        (Some(false), Some(max)) => summary.push_str(&match locale {
            Locale::En => format!(
                " Your income currently supports up to {}, so consider a lower price or a larger down payment.",
                money(max)
            ),
            Locale::Es => format!(
                " Tu ingreso actual alcanza hasta {}, así que considera un precio menor o un enganche mayor.",
                money(max)
            ),
        }),
        (None, Some(max)) if estimate.plan_price == max => summary.push_str(&pick(
            locale,
            " This price is the ceiling your income supports today.",
            " Este precio es el máximo que tu ingreso permite hoy.",
        )),
        _ => {}
    }

    summary
}

fn timeframe(locale: Locale, timeline: &str, offset: u8) -> String {
    // Months from now, indexed by step position, for each buying window.
    let months: [u8; 3] = match timeline {
        "0-3" => [0, 1, 2],
        "3-6" => [0, 2, 4],
        "6-12" => [1, 4, 8],
        _ => [2, 6, 12],
    };
    let month = months[usize::from(offset.min(2))];
    match (locale, month) {
        (Locale::En, 0) => "This month".to_string(),
        (Locale::Es, 0) => "Este mes".to_string(),
        (Locale::En, 1) => "Within 1 month".to_string(),
        (Locale::Es, 1) => "En 1 mes".to_string(),
        (Locale::En, n) => format!("Within {n} months"),
        (Locale::Es, n) => format!("En {n} meses"),
    }
}

fn action_steps(
    locale: Locale,
    estimate: &AffordabilityEstimate,
    timeline: &str,
    credit: &str,
    first_time: bool,
    loan_type: &str,
    city: Option<&str>,
) -> Vec<ActionStep> {
    let mut steps = Vec::new();

    if matches!(credit, "fair" | "poor" | "unknown") {
        steps.push(ActionStep {
            title: pick(locale, "Strengthen your credit", "Fortalece tu crédito"),
            detail: pick(
                locale,
                "Pull your free credit reports, dispute errors, and keep card balances under 30% of their limits. Moving up one credit band can lower your rate by half a point or more.",
                "Revisa tus reportes de crédito gratuitos, disputa errores y mantén tus tarjetas por debajo del 30% de su límite. Subir un nivel de crédito puede bajar tu tasa medio punto o más.",
            ),
            timeframe: timeframe(locale, timeline, 0),
        });
    }

    if estimate.down_payment_percent < 3.5 {
        steps.push(ActionStep {
            title: pick(locale, "Build your down payment", "Junta tu enganche"),
            detail: match locale {
                Locale::En => format!(
                    "Most programs need at least 3.5% down ({}). Automate a monthly transfer into a dedicated savings account.",
                    money(estimate.plan_price * 0.035)
                ),
                Locale::Es => format!(
                    "La mayoría de los programas piden al menos 3.5% de enganche ({}). Programa una transferencia mensual a una cuenta de ahorro dedicada.",
                    money(estimate.plan_price * 0.035)
                ),
            },
            timeframe: timeframe(locale, timeline, 0),
        });
    } else if estimate.down_payment_percent < 20.0 && loan_type == "conventional" {
        steps.push(ActionStep {
            title: pick(locale, "Plan for mortgage insurance", "Considera el seguro hipotecario"),
            detail: pick(
                locale,
                "With less than 20% down, conventional loans add private mortgage insurance until you reach 20% equity. Ask lenders for PMI quotes alongside your rate.",
                "Con menos de 20% de enganche, los préstamos convencionales agregan seguro hipotecario privado hasta llegar a 20% de capital. Pide cotizaciones de PMI junto con tu tasa.",
            ),
            timeframe: timeframe(locale, timeline, 1),
        });
    }

    if first_time {
        steps.push(ActionStep {
            title: pick(
                locale,
                "Explore first-time buyer programs",
                "Explora programas para compradores primerizos",
            ),
            detail: pick(
                locale,
                "State and city housing agencies offer down payment assistance and reduced-rate loans for first-time buyers. Completing a homebuyer education course is often required.",
                "Las agencias de vivienda estatales y municipales ofrecen ayuda para el enganche y préstamos con tasa reducida para compradores primerizos. Muchas veces piden un curso de educación para compradores.",
            ),
            timeframe: timeframe(locale, timeline, 0),
        });
    }

    steps.push(ActionStep {
        title: pick(locale, "Get pre-approved", "Obtén tu preaprobación"),
        detail: match locale {
            Locale::En => format!(
                "Gather two years of W-2s or tax returns, recent pay stubs and bank statements, then compare pre-approvals from at least three lenders for a loan near {}.",
                money(estimate.loan_amount)
            ),
            Locale::Es => format!(
                "Reúne dos años de formas W-2 o declaraciones de impuestos, talones de pago recientes y estados de cuenta, y compara preaprobaciones de al menos tres prestamistas para un préstamo cercano a {}.",
                money(estimate.loan_amount)
            ),
        },
        timeframe: timeframe(locale, timeline, 1),
    });

    steps.push(ActionStep {
        title: pick(locale, "Start touring homes", "Empieza a visitar casas"),
        detail: match (locale, city) {
            (Locale::En, Some(city)) => format!(
                "Work with a local agent in {city} and focus on homes listed at or below {}.",
                money(estimate.plan_price)
            ),
            (Locale::Es, Some(city)) => format!(
                "Trabaja con un agente local en {city} y enfócate en casas con precio de {} o menos.",
                money(estimate.plan_price)
            ),
            (Locale::En, None) => format!(
                "Work with a local agent and focus on homes listed at or below {}.",
                money(estimate.plan_price)
            ),
            (Locale::Es, None) => format!(
                "Trabaja con un agente local y enfócate en casas con precio de {} o menos.",
                money(estimate.plan_price)
            ),
        },
        timeframe: timeframe(locale, timeline, 2),
    });

    steps
}

fn neighborhood_note(
    locale: Locale,
    census: &CensusInsights,
    estimate: &AffordabilityEstimate,
) -> Option<String> {
    let median = census.demographics.median_home_value?;
    let city = &census.location.city;
    let relation = if estimate.plan_price >= f64::from(median) {
        pick(locale, "at or above", "igual o mayor que")
    } else {
        pick(locale, "below", "menor que")
    };

    let mut note = match locale {
        Locale::En => format!(
            "The median home value in {city} is {}, {relation} your plan price.",
            money(f64::from(median))
        ),
        Locale::Es => format!(
            "El valor medio de una casa en {city} es {}, {relation} el precio de tu plan.",
            money(f64::from(median))
        ),
    };
    if let Some(first) = census.recommendations.first() {
        note.push(' ');
        note.push_str(first);
    }
    Some(note)
}
