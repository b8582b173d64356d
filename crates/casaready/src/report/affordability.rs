use serde::{Deserialize, Serialize};

use crate::wizard::domain::FieldMap;
use crate::wizard::validation::field_number;

/// Housing payment ceiling as a share of gross monthly income.
pub const FRONT_END_RATIO: f64 = 0.28;
/// Total debt ceiling as a share of gross monthly income.
pub const BACK_END_RATIO: f64 = 0.36;
/// Property tax plus homeowner's insurance, annual share of price.
pub const TAX_AND_INSURANCE_RATE: f64 = 0.02;
pub const CLOSING_COST_RATE: f64 = 0.03;
pub const TERM_YEARS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityInputs {
    pub annual_income: Option<f64>,
    pub target_price: Option<f64>,
    pub down_payment: f64,
    pub monthly_debts: f64,
    /// Annual percentage rate, e.g. `6.875`.
    pub interest_rate: f64,
}

impl AffordabilityInputs {
    /// Read the budget, savings, employment and credit slices out of a buyer profile.
    pub fn from_profile(profile: &FieldMap) -> Self {
        let credit = profile
            .get("credit_range")
            .and_then(|value| value.as_str())
            .unwrap_or("unknown");
        Self {
            annual_income: field_number(profile, "annual_income"),
            target_price: field_number(profile, "target_price"),
            down_payment: field_number(profile, "down_payment").unwrap_or(0.0),
            monthly_debts: field_number(profile, "monthly_debts").unwrap_or(0.0),
            interest_rate: rate_for_credit(credit),
        }
    }
}

/// Illustrative 30-year fixed rates by self-reported credit band.
pub fn rate_for_credit(credit_range: &str) -> f64 {
    match credit_range {
        "excellent" => 6.5,
        "good" => 6.875,
        "fair" => 7.5,
        "poor" => 8.25,
        _ => 7.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityEstimate {
    /// Highest price the income supports; `None` when no income was shared.
    pub max_price: Option<f64>,
    /// Price the plan is built around: the target price, else the income ceiling.
    pub plan_price: f64,
    pub loan_amount: f64,
    pub monthly_payment: f64,
    pub down_payment_percent: f64,
    pub closing_costs: f64,
    pub cash_to_close: f64,
    pub interest_rate: f64,
    /// Whether the target price fits under the income ceiling (`None` if unknown).
    pub within_budget: Option<bool>,
}

/// Principal and interest for a fully amortizing loan.
pub fn monthly_principal_and_interest(principal: f64, annual_rate: f64, years: u32) -> f64 {
    if principal <= 0.0 {
        return 0.0;
    }
    let periods = f64::from(years * 12);
    let rate = annual_rate / 100.0 / 12.0;
    if rate <= 0.0 {
        return principal / periods;
    }
    principal * rate / (1.0 - (1.0 + rate).powf(-periods))
}

/// Full housing payment (principal, interest, taxes and insurance) for `price`.
pub fn monthly_housing_cost(price: f64, down_payment: f64, annual_rate: f64) -> f64 {
    let loan = (price - down_payment).max(0.0);
    monthly_principal_and_interest(loan, annual_rate, TERM_YEARS)
        + price * TAX_AND_INSURANCE_RATE / 12.0
}

/// Highest price whose full housing payment stays under both debt-to-income ceilings.
pub fn max_affordable_price(
    annual_income: f64,
    monthly_debts: f64,
    down_payment: f64,
    annual_rate: f64,
) -> f64 {
    let monthly_income = annual_income / 12.0;
    let budget = (monthly_income * FRONT_END_RATIO)
        .min(monthly_income * BACK_END_RATIO - monthly_debts);
    if budget <= 0.0 {
        return 0.0;
    }

    // Payment is linear in price once the down payment is fixed:
    // payment = factor * (price - down) + price * tax_rate.
    let factor = monthly_principal_and_interest(1.0, annual_rate, TERM_YEARS);
    let tax = TAX_AND_INSURANCE_RATE / 12.0;
    let price = (budget + factor * down_payment) / (factor + tax);

    // A down payment large enough to cover the price outright leaves only taxes.
    if price < down_payment {
        (budget / tax).min(down_payment)
    } else {
        price
    }
}

pub fn estimate(inputs: &AffordabilityInputs) -> Option<AffordabilityEstimate> {
    let max_price = inputs.annual_income.map(|income| {
        round_to(
            max_affordable_price(
                income,
                inputs.monthly_debts,
                inputs.down_payment,
                inputs.interest_rate,
            ),
            1_000.0,
        )
    });

    let plan_price = inputs.target_price.or(max_price)?;
    if plan_price <= 0.0 {
        return None;
    }

    let loan_amount = (plan_price - inputs.down_payment).max(0.0);
    let closing_costs = plan_price * CLOSING_COST_RATE;

    Some(AffordabilityEstimate {
        max_price,
        plan_price,
        loan_amount,
        monthly_payment: round_to(
            monthly_housing_cost(plan_price, inputs.down_payment, inputs.interest_rate),
            1.0,
        ),
        down_payment_percent: (inputs.down_payment / plan_price * 100.0).min(100.0),
        closing_costs: round_to(closing_costs, 1.0),
        cash_to_close: round_to(inputs.down_payment + closing_costs, 1.0),
        interest_rate: inputs.interest_rate,
        within_budget: match (inputs.target_price, max_price) {
            (Some(target), Some(max)) => Some(target <= max),
            _ => None,
        },
    })
}

fn round_to(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_matches_amortization_table() {
        // $300k at 6% for 30 years is $1,798.65 per month.
        let payment = monthly_principal_and_interest(300_000.0, 6.0, 30);
        assert!((payment - 1_798.65).abs() < 0.01, "payment was {payment}");
    }

    #[test]
    fn zero_rate_divides_evenly() {
        let payment = monthly_principal_and_interest(360_000.0, 0.0, 30);
        assert!((payment - 1_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn max_price_keeps_payment_under_front_end_ratio() {
        let price = max_affordable_price(120_000.0, 0.0, 40_000.0, 6.875);
        let payment = monthly_housing_cost(price, 40_000.0, 6.875);
        assert!((payment - 120_000.0 / 12.0 * FRONT_END_RATIO).abs() < 0.5);
    }

    #[test]
    fn heavy_debts_lower_the_ceiling() {
        let light = max_affordable_price(90_000.0, 200.0, 20_000.0, 7.0);
        let heavy = max_affordable_price(90_000.0, 1_500.0, 20_000.0, 7.0);
        assert!(heavy < light);
        assert_eq!(max_affordable_price(30_000.0, 2_000.0, 0.0, 7.0), 0.0);
    }

    #[test]
    fn estimate_prefers_target_price() {
        let estimate = estimate(&AffordabilityInputs {
            annual_income: Some(130_000.0),
            target_price: Some(350_000.0),
            down_payment: 35_000.0,
            monthly_debts: 300.0,
            interest_rate: 6.875,
        })
        .expect("estimate");

        assert_eq!(estimate.plan_price, 350_000.0);
        assert_eq!(estimate.loan_amount, 315_000.0);
        assert!((estimate.down_payment_percent - 10.0).abs() < 1e-9);
        assert_eq!(estimate.closing_costs, 10_500.0);
        assert_eq!(estimate.within_budget, Some(true));
    }

    #[test]
    fn estimate_needs_income_or_price() {
        let inputs = AffordabilityInputs {
            annual_income: None,
            target_price: None,
            down_payment: 10_000.0,
            monthly_debts: 0.0,
            interest_rate: 7.0,
        };
        assert!(estimate(&inputs).is_none());
    }
}
