use async_trait::async_trait;

use super::{
    recommendations_for, CensusInsights, CensusLocation, Demographics, EnrichmentClient,
    EnrichmentError, LocationQuery,
};
use crate::wizard::domain::Locale;

struct MetroFixture {
    city: &'static str,
    state: &'static str,
    county: &'static str,
    population: u64,
    median_household_income: u32,
    median_home_value: u32,
    homeownership_rate: f32,
}

// ACS 5-year style estimates for the metros the service launched in.
const METROS: &[MetroFixture] = &[
    MetroFixture {
        city: "Austin",
        state: "TX",
        county: "Travis County",
        population: 961_855,
        median_household_income: 86_530,
        median_home_value: 541_400,
        homeownership_rate: 0.45,
    },
    MetroFixture {
        city: "Houston",
        state: "TX",
        county: "Harris County",
        population: 2_302_878,
        median_household_income: 60_426,
        median_home_value: 247_400,
        homeownership_rate: 0.42,
    },
    MetroFixture {
        city: "Dallas",
        state: "TX",
        county: "Dallas County",
        population: 1_299_544,
        median_household_income: 63_985,
        median_home_value: 309_200,
        homeownership_rate: 0.41,
    },
    MetroFixture {
        city: "San Antonio",
        state: "TX",
        county: "Bexar County",
        population: 1_434_625,
        median_household_income: 59_593,
        median_home_value: 224_000,
        homeownership_rate: 0.53,
    },
    MetroFixture {
        city: "El Paso",
        state: "TX",
        county: "El Paso County",
        population: 678_415,
        median_household_income: 55_710,
        median_home_value: 166_200,
        homeownership_rate: 0.60,
    },
];

/// Offline census provider backed by a static metro table.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureCensusProvider;

#[async_trait]
impl EnrichmentClient for FixtureCensusProvider {
    async fn fetch(
        &self,
        query: &LocationQuery,
        locale: Locale,
    ) -> Result<CensusInsights, EnrichmentError> {
        let metro = METROS
            .iter()
            .find(|metro| {
                metro.city.eq_ignore_ascii_case(query.city.trim())
                    && query
                        .state
                        .as_deref()
                        .map_or(true, |state| metro.state.eq_ignore_ascii_case(state))
            })
            .ok_or_else(|| EnrichmentError::NotFound(query.city.clone()))?;

        let demographics = Demographics {
            population: Some(metro.population),
            median_household_income: Some(metro.median_household_income),
            median_home_value: Some(metro.median_home_value),
            homeownership_rate: Some(metro.homeownership_rate),
        };
        let recommendations = recommendations_for(&demographics, locale);

        Ok(CensusInsights {
            location: CensusLocation {
                city: metro.city.to_string(),
                state: Some(metro.state.to_string()),
                county: Some(metro.county.to_string()),
            },
            demographics,
            recommendations,
        })
    }
}
