//! Optional demographic context for the buyer's target location.
//!
//! Lookups never fail outward: [`EnrichmentService::lookup`] folds transport errors and
//! timeouts into an unsuccessful [`EnrichmentResponse`] so the wizard keeps moving.

mod census;
mod fixtures;

pub use census::HttpCensusClient;
pub use fixtures::FixtureCensusProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::wizard::domain::Locale;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationQuery {
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusLocation {
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(default)]
    pub population: Option<u64>,
    #[serde(default)]
    pub median_household_income: Option<u32>,
    #[serde(default)]
    pub median_home_value: Option<u32>,
    #[serde(default)]
    pub homeownership_rate: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusInsights {
    pub location: CensusLocation,
    pub demographics: Demographics,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl CensusInsights {
    pub fn empty_for(city: &str, state: Option<&str>) -> Self {
        Self {
            location: CensusLocation {
                city: city.to_string(),
                state: state.map(str::to_string),
                county: None,
            },
            demographics: Demographics::default(),
            recommendations: Vec::new(),
        }
    }
}

/// Envelope handed back to the wizard; `success == false` means "no enrichment".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CensusInsights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnrichmentResponse {
    pub fn found(data: CensusInsights) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("no census data for {0}")]
    NotFound(String),
    #[error("census provider request failed: {0}")]
    Transport(String),
    #[error("census provider returned status {0}")]
    Status(u16),
    #[error("census lookup timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait EnrichmentClient: Send + Sync {
    async fn fetch(
        &self,
        query: &LocationQuery,
        locale: Locale,
    ) -> Result<CensusInsights, EnrichmentError>;
}

/// Applies the timeout and degrades every failure to an unsuccessful response.
#[derive(Clone)]
pub struct EnrichmentService {
    client: Arc<dyn EnrichmentClient>,
    timeout: Duration,
}

impl EnrichmentService {
    pub fn new(client: Arc<dyn EnrichmentClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn lookup(
        &self,
        city: &str,
        state: Option<&str>,
        locale: Locale,
    ) -> EnrichmentResponse {
        let city = city.trim();
        if city.is_empty() {
            return EnrichmentResponse::unavailable("city is required for enrichment");
        }

        let query = LocationQuery {
            city: city.to_string(),
            state: state
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_ascii_uppercase),
        };

        let fetch = self.client.fetch(&query, locale);
        let outcome = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(EnrichmentError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(data) => EnrichmentResponse::found(data),
            Err(EnrichmentError::NotFound(location)) => {
                debug!(%location, "no census enrichment available");
                EnrichmentResponse::unavailable(format!("no census data for {location}"))
            }
            Err(err) => {
                warn!(city = %query.city, error = %err, "census enrichment failed");
                EnrichmentResponse::unavailable(err.to_string())
            }
        }
    }
}

/// Plain-language guidance comparing local prices with local incomes.
pub fn recommendations_for(demographics: &Demographics, locale: Locale) -> Vec<String> {
    let mut notes = Vec::new();

    if let (Some(home), Some(income)) = (
        demographics.median_home_value,
        demographics.median_household_income,
    ) {
        let ratio = f64::from(home) / f64::from(income.max(1));
        let note = match (locale, ratio > 5.0) {
            (Locale::En, true) => format!(
                "Homes here cost about {ratio:.1}x the median income; consider nearby suburbs or down payment assistance."
            ),
            (Locale::Es, true) => format!(
                "Las casas aquí cuestan cerca de {ratio:.1} veces el ingreso medio; considera suburbios cercanos o programas de ayuda para el enganche."
            ),
            (Locale::En, false) => format!(
                "Homes here cost about {ratio:.1}x the median income, which is within reach for many buyers."
            ),
            (Locale::Es, false) => format!(
                "Las casas aquí cuestan cerca de {ratio:.1} veces el ingreso medio, algo alcanzable para muchos compradores."
            ),
        };
        notes.push(note);
    }

    if let Some(rate) = demographics.homeownership_rate {
        let note = match locale {
            Locale::En => format!("About {:.0}% of households here own their home.", rate * 100.0),
            Locale::Es => format!(
                "Alrededor del {:.0}% de los hogares aquí son propietarios.",
                rate * 100.0
            ),
        };
        notes.push(note);
    }

    notes
}
