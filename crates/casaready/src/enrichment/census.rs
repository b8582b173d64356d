use async_trait::async_trait;
use serde_json::json;

use super::{
    CensusInsights, EnrichmentClient, EnrichmentError, EnrichmentResponse, LocationQuery,
};
use crate::wizard::domain::Locale;

/// Client for a census proxy endpoint answering `{success, data}` envelopes.
#[derive(Debug, Clone)]
pub struct HttpCensusClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpCensusClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl EnrichmentClient for HttpCensusClient {
    async fn fetch(
        &self,
        query: &LocationQuery,
        locale: Locale,
    ) -> Result<CensusInsights, EnrichmentError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({
                "city": query.city,
                "state": query.state,
                "locale": locale.code(),
            }))
            .send()
            .await
            .map_err(|err| EnrichmentError::Transport(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EnrichmentError::NotFound(query.city.clone()));
        }
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let envelope: EnrichmentResponse = response
            .json()
            .await
            .map_err(|err| EnrichmentError::Transport(err.to_string()))?;

        match envelope {
            EnrichmentResponse {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            _ => Err(EnrichmentError::NotFound(query.city.clone())),
        }
    }
}
