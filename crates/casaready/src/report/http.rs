use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ActionPlan, GeneratedReport, ReportClient, ReportError, ReportRequest};

/// Remote generators answer with either a structured plan or a markdown narrative.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteReport {
    Plan { plan: ActionPlan },
    Narrative { markdown: String },
}

#[derive(Debug, Clone)]
pub struct HttpReportClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpReportClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ReportClient for HttpReportClient {
    async fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, ReportError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({
                "stepData": request.step_data,
                "contactInfo": request.contact,
                "locale": request.locale.code(),
                "censusData": request.census,
            }))
            .send()
            .await
            .map_err(|err| ReportError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|err| ReportError::Transport(err.to_string()))?;

        match serde_json::from_str::<RemoteReport>(&body) {
            Ok(RemoteReport::Plan { plan }) => Ok(GeneratedReport::Plan(plan)),
            Ok(RemoteReport::Narrative { markdown }) if !markdown.trim().is_empty() => {
                Ok(GeneratedReport::Narrative(markdown))
            }
            Ok(RemoteReport::Narrative { .. }) => {
                Err(ReportError::Decode("empty narrative".to_string()))
            }
            Err(err) => Err(ReportError::Decode(err.to_string())),
        }
    }
}
