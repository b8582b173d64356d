//! Affordability and action-plan reports.
//!
//! A [`ReportClient`] turns the buyer profile into either a structured [`ActionPlan`] or
//! a markdown narrative. [`ReportService::stream`] exposes the chunked variant used for
//! live display, and [`ReportAccumulator`] folds those chunks back together.

pub mod affordability;
mod http;
mod template;

pub use http::HttpReportClient;
pub use template::TemplateReportGenerator;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::enrichment::CensusInsights;
use crate::wizard::domain::{ContactInfo, FieldMap, Locale};
use affordability::AffordabilityEstimate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub step_data: FieldMap,
    pub contact: ContactInfo,
    pub locale: Locale,
    #[serde(default)]
    pub census: Option<CensusInsights>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub title: String,
    pub detail: String,
    pub timeframe: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub headline: String,
    pub summary: String,
    #[serde(default)]
    pub affordability: Option<AffordabilityEstimate>,
    pub steps: Vec<ActionStep>,
    #[serde(default)]
    pub neighborhood_note: Option<String>,
    pub locale: Locale,
}

impl ActionPlan {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n{}\n", self.headline, self.summary);
        if let Some(note) = &self.neighborhood_note {
            out.push_str(&format!("\n> {note}\n"));
        }
        for (index, step) in self.steps.iter().enumerate() {
            out.push_str(&format!(
                "\n## {}. {}\n_{}_\n\n{}\n",
                index + 1,
                step.title,
                step.timeframe,
                step.detail
            ));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum GeneratedReport {
    Plan(ActionPlan),
    Narrative(String),
}

impl GeneratedReport {
    pub fn markdown(&self) -> String {
        match self {
            GeneratedReport::Plan(plan) => plan.to_markdown(),
            GeneratedReport::Narrative(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReportError {
    #[error("not enough budget information to build a plan")]
    InsufficientData,
    #[error("report provider request failed: {0}")]
    Transport(String),
    #[error("report provider returned status {0}")]
    Status(u16),
    #[error("report provider response could not be decoded: {0}")]
    Decode(String),
    #[error("report generation timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ReportClient: Send + Sync {
    async fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, ReportError>;
}

/// Bounds report generation with a timeout.
#[derive(Clone)]
pub struct ReportService {
    client: Arc<dyn ReportClient>,
    timeout: Duration,
}

impl ReportService {
    pub fn new(client: Arc<dyn ReportClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, ReportError> {
        match tokio::time::timeout(self.timeout, self.client.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::Timeout(self.timeout)),
        }
    }

    /// Chunked variant: markdown line by line, then the structured summary.
    pub fn stream(
        &self,
        request: ReportRequest,
    ) -> BoxStream<'static, Result<ReportEvent, ReportError>> {
        let service = self.clone();
        stream::once(async move { service.generate(&request).await })
            .flat_map(|result| stream::iter(report_events(result)))
            .boxed()
    }
}

/// Incremental output of a streamed report.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Chunk(String),
    Completed(GeneratedReport),
}

fn report_events(
    result: Result<GeneratedReport, ReportError>,
) -> Vec<Result<ReportEvent, ReportError>> {
    match result {
        Ok(report) => {
            let markdown = report.markdown();
            let mut events: Vec<_> = markdown
                .split_inclusive('\n')
                .map(|line| Ok(ReportEvent::Chunk(line.to_string())))
                .collect();
            events.push(Ok(ReportEvent::Completed(report)));
            events
        }
        Err(err) => vec![Err(err)],
    }
}

/// Collects streamed fragments for live display.
#[derive(Debug, Default, Clone)]
pub struct ReportAccumulator {
    text: String,
    summary: Option<GeneratedReport>,
}

impl ReportAccumulator {
    /// Apply one event; returns `true` once the summary arrived.
    pub fn apply(&mut self, event: ReportEvent) -> bool {
        match event {
            ReportEvent::Chunk(fragment) => self.text.push_str(&fragment),
            ReportEvent::Completed(report) => self.summary = Some(report),
        }
        self.is_complete()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn summary(&self) -> Option<&GeneratedReport> {
        self.summary.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.summary.is_some()
    }
}
