use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use super::domain::LeadRecord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("rejected with status {status}")]
    Status { status: u16 },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("channel is not configured")]
    Unconfigured,
}

/// One lead delivery destination.
#[async_trait]
pub trait LeadChannel: Send + Sync + Debug {
    /// Provider name used in diagnostics, e.g. `casaready-api` or `zapier`.
    fn name(&self) -> &str;
    async fn deliver(&self, lead: &LeadRecord) -> Result<(), ChannelError>;
}

/// POSTs the lead as JSON; any non-2xx status is a failure.
#[derive(Debug, Clone)]
pub struct HttpLeadChannel {
    name: String,
    http: reqwest::Client,
    endpoint: String,
}

impl HttpLeadChannel {
    pub fn new(
        name: impl Into<String>,
        http: reqwest::Client,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl LeadChannel for HttpLeadChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, lead: &LeadRecord) -> Result<(), ChannelError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(lead)
            .send()
            .await
            .map_err(|err| ChannelError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ChannelError::Status {
                status: status.as_u16(),
            })
        }
    }
}

/// Placeholder for a destination with no URL configured; always fails.
#[derive(Debug, Clone)]
pub struct UnconfiguredChannel {
    name: String,
}

impl UnconfiguredChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl LeadChannel for UnconfiguredChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, _lead: &LeadRecord) -> Result<(), ChannelError> {
        Err(ChannelError::Unconfigured)
    }
}
