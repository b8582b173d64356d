use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::channel::{ChannelError, LeadChannel};
use super::domain::{
    failure_message, success_message, LeadRecord, LeadSubmissionResult, SubmissionChannel,
};
use crate::wizard::domain::{ContactInfo, FieldMap, Locale};

/// Delivers a lead to the primary channel and falls back to the secondary one.
///
/// Never returns an error: every outcome is reported through
/// [`LeadSubmissionResult`], and channel failures are only logged.
#[derive(Debug, Clone)]
pub struct LeadSubmissionOrchestrator {
    primary: Arc<dyn LeadChannel>,
    fallback: Arc<dyn LeadChannel>,
    timeout: Duration,
}

impl LeadSubmissionOrchestrator {
    pub fn new(
        primary: Arc<dyn LeadChannel>,
        fallback: Arc<dyn LeadChannel>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            timeout,
        }
    }

    pub async fn submit_lead(
        &self,
        step_data: &FieldMap,
        contact: &ContactInfo,
        locale: Locale,
    ) -> LeadSubmissionResult {
        let lead = LeadRecord::from_wizard(step_data, contact, locale, Utc::now());
        self.submit(&lead).await
    }

    pub async fn submit(&self, lead: &LeadRecord) -> LeadSubmissionResult {
        let primary_err = match self.attempt(self.primary.as_ref(), lead).await {
            Ok(()) => {
                info!(channel = self.primary.name(), "lead delivered");
                return delivered(SubmissionChannel::Primary, lead.locale);
            }
            Err(err) => {
                warn!(channel = self.primary.name(), error = %err, "primary lead channel failed");
                err
            }
        };

        match self.attempt(self.fallback.as_ref(), lead).await {
            Ok(()) => {
                info!(channel = self.fallback.name(), "lead delivered through fallback");
                delivered(SubmissionChannel::Fallback, lead.locale)
            }
            Err(fallback_err) => {
                warn!(
                    channel = self.fallback.name(),
                    error = %fallback_err,
                    "fallback lead channel failed"
                );
                LeadSubmissionResult {
                    success: false,
                    channel: SubmissionChannel::None,
                    message: failure_message(lead.locale),
                    error: Some(format!(
                        "primary channel '{}' failed: {primary_err}; fallback channel '{}' failed: {fallback_err}",
                        self.primary.name(),
                        self.fallback.name(),
                    )),
                }
            }
        }
    }

    async fn attempt(
        &self,
        channel: &dyn LeadChannel,
        lead: &LeadRecord,
    ) -> Result<(), ChannelError> {
        match tokio::time::timeout(self.timeout, channel.deliver(lead)).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout(self.timeout)),
        }
    }
}

fn delivered(channel: SubmissionChannel, locale: Locale) -> LeadSubmissionResult {
    LeadSubmissionResult {
        success: true,
        channel,
        message: success_message(locale),
        error: None,
    }
}
