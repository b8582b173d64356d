//! Lead delivery with primary/fallback failover, plus the first-party intake endpoint.

pub mod channel;
pub mod domain;
pub mod intake;
pub mod orchestrator;

pub use channel::{ChannelError, HttpLeadChannel, LeadChannel, UnconfiguredChannel};
pub use domain::{LeadId, LeadRecord, LeadSubmissionResult, SubmissionChannel, LEAD_SOURCE};
pub use intake::{
    lead_intake_router, IntakeError, LeadIntakeService, LeadRepository, RepositoryError, StoredLead,
};
pub use orchestrator::LeadSubmissionOrchestrator;
