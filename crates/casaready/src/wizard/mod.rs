//! Homebuyer wizard: step registry, validation, session store, persistence and the
//! controller that drives a session from the first step to lead submission.

pub mod controller;
pub mod domain;
pub mod persistence;
pub mod registry;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use controller::{
    EnrichmentTicket, StepOutcome, SubmissionDispatcher, SubmissionOutcome, SubmissionStatus,
    SubmissionTicket, WizardController, WizardError, WizardPhase,
};
pub use domain::{ContactInfo, ContactUpdate, FieldMap, Locale, StepId, WizardSession};
pub use persistence::{
    DisabledStorage, FileStorage, MemoryStorage, PersistenceAdapter, ResumeSummary,
    SnapshotStorage, StorageError, WizardSnapshot,
};
pub use registry::{StepDescriptor, StepRegistry};
pub use store::WizardStore;
pub use validation::{ValidationEngine, ValidationResult};
