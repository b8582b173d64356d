use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{ContactUpdate, FieldMap, Locale, StepId};
use super::persistence::{PersistenceAdapter, ResumeSummary, WizardSnapshot};
use super::store::WizardStore;
use super::validation::ValidationResult;
use crate::enrichment::{EnrichmentResponse, EnrichmentService};
use crate::leads::{LeadSubmissionOrchestrator, LeadSubmissionResult};
use crate::report::{GeneratedReport, ReportError, ReportRequest, ReportService};

const CONTACT_KEYS: [&str; 4] = ["first_name", "last_name", "email", "phone"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WizardError {
    #[error("wizard session {0} not found")]
    SessionNotFound(String),
    #[error("step {0} does not exist")]
    InvalidStep(u8),
    #[error("step {requested} is locked; furthest reachable step is {furthest}")]
    StepLocked { requested: StepId, furthest: StepId },
    #[error("step {step} failed validation")]
    ValidationFailed {
        step: StepId,
        result: ValidationResult,
    },
    #[error("wizard cannot {action} while {phase}")]
    WrongPhase {
        action: &'static str,
        phase: WizardPhase,
    },
    #[error("no saved progress to resume")]
    NoSavedProgress,
}

/// Caller-facing lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "step", rename_all = "snake_case")]
pub enum WizardPhase {
    Initializing,
    InStep(StepId),
    Submitting,
    Completed,
    SubmitFailed,
}

impl std::fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WizardPhase::Initializing => write!(f, "initializing"),
            WizardPhase::InStep(step) => write!(f, "on step {step}"),
            WizardPhase::Submitting => write!(f, "submitting"),
            WizardPhase::Completed => write!(f, "completed"),
            WizardPhase::SubmitFailed => write!(f, "awaiting retry"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Initializing,
    Editing,
    Submitting,
    Completed,
    SubmitFailed,
}

/// Result of a forward navigation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Advanced { step: StepId },
    Blocked { step: StepId, validation: ValidationResult },
    /// The terminal step validated; submission may begin.
    ReadyToSubmit,
}

/// Everything needed to run the terminal network calls without holding the controller.
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    generation: u64,
    attempt: u32,
    pub request: ReportRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub report: Result<GeneratedReport, ReportError>,
    pub lead: LeadSubmissionResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Completed,
    Failed,
    /// The session moved on before the calls finished; nothing was applied.
    Discarded,
}

/// Runs the report and lead calls concurrently.
#[derive(Clone)]
pub struct SubmissionDispatcher {
    report: ReportService,
    leads: LeadSubmissionOrchestrator,
}

impl SubmissionDispatcher {
    pub fn new(report: ReportService, leads: LeadSubmissionOrchestrator) -> Self {
        Self { report, leads }
    }

    pub async fn dispatch(&self, ticket: &SubmissionTicket) -> SubmissionOutcome {
        let request = &ticket.request;
        let (report, lead) = tokio::join!(
            self.report.generate(request),
            self.leads
                .submit_lead(&request.step_data, &request.contact, request.locale),
        );
        SubmissionOutcome { report, lead }
    }
}

/// Location lookup issued from the first step.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentTicket {
    generation: u64,
    pub city: String,
    pub state: Option<String>,
    pub locale: Locale,
}

/// Drives one wizard session: validation-gated navigation, autosave, resume and the
/// terminal submission.
#[derive(Debug)]
pub struct WizardController {
    store: WizardStore,
    persistence: PersistenceAdapter,
    autosave_debounce: chrono::Duration,
    stage: Stage,
    last_saved_at: Option<DateTime<Utc>>,
    dirty: bool,
    pending_resume: Option<WizardSnapshot>,
    attempt: u32,
    report: Option<GeneratedReport>,
    lead_result: Option<LeadSubmissionResult>,
    last_error: Option<String>,
}

impl WizardController {
    pub fn new(
        store: WizardStore,
        persistence: PersistenceAdapter,
        autosave_debounce: std::time::Duration,
    ) -> Self {
        Self {
            store,
            persistence,
            autosave_debounce: chrono::Duration::from_std(autosave_debounce)
                .unwrap_or_else(|_| chrono::Duration::zero()),
            stage: Stage::Initializing,
            last_saved_at: None,
            dirty: false,
            pending_resume: None,
            attempt: 0,
            report: None,
            lead_result: None,
            last_error: None,
        }
    }

    pub fn store(&self) -> &WizardStore {
        &self.store
    }

    pub fn phase(&self) -> WizardPhase {
        match self.stage {
            Stage::Initializing => WizardPhase::Initializing,
            Stage::Editing => WizardPhase::InStep(self.store.current_step()),
            Stage::Submitting => WizardPhase::Submitting,
            Stage::Completed => WizardPhase::Completed,
            Stage::SubmitFailed => WizardPhase::SubmitFailed,
        }
    }

    pub fn report(&self) -> Option<&GeneratedReport> {
        self.report.as_ref()
    }

    pub fn lead_result(&self) -> Option<&LeadSubmissionResult> {
        self.lead_result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Looks for resumable progress. With a snapshot available the session stays in
    /// `Initializing` until the caller picks [`resume`](Self::resume) or
    /// [`start_fresh`](Self::start_fresh).
    pub fn initialize(&mut self, now: DateTime<Utc>) -> Option<ResumeSummary> {
        match self.persistence.load_resumable(now) {
            Some(snapshot) => {
                let summary = self.persistence.summarize(&snapshot, now);
                self.pending_resume = Some(snapshot);
                self.stage = Stage::Initializing;
                Some(summary)
            }
            None => {
                self.stage = Stage::Editing;
                None
            }
        }
    }

    pub fn resume_summary(&self, now: DateTime<Utc>) -> Option<ResumeSummary> {
        self.pending_resume
            .as_ref()
            .map(|snapshot| self.persistence.summarize(snapshot, now))
    }

    pub fn resume(&mut self) -> Result<StepId, WizardError> {
        let snapshot = self
            .pending_resume
            .take()
            .ok_or(WizardError::NoSavedProgress)?;
        self.store.restore(&snapshot);
        self.clear_results();
        self.stage = Stage::Editing;
        info!(step = %self.store.current_step(), "wizard resumed from saved progress");
        Ok(self.store.current_step())
    }

    /// Discard any saved progress and begin at step one.
    pub fn start_fresh(&mut self) {
        self.persistence.clear();
        self.store.reset();
        self.pending_resume = None;
        self.last_saved_at = None;
        self.dirty = false;
        self.clear_results();
        self.stage = Stage::Editing;
    }

    /// Merge input for `step` without validating it. Contact keys on the terminal step
    /// go to the contact record.
    pub fn record_step(
        &mut self,
        step: StepId,
        mut fields: FieldMap,
        now: DateTime<Utc>,
    ) -> Result<(), WizardError> {
        self.require_editing("edit a step")?;
        if self.store.validation().registry().get(step).is_none() {
            return Err(WizardError::InvalidStep(step.get()));
        }
        if step > self.store.furthest_reachable_step() {
            return Err(WizardError::StepLocked {
                requested: step,
                furthest: self.store.furthest_reachable_step(),
            });
        }

        let location_before = self.location();
        if step == self.store.validation().registry().terminal() {
            let update = ContactUpdate::from_fields(&fields);
            fields.retain(|key, _| !CONTACT_KEYS.contains(&key.as_str()));
            self.store.update_contact_info(update);
        }
        if !fields.is_empty() || self.store.step_data(step).is_none() {
            self.store.update_step_data(step, fields);
        }
        if step == StepId::FIRST
            && self.store.census_data().is_some()
            && self.location() != location_before
        {
            debug!("location changed; dropping census insights");
            self.store.update_census_data(None);
        }

        self.dirty = true;
        self.autosave(now);
        Ok(())
    }

    /// Validate the current step and advance on success.
    pub fn next(&mut self, now: DateTime<Utc>) -> Result<StepOutcome, WizardError> {
        self.require_editing("advance")?;
        let step = self.store.current_step();
        let validation = self.store.validate_step(step);
        if !validation.is_valid {
            debug!(%step, fields = validation.errors.len(), "step blocked by validation");
            return Ok(StepOutcome::Blocked { step, validation });
        }

        self.store.mark_step_completed(step);
        self.dirty = true;

        if step == self.store.validation().registry().terminal() {
            self.flush(now);
            return Ok(StepOutcome::ReadyToSubmit);
        }

        let next = self.store.go_to_next_step();
        self.flush(now);
        Ok(StepOutcome::Advanced { step: next })
    }

    pub fn back(&mut self, now: DateTime<Utc>) -> Result<StepId, WizardError> {
        match self.stage {
            Stage::Editing | Stage::SubmitFailed => {}
            // Leaving mid-submission abandons the in-flight calls.
            Stage::Submitting => {
                self.store.set_transitioning(false);
                info!("submission abandoned by navigation");
            }
            Stage::Initializing | Stage::Completed => {
                return Err(self.wrong_phase("go back"));
            }
        }
        self.stage = Stage::Editing;
        let step = self.store.go_to_previous_step();
        self.dirty = true;
        self.flush(now);
        Ok(step)
    }

    /// Jump to an earlier step, or the next unlocked one.
    pub fn jump_to(&mut self, step: StepId, now: DateTime<Utc>) -> Result<StepId, WizardError> {
        self.require_editing("jump")?;
        if self.store.validation().registry().get(step).is_none() {
            return Err(WizardError::InvalidStep(step.get()));
        }
        let furthest = self.store.furthest_reachable_step();
        if step > furthest {
            return Err(WizardError::StepLocked {
                requested: step,
                furthest,
            });
        }
        let landed = self.store.go_to_step(step);
        self.dirty = true;
        self.flush(now);
        Ok(landed)
    }

    /// Save if the debounce window has elapsed since the last write. Only field edits
    /// are debounced; step transitions always write through.
    pub fn autosave(&mut self, now: DateTime<Utc>) -> bool {
        if !self.dirty {
            return false;
        }
        let due = self
            .last_saved_at
            .map(|last| now - last >= self.autosave_debounce)
            .unwrap_or(true);
        if due {
            self.save_now(now);
        }
        due
    }

    /// Write any unsaved changes regardless of the debounce window.
    pub fn flush(&mut self, now: DateTime<Utc>) {
        if self.dirty {
            self.save_now(now);
        }
    }

    fn save_now(&mut self, now: DateTime<Utc>) {
        self.persistence.save(self.store.session(), now);
        self.last_saved_at = Some(now);
        self.dirty = false;
    }

    /// Capture the location lookup for the current city, if any.
    pub fn enrichment_request(&self) -> Option<EnrichmentTicket> {
        let (city, state) = self.location()?;
        Some(EnrichmentTicket {
            generation: self.store.generation(),
            city,
            state,
            locale: self.store.locale(),
        })
    }

    /// Attach census insights unless the session was reset or the city changed since
    /// the lookup was issued. A failed lookup for the current city clears any earlier
    /// insights. Returns whether insights were attached.
    pub fn apply_enrichment(
        &mut self,
        ticket: &EnrichmentTicket,
        response: EnrichmentResponse,
    ) -> bool {
        if ticket.generation != self.store.generation() {
            debug!(city = %ticket.city, "discarding enrichment for a previous session");
            return false;
        }
        if self.location().map(|(city, _)| city) != Some(ticket.city.clone()) {
            debug!(city = %ticket.city, "discarding enrichment for a changed location");
            return false;
        }
        match response.data {
            Some(data) if response.success => {
                self.store.update_census_data(Some(data));
                true
            }
            // No insights for this location; whatever was attached belongs to another lookup.
            _ => {
                self.store.update_census_data(None);
                false
            }
        }
    }

    pub async fn enrich_location(&mut self, service: &EnrichmentService) -> bool {
        let Some(ticket) = self.enrichment_request() else {
            return false;
        };
        let response = service
            .lookup(&ticket.city, ticket.state.as_deref(), ticket.locale)
            .await;
        self.apply_enrichment(&ticket, response)
    }

    fn location(&self) -> Option<(String, Option<String>)> {
        let slice = self.store.step_data(StepId::FIRST)?;
        let city = slice
            .get("city")
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|city| !city.is_empty())?
            .to_string();
        let state = slice
            .get("state")
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|state| !state.is_empty())
            .map(str::to_string);
        Some((city, state))
    }

    /// Validate the contact step and enter `Submitting`. Also used for retries from
    /// `SubmitFailed`; entered data is left untouched.
    pub fn begin_submission(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<SubmissionTicket, WizardError> {
        let terminal = self.store.validation().registry().terminal();
        match self.stage {
            Stage::Editing if self.store.current_step() == terminal => {}
            Stage::SubmitFailed => {}
            _ => return Err(self.wrong_phase("submit")),
        }

        let validation = self.store.validate_step(terminal);
        if !validation.is_valid {
            debug!(step = %terminal, "submission blocked by validation");
            return Err(WizardError::ValidationFailed {
                step: terminal,
                result: validation,
            });
        }

        self.store.mark_step_completed(terminal);
        self.store.set_transitioning(true);
        self.dirty = true;
        self.flush(now);
        self.attempt += 1;
        self.last_error = None;
        self.stage = Stage::Submitting;

        Ok(SubmissionTicket {
            generation: self.store.generation(),
            attempt: self.attempt,
            request: ReportRequest {
                step_data: self.store.buyer_profile(),
                contact: self.store.contact_info().clone(),
                locale: self.store.locale(),
                census: self.store.census_data().cloned(),
            },
        })
    }

    /// Apply dispatched results if the ticket still belongs to the active attempt.
    pub fn apply_submission(
        &mut self,
        ticket: &SubmissionTicket,
        outcome: SubmissionOutcome,
    ) -> SubmissionStatus {
        let current = self.stage == Stage::Submitting
            && ticket.generation == self.store.generation()
            && ticket.attempt == self.attempt;
        if !current {
            debug!(attempt = ticket.attempt, "discarding stale submission result");
            return SubmissionStatus::Discarded;
        }

        self.store.set_transitioning(false);
        if !outcome.lead.success {
            warn!(
                error = outcome.lead.error.as_deref().unwrap_or_default(),
                "lead could not be delivered"
            );
        }
        self.lead_result = Some(outcome.lead);

        match outcome.report {
            Ok(report) => {
                self.report = Some(report);
                self.stage = Stage::Completed;
                self.persistence.clear();
                info!(attempt = ticket.attempt, "wizard submission completed");
                SubmissionStatus::Completed
            }
            Err(err) => {
                warn!(attempt = ticket.attempt, error = %err, "report generation failed");
                self.last_error = Some(report_failure_message(self.store.locale()));
                self.stage = Stage::SubmitFailed;
                SubmissionStatus::Failed
            }
        }
    }

    /// Begin, dispatch and apply in one call. Retries use the same path.
    pub async fn submit(
        &mut self,
        dispatcher: &SubmissionDispatcher,
        now: DateTime<Utc>,
    ) -> Result<SubmissionStatus, WizardError> {
        let ticket = self.begin_submission(now)?;
        let outcome = dispatcher.dispatch(&ticket).await;
        Ok(self.apply_submission(&ticket, outcome))
    }

    fn clear_results(&mut self) {
        self.attempt = 0;
        self.report = None;
        self.lead_result = None;
        self.last_error = None;
    }

    fn require_editing(&self, action: &'static str) -> Result<(), WizardError> {
        if self.stage == Stage::Editing {
            Ok(())
        } else {
            Err(self.wrong_phase(action))
        }
    }

    fn wrong_phase(&self, action: &'static str) -> WizardError {
        WizardError::WrongPhase {
            action,
            phase: self.phase(),
        }
    }
}

fn report_failure_message(locale: Locale) -> String {
    match locale {
        Locale::En => {
            "We could not build your plan right now. Your answers are saved; please try again."
                .to_string()
        }
        Locale::Es => {
            "No pudimos generar tu plan en este momento. Tus respuestas están guardadas; inténtalo de nuevo."
                .to_string()
        }
    }
}
