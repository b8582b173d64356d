use std::collections::BTreeSet;

use super::domain::{ContactInfo, ContactUpdate, FieldMap, Locale, StepId, WizardSession};
use super::persistence::WizardSnapshot;
use super::validation::{ValidationEngine, ValidationResult};
use crate::enrichment::CensusInsights;

/// Single source of truth for a wizard session.
///
/// All operations are synchronous and perform no I/O; network results are fed back in
/// through the mutation methods once they resolve.
#[derive(Debug, Clone)]
pub struct WizardStore {
    session: WizardSession,
    validation: ValidationEngine,
    /// Bumped on every reset/restore so in-flight results can detect they are stale.
    generation: u64,
}

impl WizardStore {
    pub fn new(validation: ValidationEngine, locale: Locale) -> Self {
        let total_steps = validation.registry().len();
        Self {
            session: WizardSession::new(total_steps, locale),
            validation,
            generation: 0,
        }
    }

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    pub fn validation(&self) -> &ValidationEngine {
        &self.validation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_step(&self) -> StepId {
        self.session.current_step
    }

    pub fn total_steps(&self) -> u8 {
        self.session.total_steps
    }

    pub fn locale(&self) -> Locale {
        self.session.locale
    }

    pub fn completed_steps(&self) -> &BTreeSet<StepId> {
        &self.session.completed_steps
    }

    pub fn contact_info(&self) -> &ContactInfo {
        &self.session.contact_info
    }

    pub fn census_data(&self) -> Option<&CensusInsights> {
        self.session.census_data.as_ref()
    }

    pub fn is_transitioning(&self) -> bool {
        self.session.is_transitioning
    }

    pub fn step_data(&self, step: StepId) -> Option<&FieldMap> {
        self.session.step_data.get(&step)
    }

    /// Merge of every step slice, used as the buyer profile.
    pub fn buyer_profile(&self) -> FieldMap {
        self.session.buyer_profile()
    }

    /// Shallow merge; keys absent from `partial` are preserved.
    pub fn update_step_data(&mut self, step: StepId, partial: FieldMap) {
        let slice = self.session.step_data.entry(step).or_default();
        slice.extend(partial);
    }

    pub fn mark_step_completed(&mut self, step: StepId) {
        if (1..=self.session.total_steps).contains(&step.get()) {
            self.session.completed_steps.insert(step);
        }
    }

    pub fn go_to_next_step(&mut self) -> StepId {
        let next = self
            .session
            .current_step
            .get()
            .saturating_add(1)
            .min(self.session.total_steps);
        self.session.current_step = StepId(next);
        self.session.current_step
    }

    pub fn go_to_previous_step(&mut self) -> StepId {
        let previous = self.session.current_step.get().saturating_sub(1).max(1);
        self.session.current_step = StepId(previous);
        self.session.current_step
    }

    /// Jump directly to `step`, clamped to the valid range. Navigation policy lives in the
    /// controller.
    pub fn go_to_step(&mut self, step: StepId) -> StepId {
        let clamped = step.get().clamp(1, self.session.total_steps);
        self.session.current_step = StepId(clamped);
        self.session.current_step
    }

    pub fn update_contact_info(&mut self, update: ContactUpdate) {
        self.session.contact_info.merge(update);
    }

    pub fn update_census_data(&mut self, census: Option<CensusInsights>) {
        self.session.census_data = census;
    }

    pub fn set_transitioning(&mut self, transitioning: bool) {
        self.session.is_transitioning = transitioning;
    }

    pub fn progress(&self) -> u8 {
        let total = f64::from(self.session.total_steps);
        let done = self.session.completed_steps.len() as f64;
        ((done / total) * 100.0).round().min(100.0) as u8
    }

    /// Highest step the buyer may navigate to without skipping unvalidated steps.
    pub fn furthest_reachable_step(&self) -> StepId {
        let furthest = self
            .session
            .completed_steps
            .iter()
            .next_back()
            .map(|step| step.get().saturating_add(1))
            .unwrap_or(1)
            .min(self.session.total_steps);
        StepId(furthest)
    }

    /// Fields validated for `step`. Earlier slices give cross-field rules their context,
    /// and the terminal step reads from the contact record.
    pub fn validation_fields(&self, step: StepId) -> FieldMap {
        let mut fields: FieldMap = self
            .session
            .step_data
            .range(..step)
            .flat_map(|(_, slice)| slice.clone())
            .collect();
        fields.extend(self.step_data(step).cloned().unwrap_or_default());
        if step.get() == self.session.total_steps {
            fields.extend(self.session.contact_info.as_fields());
        }
        fields
    }

    pub fn validate_step(&self, step: StepId) -> ValidationResult {
        self.validation
            .validate(step, &self.validation_fields(step), self.session.locale)
    }

    pub fn can_proceed_to_next(&self, step: StepId) -> bool {
        self.validate_step(step).is_valid
    }

    /// Restore defaults. Durable storage is left to the caller.
    pub fn reset(&mut self) {
        let locale = self.session.locale;
        self.session = WizardSession::new(self.session.total_steps, locale);
        self.generation += 1;
    }

    /// Rehydrate from a persisted snapshot, keeping the current locale.
    pub fn restore(&mut self, snapshot: &WizardSnapshot) {
        let total_steps = self.session.total_steps;
        let mut session = WizardSession::new(total_steps, self.session.locale);
        session.current_step = StepId(snapshot.current_step.get().clamp(1, total_steps));
        session.step_data = snapshot.step_data.clone();
        session.contact_info = snapshot.contact_info.clone();
        session.completed_steps = snapshot
            .completed_steps
            .iter()
            .copied()
            .filter(|step| (1..=total_steps).contains(&step.get()))
            .collect();
        self.session = session;
        self.generation += 1;
    }
}
