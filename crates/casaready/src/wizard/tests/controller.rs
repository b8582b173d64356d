use super::common::*;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::enrichment::{
    CensusInsights, EnrichmentClient, EnrichmentError, EnrichmentResponse, EnrichmentService,
    FixtureCensusProvider, LocationQuery,
};
use crate::wizard::{
    Locale, MemoryStorage, PersistenceAdapter, SnapshotStorage, StepId, StepOutcome, WizardError,
    WizardPhase,
};

#[test]
fn fresh_session_starts_on_first_step() {
    let controller = controller();
    assert_eq!(controller.phase(), WizardPhase::InStep(StepId(1)));
    assert_eq!(controller.store().progress(), 0);
}

#[test]
fn next_is_blocked_by_missing_fields() {
    let mut controller = controller();
    controller
        .record_step(StepId(1), fields(json!({ "city": "Austin" })), now())
        .expect("record");

    match controller.next(now()).expect("next") {
        StepOutcome::Blocked { step, validation } => {
            assert_eq!(step, StepId(1));
            assert!(!validation.messages_for("zip").is_empty());
        }
        other => panic!("expected validation block, got {other:?}"),
    }
    assert_eq!(controller.phase(), WizardPhase::InStep(StepId(1)));
    assert!(controller.store().completed_steps().is_empty());
}

#[test]
fn cannot_jump_past_furthest_reachable_step() {
    let mut controller = controller();
    walk_to(&mut controller, 3);

    assert_eq!(
        controller.jump_to(StepId(6), now()),
        Err(WizardError::StepLocked {
            requested: StepId(6),
            furthest: StepId(3),
        })
    );
    assert!(matches!(
        controller.record_step(StepId(7), answers(7), now()),
        Err(WizardError::StepLocked { .. })
    ));
    assert_eq!(controller.jump_to(StepId(1), now()), Ok(StepId(1)));
    assert_eq!(controller.jump_to(StepId(3), now()), Ok(StepId(3)));
    assert_eq!(
        controller.jump_to(StepId(42), now()),
        Err(WizardError::InvalidStep(42))
    );
}

#[test]
fn back_keeps_answers() {
    let mut controller = controller();
    walk_to(&mut controller, 3);

    assert_eq!(controller.back(now()), Ok(StepId(2)));
    assert_eq!(controller.back(now()), Ok(StepId(1)));
    assert_eq!(controller.back(now()), Ok(StepId(1)));
    assert_eq!(
        controller.store().step_data(StepId(1)).and_then(|slice| slice.get("city")),
        Some(&json!("Austin"))
    );
    assert_eq!(controller.store().progress(), 20);
}

#[test]
fn saved_progress_resumes_at_the_same_step() {
    let storage = MemoryStorage::default();
    let mut first = controller_with(&storage, Duration::ZERO);
    walk_to(&mut first, 4);

    let persistence =
        PersistenceAdapter::new(Arc::new(storage.clone()), "test-session", RESUME_WINDOW);
    let store =
        crate::wizard::WizardStore::new(crate::wizard::ValidationEngine::standard(), Locale::Es);
    let mut second = crate::wizard::WizardController::new(store, persistence, Duration::ZERO);

    let summary = second.initialize(now()).expect("resume prompt");
    assert_eq!(summary.step, StepId(4));
    assert_eq!(summary.completed_count, 3);
    assert_eq!(second.phase(), WizardPhase::Initializing);

    assert_eq!(second.resume(), Ok(StepId(4)));
    assert_eq!(second.phase(), WizardPhase::InStep(StepId(4)));
    assert_eq!(
        second.store().step_data(StepId(1)).and_then(|slice| slice.get("city")),
        Some(&json!("Austin"))
    );
    assert_eq!(second.store().locale(), Locale::Es);
}

#[test]
fn start_fresh_discards_saved_progress() {
    let storage = MemoryStorage::default();
    let mut first = controller_with(&storage, Duration::ZERO);
    walk_to(&mut first, 4);

    let mut second = controller_with(&storage, Duration::ZERO);
    assert!(second.resume_summary(now()).is_some());
    second.start_fresh();

    assert_eq!(second.phase(), WizardPhase::InStep(StepId(1)));
    assert!(second.store().completed_steps().is_empty());
    assert_eq!(second.resume(), Err(WizardError::NoSavedProgress));

    let third = controller_with(&storage, Duration::ZERO);
    assert_eq!(third.phase(), WizardPhase::InStep(StepId(1)));
}

#[test]
fn editing_is_refused_while_a_resume_decision_is_pending() {
    let storage = MemoryStorage::default();
    let mut first = controller_with(&storage, Duration::ZERO);
    walk_to(&mut first, 2);

    let mut second = controller_with(&storage, Duration::ZERO);
    assert!(matches!(
        second.next(now()),
        Err(WizardError::WrongPhase {
            phase: WizardPhase::Initializing,
            ..
        })
    ));
}

#[test]
fn autosave_is_debounced_until_flush() {
    let storage = MemoryStorage::default();
    let mut controller = controller_with(&storage, Duration::from_millis(1500));
    let reader =
        PersistenceAdapter::new(Arc::new(storage.clone()), "test-session", RESUME_WINDOW);

    controller
        .record_step(StepId(1), fields(json!({ "city": "Austin" })), now())
        .expect("record");
    let saved = reader.load().expect("first save is immediate");
    assert_eq!(saved.step_data[&StepId(1)].get("zip"), None);

    let soon = now() + chrono::Duration::milliseconds(500);
    controller
        .record_step(StepId(1), fields(json!({ "zip": "78701" })), soon)
        .expect("record");
    let saved = reader.load().expect("snapshot");
    assert_eq!(saved.step_data[&StepId(1)].get("zip"), None);

    controller.flush(soon);
    let saved = reader.load().expect("snapshot");
    assert_eq!(saved.step_data[&StepId(1)].get("zip"), Some(&json!("78701")));
}

#[test]
fn corrupt_saved_progress_starts_fresh() {
    let storage = MemoryStorage::default();
    storage
        .write("casaready.wizard.test-session", "{not json")
        .expect("seed");

    let controller = controller_with(&storage, Duration::ZERO);
    assert_eq!(controller.phase(), WizardPhase::InStep(StepId(1)));
}

#[tokio::test]
async fn enrichment_attaches_census_insights() {
    let mut controller = controller();
    controller
        .record_step(StepId(1), answers(1), now())
        .expect("record");
    let service = EnrichmentService::new(Arc::new(FixtureCensusProvider), Duration::from_secs(1));

    assert!(controller.enrich_location(&service).await);
    let census = controller.store().census_data().expect("census data");
    assert_eq!(census.location.county.as_deref(), Some("Travis County"));
}

struct BrokenCensus;

#[async_trait]
impl EnrichmentClient for BrokenCensus {
    async fn fetch(
        &self,
        _query: &LocationQuery,
        _locale: Locale,
    ) -> Result<CensusInsights, EnrichmentError> {
        Err(EnrichmentError::Transport("connection reset".to_string()))
    }
}

#[tokio::test]
async fn enrichment_failure_never_blocks_progress() {
    let mut controller = controller();
    controller
        .record_step(StepId(1), answers(1), now())
        .expect("record");
    let service = EnrichmentService::new(Arc::new(BrokenCensus), Duration::from_secs(1));

    assert!(!controller.enrich_location(&service).await);
    assert!(controller.store().census_data().is_none());
    assert_eq!(
        controller.next(now()).expect("next"),
        StepOutcome::Advanced { step: StepId(2) }
    );
}

#[test]
fn enrichment_for_a_reset_session_is_discarded() {
    let mut controller = controller();
    controller
        .record_step(StepId(1), answers(1), now())
        .expect("record");
    let ticket = controller.enrichment_request().expect("ticket");
    let response = EnrichmentResponse::found(CensusInsights::empty_for("Austin", Some("TX")));

    controller.start_fresh();
    controller
        .record_step(StepId(1), answers(1), now())
        .expect("record");

    assert!(!controller.apply_enrichment(&ticket, response));
    assert!(controller.store().census_data().is_none());
}

#[test]
fn enrichment_for_a_changed_city_is_discarded() {
    let mut controller = controller();
    controller
        .record_step(StepId(1), answers(1), now())
        .expect("record");
    let ticket = controller.enrichment_request().expect("ticket");

    controller
        .record_step(StepId(1), fields(json!({ "city": "Houston" })), now())
        .expect("record");

    let response = EnrichmentResponse::found(CensusInsights::empty_for("Austin", Some("TX")));
    assert!(!controller.apply_enrichment(&ticket, response));
}

#[tokio::test]
async fn changing_city_drops_previous_census_data() {
    let mut controller = controller();
    controller
        .record_step(StepId(1), answers(1), now())
        .expect("record");
    let fixtures = EnrichmentService::new(Arc::new(FixtureCensusProvider), Duration::from_secs(1));
    assert!(controller.enrich_location(&fixtures).await);

    controller
        .record_step(StepId(1), fields(json!({ "city": "Lubbock" })), now())
        .expect("record");
    assert!(controller.store().census_data().is_none());

    let broken = EnrichmentService::new(Arc::new(BrokenCensus), Duration::from_secs(1));
    assert!(!controller.enrich_location(&broken).await);
    assert!(controller.store().census_data().is_none());
}

#[tokio::test]
async fn failed_lookup_for_the_same_city_clears_census_data() {
    let mut controller = controller();
    controller
        .record_step(StepId(1), answers(1), now())
        .expect("record");
    let fixtures = EnrichmentService::new(Arc::new(FixtureCensusProvider), Duration::from_secs(1));
    assert!(controller.enrich_location(&fixtures).await);

    let broken = EnrichmentService::new(Arc::new(BrokenCensus), Duration::from_secs(1));
    assert!(!controller.enrich_location(&broken).await);
    assert!(controller.store().census_data().is_none());
}

#[tokio::test]
async fn editing_other_step_one_fields_keeps_census_data() {
    let mut controller = controller();
    controller
        .record_step(StepId(1), answers(1), now())
        .expect("record");
    let fixtures = EnrichmentService::new(Arc::new(FixtureCensusProvider), Duration::from_secs(1));
    assert!(controller.enrich_location(&fixtures).await);

    controller
        .record_step(StepId(1), fields(json!({ "zip": "78702" })), now())
        .expect("record");
    assert!(controller.store().census_data().is_some());
}

#[test]
fn step_transitions_save_inside_the_debounce_window() {
    let storage = MemoryStorage::default();
    let mut controller = controller_with(&storage, Duration::from_secs(60));
    walk_to(&mut controller, 3);

    let reader =
        PersistenceAdapter::new(Arc::new(storage.clone()), "test-session", RESUME_WINDOW);
    let saved = reader.load().expect("snapshot");
    assert_eq!(saved.current_step, StepId(3));
    assert_eq!(saved.completed_steps.len(), 2);

    controller.back(now()).expect("back");
    assert_eq!(reader.load().expect("snapshot").current_step, StepId(2));

    let reopened = controller_with(&storage, Duration::from_secs(60));
    let summary = reopened.resume_summary(now()).expect("resumable");
    assert_eq!(summary.step, StepId(2));
    assert_eq!(summary.completed_count, 2);
}
