use super::common::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Barrier;

use crate::leads::SubmissionChannel;
use crate::report::GeneratedReport;
use crate::wizard::{
    MemoryStorage, PersistenceAdapter, StepId, StepOutcome, SubmissionStatus, WizardError,
    WizardPhase,
};

#[tokio::test]
async fn report_and_lead_calls_run_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let lead = Arc::new(RendezvousLead {
        barrier: barrier.clone(),
        received: Mutex::new(Vec::new()),
    });
    let dispatcher = dispatcher(Arc::new(RendezvousReport { barrier }), lead.clone());

    let mut controller = controller();
    ready_to_submit(&mut controller, "a@b.com");

    // Each fake waits for the other; sequential dispatch would hit the 1s timeouts.
    let status = controller.submit(&dispatcher, now()).await.expect("submit");

    assert_eq!(status, SubmissionStatus::Completed);
    let result = controller.lead_result().expect("lead result");
    assert!(result.success);
    assert_eq!(result.channel, SubmissionChannel::Primary);
}

#[tokio::test]
async fn happy_path_produces_plan_and_sends_merged_lead() {
    let storage = MemoryStorage::default();
    let lead = Arc::new(RecordingLead::default());
    let dispatcher = dispatcher(Arc::new(FlakyReport::failing(0)), lead.clone());

    let mut controller = controller_with(&storage, Duration::ZERO);
    ready_to_submit(&mut controller, "a@b.com");
    assert_eq!(
        controller.next(now()).expect("next"),
        StepOutcome::ReadyToSubmit
    );

    let status = controller.submit(&dispatcher, now()).await.expect("submit");

    assert_eq!(status, SubmissionStatus::Completed);
    assert_eq!(controller.phase(), WizardPhase::Completed);
    assert_eq!(controller.store().progress(), 100);
    assert!(!controller.store().is_transitioning());
    match controller.report() {
        Some(GeneratedReport::Plan(plan)) => assert!(plan.headline.contains("Austin")),
        other => panic!("expected a plan, got {other:?}"),
    }

    let received = lead.received.lock().expect("lock");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].email, "a@b.com");
    assert_eq!(received[0].city.as_deref(), Some("Austin"));

    let reader = PersistenceAdapter::new(Arc::new(storage.clone()), "test-session", RESUME_WINDOW);
    assert!(reader.load().is_none());
}

#[tokio::test]
async fn invalid_email_blocks_submission_without_network_calls() {
    let report = Arc::new(FlakyReport::failing(0));
    let lead = Arc::new(RecordingLead::default());
    let dispatcher = dispatcher(report.clone(), lead.clone());

    let mut controller = controller();
    ready_to_submit(&mut controller, "invalid-email");

    match controller.next(now()).expect("next") {
        StepOutcome::Blocked { step, validation } => {
            assert_eq!(step, StepId(10));
            assert!(!validation.messages_for("email").is_empty());
        }
        other => panic!("expected validation block, got {other:?}"),
    }

    match controller.submit(&dispatcher, now()).await {
        Err(WizardError::ValidationFailed { step, result }) => {
            assert_eq!(step, StepId(10));
            assert!(result.errors.contains_key("email"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(report.calls(), 0);
    assert_eq!(lead.calls(), 0);
    assert_eq!(controller.phase(), WizardPhase::InStep(StepId(10)));
}

#[tokio::test]
async fn report_failure_is_retryable_and_keeps_answers() {
    let report = Arc::new(FlakyReport::failing(1));
    let lead = Arc::new(RecordingLead::default());
    let dispatcher = dispatcher(report.clone(), lead.clone());

    let mut controller = controller();
    ready_to_submit(&mut controller, "a@b.com");

    let status = controller.submit(&dispatcher, now()).await.expect("submit");
    assert_eq!(status, SubmissionStatus::Failed);
    assert_eq!(controller.phase(), WizardPhase::SubmitFailed);
    assert!(controller.last_error().is_some());
    assert!(controller.lead_result().expect("lead").success);
    assert_eq!(controller.store().contact_info().email, "a@b.com");
    let completed_before = controller.store().completed_steps().clone();

    let status = controller.submit(&dispatcher, now()).await.expect("retry");
    assert_eq!(status, SubmissionStatus::Completed);
    assert_eq!(report.calls(), 2);
    assert!(controller.last_error().is_none());
    assert_eq!(controller.store().completed_steps(), &completed_before);
    assert_eq!(controller.store().completed_steps().len(), 10);
}

#[tokio::test]
async fn results_for_a_reset_session_are_discarded() {
    let dispatcher = dispatcher(
        Arc::new(FlakyReport::failing(0)),
        Arc::new(RecordingLead::default()),
    );
    let mut controller = controller();
    ready_to_submit(&mut controller, "a@b.com");

    let ticket = controller.begin_submission(now()).expect("ticket");
    assert!(controller.store().is_transitioning());
    controller.start_fresh();

    let outcome = dispatcher.dispatch(&ticket).await;
    assert_eq!(
        controller.apply_submission(&ticket, outcome),
        SubmissionStatus::Discarded
    );
    assert_eq!(controller.phase(), WizardPhase::InStep(StepId(1)));
    assert!(controller.report().is_none());
    assert!(controller.lead_result().is_none());
}

#[tokio::test]
async fn navigating_away_abandons_in_flight_submission() {
    let dispatcher = dispatcher(
        Arc::new(FlakyReport::failing(0)),
        Arc::new(RecordingLead::default()),
    );
    let mut controller = controller();
    ready_to_submit(&mut controller, "a@b.com");

    let ticket = controller.begin_submission(now()).expect("ticket");
    assert_eq!(controller.back(now()), Ok(StepId(9)));
    assert!(!controller.store().is_transitioning());

    let outcome = dispatcher.dispatch(&ticket).await;
    assert_eq!(
        controller.apply_submission(&ticket, outcome),
        SubmissionStatus::Discarded
    );
    assert_eq!(controller.phase(), WizardPhase::InStep(StepId(9)));
}

#[tokio::test]
async fn second_submission_is_refused_while_one_is_in_flight() {
    let mut controller = controller();
    ready_to_submit(&mut controller, "a@b.com");

    let _ticket = controller.begin_submission(now()).expect("ticket");
    assert!(matches!(
        controller.begin_submission(now()),
        Err(WizardError::WrongPhase {
            phase: WizardPhase::Submitting,
            ..
        })
    ));
}

#[tokio::test]
async fn lead_failure_on_both_channels_still_shows_the_plan() {
    let dispatcher = dispatcher(
        Arc::new(FlakyReport::failing(0)),
        Arc::new(crate::leads::UnconfiguredChannel::new("casaready-api")),
    );
    let mut controller = controller();
    ready_to_submit(&mut controller, "a@b.com");

    let status = controller.submit(&dispatcher, now()).await.expect("submit");

    assert_eq!(status, SubmissionStatus::Completed);
    let lead = controller.lead_result().expect("lead result");
    assert!(!lead.success);
    assert_eq!(lead.channel, SubmissionChannel::None);
    assert!(lead.error.as_deref().unwrap_or_default().contains("zapier"));
}
