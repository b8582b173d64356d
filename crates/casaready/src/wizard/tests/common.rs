use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio::sync::Barrier;

use crate::leads::{
    ChannelError, LeadChannel, LeadRecord, LeadSubmissionOrchestrator, UnconfiguredChannel,
};
use crate::report::{
    GeneratedReport, ReportClient, ReportError, ReportRequest, ReportService,
    TemplateReportGenerator,
};
use crate::wizard::{
    FieldMap, Locale, MemoryStorage, PersistenceAdapter, StepId, StepOutcome,
    SubmissionDispatcher, ValidationEngine, WizardController, WizardStore,
};

pub(super) const RESUME_WINDOW: Duration = Duration::from_secs(72 * 3600);

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn fields(value: serde_json::Value) -> FieldMap {
    serde_json::from_value(value).expect("field map")
}

/// Valid answers for every non-contact step.
pub(super) fn answers(step: u8) -> FieldMap {
    match step {
        1 => fields(json!({ "city": "Austin", "state": "TX", "zip": "78701" })),
        2 => fields(json!({ "timeline": "3-6" })),
        3 => fields(json!({ "annual_income": 130000, "target_price": 350000 })),
        4 => fields(json!({ "down_payment": 35000, "monthly_savings": 1500 })),
        5 => fields(json!({ "credit_range": "good" })),
        6 => fields(json!({ "employment_status": "full_time", "monthly_debts": 400 })),
        7 => fields(json!({ "property_type": "single_family", "bedrooms": 3 })),
        8 => fields(json!({ "loan_type": "conventional", "first_time_buyer": true })),
        9 => fields(json!({ "priorities": ["schools", "commute"] })),
        _ => FieldMap::new(),
    }
}

pub(super) fn contact_fields(email: &str) -> FieldMap {
    fields(json!({
        "first_name": "Ana",
        "last_name": "García",
        "email": email,
        "phone": "512-555-0100",
    }))
}

pub(super) fn controller_with(storage: &MemoryStorage, debounce: Duration) -> WizardController {
    let persistence =
        PersistenceAdapter::new(Arc::new(storage.clone()), "test-session", RESUME_WINDOW);
    let store = WizardStore::new(ValidationEngine::standard(), Locale::En);
    let mut controller = WizardController::new(store, persistence, debounce);
    controller.initialize(now());
    controller
}

pub(super) fn controller() -> WizardController {
    controller_with(&MemoryStorage::default(), Duration::ZERO)
}

/// Answer and advance through steps `1..until`.
pub(super) fn walk_to(controller: &mut WizardController, until: u8) {
    for step in 1..until {
        controller
            .record_step(StepId(step), answers(step), now())
            .expect("record step");
        match controller.next(now()).expect("advance") {
            StepOutcome::Advanced { step: next } => assert_eq!(next, StepId(step + 1)),
            other => panic!("step {step} did not advance: {other:?}"),
        }
    }
}

/// Walk to the contact step and fill it in.
pub(super) fn ready_to_submit(controller: &mut WizardController, email: &str) {
    walk_to(controller, 10);
    controller
        .record_step(StepId(10), contact_fields(email), now())
        .expect("record contact");
}

pub(super) fn dispatcher(
    report: Arc<dyn ReportClient>,
    primary: Arc<dyn LeadChannel>,
) -> SubmissionDispatcher {
    SubmissionDispatcher::new(
        ReportService::new(report, Duration::from_secs(1)),
        LeadSubmissionOrchestrator::new(
            primary,
            Arc::new(UnconfiguredChannel::new("zapier")),
            Duration::from_secs(1),
        ),
    )
}

/// Report client that only finishes once the lead channel has also started.
pub(super) struct RendezvousReport {
    pub barrier: Arc<Barrier>,
}

#[async_trait]
impl ReportClient for RendezvousReport {
    async fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, ReportError> {
        self.barrier.wait().await;
        TemplateReportGenerator.generate(request).await
    }
}

#[derive(Debug)]
pub(super) struct RendezvousLead {
    pub barrier: Arc<Barrier>,
    pub received: Mutex<Vec<LeadRecord>>,
}

#[async_trait]
impl LeadChannel for RendezvousLead {
    fn name(&self) -> &str {
        "casaready-api"
    }

    async fn deliver(&self, lead: &LeadRecord) -> Result<(), ChannelError> {
        self.barrier.wait().await;
        self.received.lock().expect("lock").push(lead.clone());
        Ok(())
    }
}

/// Fails the first `failures` calls, then delegates to the template generator.
#[derive(Default)]
pub(super) struct FlakyReport {
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyReport {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportClient for FlakyReport {
    async fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, ReportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ReportError::Status(502));
        }
        TemplateReportGenerator.generate(request).await
    }
}

#[derive(Debug, Default)]
pub(super) struct RecordingLead {
    pub received: Mutex<Vec<LeadRecord>>,
}

impl RecordingLead {
    pub fn calls(&self) -> usize {
        self.received.lock().expect("lock").len()
    }
}

#[async_trait]
impl LeadChannel for RecordingLead {
    fn name(&self) -> &str {
        "casaready-api"
    }

    async fn deliver(&self, lead: &LeadRecord) -> Result<(), ChannelError> {
        self.received.lock().expect("lock").push(lead.clone());
        Ok(())
    }
}
