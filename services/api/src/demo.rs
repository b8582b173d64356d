use crate::infra::{
    in_process_services, InMemoryLeadRepository, IntakeLeadChannel, PRIMARY_CHANNEL_NAME,
};
use async_trait::async_trait;
use casaready::error::AppError;
use casaready::leads::{
    ChannelError, LeadChannel, LeadIntakeService, LeadRecord, LeadSubmissionResult,
    UnconfiguredChannel,
};
use casaready::report::GeneratedReport;
use casaready::wizard::{
    FieldMap, Locale, MemoryStorage, PersistenceAdapter, StepId, StepOutcome, SubmissionStatus,
    ValidationEngine, WizardController, WizardStore,
};
use chrono::Utc;
use clap::Args;
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Session language (en or es).
    #[arg(long, default_value = "en", value_parser = parse_locale)]
    pub(crate) locale: Locale,
    /// Contact email submitted on the final step.
    #[arg(long, default_value = "ana.garcia@example.com")]
    pub(crate) email: String,
    /// Take the primary lead intake offline so the webhook fallback receives the lead.
    #[arg(long)]
    pub(crate) simulate_primary_outage: bool,
}

fn parse_locale(raw: &str) -> Result<Locale, String> {
    Locale::parse(raw).ok_or_else(|| format!("unsupported locale '{raw}' (expected en or es)"))
}

/// Webhook stand-in that keeps every lead it receives.
#[derive(Debug, Default)]
struct RecordingWebhook {
    received: Mutex<Vec<LeadRecord>>,
}

impl RecordingWebhook {
    fn received(&self) -> usize {
        self.received.lock().expect("webhook mutex poisoned").len()
    }
}

#[async_trait]
impl LeadChannel for RecordingWebhook {
    fn name(&self) -> &str {
        "zapier"
    }

    async fn deliver(&self, lead: &LeadRecord) -> Result<(), ChannelError> {
        self.received
            .lock()
            .expect("webhook mutex poisoned")
            .push(lead.clone());
        Ok(())
    }
}

struct DemoOutcome {
    status: SubmissionStatus,
    report: Option<GeneratedReport>,
    lead: Option<LeadSubmissionResult>,
    intake_count: usize,
    webhook_count: usize,
}

fn scripted_answers() -> Vec<FieldMap> {
    [
        json!({ "city": "Austin", "state": "TX", "zip": "78701" }),
        json!({ "timeline": "3-6" }),
        json!({ "annual_income": 118000, "target_price": 425000 }),
        json!({ "down_payment": 42000, "monthly_savings": 1200 }),
        json!({ "credit_range": "good" }),
        json!({ "employment_status": "full_time", "monthly_debts": 350 }),
        json!({ "property_type": "single_family", "bedrooms": 3 }),
        json!({ "loan_type": "fha", "first_time_buyer": true }),
        json!({ "priorities": ["schools", "commute"] }),
    ]
    .into_iter()
    .filter_map(|value| match value {
        serde_json::Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    })
    .collect()
}

fn contact_answers(email: &str) -> FieldMap {
    [
        ("first_name", json!("Ana")),
        ("last_name", json!("García")),
        ("email", json!(email)),
        ("phone", json!("512-555-0100")),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

async fn run_scripted_session(args: &DemoArgs) -> Result<DemoOutcome, AppError> {
    let repository = Arc::new(InMemoryLeadRepository::default());
    let intake = Arc::new(LeadIntakeService::new(
        repository.clone(),
        ValidationEngine::standard(),
    ));
    let primary: Arc<dyn LeadChannel> = if args.simulate_primary_outage {
        Arc::new(UnconfiguredChannel::new(PRIMARY_CHANNEL_NAME))
    } else {
        Arc::new(IntakeLeadChannel::new(intake))
    };
    let webhook = Arc::new(RecordingWebhook::default());
    let storage = Arc::new(MemoryStorage::default());
    let services = in_process_services(primary, webhook.clone(), storage.clone());

    let persistence = PersistenceAdapter::new(storage, "demo-session", services.resume_window);
    let store = WizardStore::new(services.validation.clone(), args.locale);
    let mut controller = WizardController::new(store, persistence, services.autosave_debounce);
    controller.initialize(Utc::now());

    let mut answers = scripted_answers();
    answers.push(contact_answers(&args.email));
    for (index, fields) in answers.into_iter().enumerate() {
        let step = StepId(index as u8 + 1);
        let title = controller
            .store()
            .validation()
            .registry()
            .get(step)
            .map(|descriptor| descriptor.title.get(args.locale))
            .unwrap_or_default();
        controller.record_step(step, fields, Utc::now())?;
        if step == StepId::FIRST && controller.enrich_location(&services.enrichment).await {
            println!("- Step {step}: {title} (census data attached)");
        } else {
            println!("- Step {step}: {title}");
        }

        match controller.next(Utc::now())? {
            StepOutcome::Advanced { .. } | StepOutcome::ReadyToSubmit => {}
            StepOutcome::Blocked { step, validation } => {
                for (field, messages) in &validation.errors {
                    println!("  ! {field}: {}", messages.join("; "));
                }
                println!("  Step {step} is blocked; submission skipped.");
                return Ok(DemoOutcome {
                    status: SubmissionStatus::Failed,
                    report: None,
                    lead: None,
                    intake_count: repository.leads().len(),
                    webhook_count: webhook.received(),
                });
            }
        }
    }

    let status = controller.submit(&services.dispatcher, Utc::now()).await?;
    Ok(DemoOutcome {
        status,
        report: controller.report().cloned(),
        lead: controller.lead_result().cloned(),
        intake_count: repository.leads().len(),
        webhook_count: webhook.received(),
    })
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("CasaReady wizard demo ({})", args.locale.code());
    if args.simulate_primary_outage {
        println!("Primary lead intake is offline for this run.");
    }

    let outcome = run_scripted_session(&args).await?;

    println!("\nSubmission status: {:?}", outcome.status);
    if let Some(report) = &outcome.report {
        println!("\n{}", report.markdown());
    }
    match &outcome.lead {
        Some(lead) => {
            println!("Lead delivery: {} via {}", lead.message, lead.channel.label());
            if let Some(error) = &lead.error {
                println!("  Diagnostic: {error}");
            }
        }
        None => println!("Lead delivery: not attempted"),
    }
    println!(
        "Leads recorded: {} by intake, {} by webhook",
        outcome.intake_count, outcome.webhook_count
    );

    Ok(())
}
