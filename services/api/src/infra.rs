use async_trait::async_trait;
use casaready::config::AppConfig;
use casaready::enrichment::{
    EnrichmentClient, EnrichmentService, FixtureCensusProvider, HttpCensusClient,
};
use casaready::error::AppError;
use casaready::leads::{
    ChannelError, HttpLeadChannel, IntakeError, LeadChannel, LeadId, LeadIntakeService,
    LeadRecord, LeadRepository, LeadSubmissionOrchestrator, RepositoryError, StoredLead,
    UnconfiguredChannel,
};
use casaready::report::{HttpReportClient, ReportClient, ReportService, TemplateReportGenerator};
use casaready::wizard::{
    FileStorage, Locale, MemoryStorage, PersistenceAdapter, ResumeSummary, SnapshotStorage,
    SubmissionDispatcher, ValidationEngine, WizardController, WizardError, WizardPhase,
    WizardStore,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

pub(crate) const PRIMARY_CHANNEL_NAME: &str = "casaready-api";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLeadRepository {
    records: Arc<Mutex<HashMap<LeadId, StoredLead>>>,
}

impl LeadRepository for InMemoryLeadRepository {
    fn insert(&self, lead: StoredLead) -> Result<StoredLead, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&lead.lead_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(lead.lead_id.clone(), lead.clone());
        Ok(lead)
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<StoredLead>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

impl InMemoryLeadRepository {
    pub(crate) fn leads(&self) -> Vec<StoredLead> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut leads: Vec<_> = guard.values().cloned().collect();
        leads.sort_by(|a, b| a.lead_id.0.cmp(&b.lead_id.0));
        leads
    }
}

/// Primary channel that hands leads straight to the in-process intake service.
pub(crate) struct IntakeLeadChannel<R> {
    intake: Arc<LeadIntakeService<R>>,
}

impl<R> IntakeLeadChannel<R> {
    pub(crate) fn new(intake: Arc<LeadIntakeService<R>>) -> Self {
        Self { intake }
    }
}

impl<R> fmt::Debug for IntakeLeadChannel<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeLeadChannel").finish_non_exhaustive()
    }
}

#[async_trait]
impl<R> LeadChannel for IntakeLeadChannel<R>
where
    R: LeadRepository + 'static,
{
    fn name(&self) -> &str {
        PRIMARY_CHANNEL_NAME
    }

    async fn deliver(&self, lead: &LeadRecord) -> Result<(), ChannelError> {
        match self.intake.accept(lead.clone()) {
            Ok(_) => Ok(()),
            Err(IntakeError::Invalid(_)) => Err(ChannelError::Status { status: 422 }),
            Err(err) => Err(ChannelError::Transport(err.to_string())),
        }
    }
}

/// Collaborators shared by every wizard session.
#[derive(Clone)]
pub(crate) struct WizardServices {
    pub(crate) validation: ValidationEngine,
    pub(crate) storage: Arc<dyn SnapshotStorage>,
    pub(crate) resume_window: Duration,
    pub(crate) autosave_debounce: Duration,
    pub(crate) dispatcher: SubmissionDispatcher,
    pub(crate) enrichment: EnrichmentService,
    pub(crate) report: ReportService,
}

/// Wire report, census, lead channels and snapshot storage from configuration.
pub(crate) fn build_services(
    config: &AppConfig,
    primary: Option<Arc<dyn LeadChannel>>,
) -> Result<WizardServices, AppError> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("casaready/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let report_client: Arc<dyn ReportClient> = match &config.report.endpoint {
        Some(endpoint) => Arc::new(HttpReportClient::new(http.clone(), endpoint.clone())),
        None => Arc::new(TemplateReportGenerator),
    };
    let census_client: Arc<dyn EnrichmentClient> = match &config.census.endpoint {
        Some(endpoint) => Arc::new(HttpCensusClient::new(http.clone(), endpoint.clone())),
        None => Arc::new(FixtureCensusProvider),
    };

    let leads = &config.leads;
    let primary = primary.unwrap_or_else(|| {
        Arc::new(HttpLeadChannel::new(
            PRIMARY_CHANNEL_NAME,
            http.clone(),
            leads.primary_url.clone(),
        ))
    });
    let fallback: Arc<dyn LeadChannel> = match &leads.fallback_url {
        Some(url) => Arc::new(HttpLeadChannel::new(
            leads.fallback_name.clone(),
            http.clone(),
            url.clone(),
        )),
        None => Arc::new(UnconfiguredChannel::new(leads.fallback_name.clone())),
    };

    let storage: Arc<dyn SnapshotStorage> = match &config.wizard.storage_dir {
        Some(dir) => Arc::new(FileStorage::new(dir.clone())),
        None => Arc::new(MemoryStorage::default()),
    };

    let report = ReportService::new(report_client, config.report.timeout);
    info!(
        report = if config.report.endpoint.is_some() { "http" } else { "template" },
        census = if config.census.endpoint.is_some() { "http" } else { "fixtures" },
        fallback = %leads.fallback_name,
        "wizard collaborators configured"
    );

    Ok(WizardServices {
        validation: ValidationEngine::standard(),
        storage,
        resume_window: config.wizard.resume_window,
        autosave_debounce: config.wizard.autosave_debounce,
        dispatcher: SubmissionDispatcher::new(
            report.clone(),
            LeadSubmissionOrchestrator::new(primary, fallback, leads.timeout),
        ),
        enrichment: EnrichmentService::new(census_client, config.census.timeout),
        report,
    })
}

/// Offline collaborators: template reports, fixture census data and the given channels.
pub(crate) fn in_process_services(
    primary: Arc<dyn LeadChannel>,
    fallback: Arc<dyn LeadChannel>,
    storage: Arc<dyn SnapshotStorage>,
) -> WizardServices {
    let report = ReportService::new(Arc::new(TemplateReportGenerator), Duration::from_secs(5));
    WizardServices {
        validation: ValidationEngine::standard(),
        storage,
        resume_window: Duration::from_secs(72 * 3600),
        autosave_debounce: Duration::ZERO,
        dispatcher: SubmissionDispatcher::new(
            report.clone(),
            LeadSubmissionOrchestrator::new(primary, fallback, Duration::from_secs(5)),
        ),
        enrichment: EnrichmentService::new(Arc::new(FixtureCensusProvider), Duration::from_secs(5)),
        report,
    }
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> String {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("wiz-{id:06}")
}

struct LiveSession {
    controller: WizardController,
    last_touched: DateTime<Utc>,
}

/// Live wizard sessions keyed by id. The lock is never held across an await.
///
/// Completed sessions and sessions idle for longer than the resume window are
/// evicted whenever a session is opened.
pub(crate) struct SessionRegistry {
    sessions: Mutex<HashMap<String, LiveSession>>,
    services: WizardServices,
    idle_limit: Option<chrono::Duration>,
}

impl SessionRegistry {
    pub(crate) fn new(services: WizardServices) -> Self {
        let idle_limit = chrono::Duration::from_std(services.resume_window).ok();
        Self {
            sessions: Mutex::new(HashMap::new()),
            services,
            idle_limit,
        }
    }

    pub(crate) fn services(&self) -> &WizardServices {
        &self.services
    }

    /// Open a session. A live id keeps its in-memory state; an unknown id picks up
    /// its saved progress.
    pub(crate) fn open(
        &self,
        session_id: Option<String>,
        locale: Locale,
    ) -> (String, Option<ResumeSummary>) {
        self.open_at(session_id, locale, Utc::now())
    }

    fn open_at(
        &self,
        session_id: Option<String>,
        locale: Locale,
        now: DateTime<Utc>,
    ) -> (String, Option<ResumeSummary>) {
        let requested = session_id.filter(|id| !id.trim().is_empty());
        {
            let mut guard = self.sessions.lock().expect("session mutex poisoned");
            self.evict_stale(&mut guard, now);
            if let Some(id) = requested.as_deref() {
                if let Some(live) = guard.get_mut(id) {
                    live.last_touched = now;
                    debug!(session_id = %id, "wizard session rejoined");
                    return (id.to_string(), live.controller.resume_summary(now));
                }
            }
        }

        let session_id = requested.unwrap_or_else(next_session_id);
        let persistence = PersistenceAdapter::new(
            self.services.storage.clone(),
            &session_id,
            self.services.resume_window,
        );
        let store = WizardStore::new(self.services.validation.clone(), locale);
        let mut controller =
            WizardController::new(store, persistence, self.services.autosave_debounce);
        controller.initialize(now);

        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        let live = guard.entry(session_id.clone()).or_insert(LiveSession {
            controller,
            last_touched: now,
        });
        let resume = live.controller.resume_summary(now);
        info!(%session_id, resumable = resume.is_some(), "wizard session opened");
        (session_id, resume)
    }

    pub(crate) fn with_session<T>(
        &self,
        session_id: &str,
        action: impl FnOnce(&mut WizardController) -> Result<T, WizardError>,
    ) -> Result<T, WizardError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        let live = guard
            .get_mut(session_id)
            .ok_or_else(|| WizardError::SessionNotFound(session_id.to_string()))?;
        live.last_touched = Utc::now();
        action(&mut live.controller)
    }

    fn evict_stale(&self, sessions: &mut HashMap<String, LiveSession>, now: DateTime<Utc>) {
        let before = sessions.len();
        sessions.retain(|_, live| {
            let idle = self
                .idle_limit
                .is_some_and(|limit| now - live.last_touched > limit);
            live.controller.phase() != WizardPhase::Completed && !idle
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, live = sessions.len(), "evicted wizard sessions");
        }
    }

    #[cfg(test)]
    fn live_count(&self) -> usize {
        self.sessions.lock().expect("session mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casaready::wizard::{FieldMap, StepId, StepOutcome};
    use serde_json::json;

    const WINDOW: Duration = Duration::from_secs(72 * 3600);

    fn registry(autosave_debounce: Duration) -> SessionRegistry {
        let mut services = in_process_services(
            Arc::new(UnconfiguredChannel::new(PRIMARY_CHANNEL_NAME)),
            Arc::new(UnconfiguredChannel::new("zapier")),
            Arc::new(MemoryStorage::default()),
        );
        services.autosave_debounce = autosave_debounce;
        services.resume_window = WINDOW;
        SessionRegistry::new(services)
    }

    fn fields(value: serde_json::Value) -> FieldMap {
        serde_json::from_value(value).expect("field map")
    }

    #[test]
    fn reopening_a_live_session_keeps_unsaved_edits() {
        let sessions = registry(Duration::from_secs(60));
        let (id, _) = sessions.open(None, Locale::En);
        sessions
            .with_session(&id, |controller| {
                let now = Utc::now();
                controller.record_step(
                    StepId(1),
                    fields(json!({ "city": "Austin", "state": "TX", "zip": "78701" })),
                    now,
                )?;
                assert_eq!(controller.next(now)?, StepOutcome::Advanced { step: StepId(2) });
                controller.record_step(StepId(2), fields(json!({ "timeline": "3-6" })), now)
            })
            .expect("edits applied");

        let (reopened, resume) = sessions.open(Some(id.clone()), Locale::Es);
        assert_eq!(reopened, id);
        assert!(resume.is_none());
        sessions
            .with_session(&id, |controller| {
                assert_eq!(controller.store().current_step(), StepId(2));
                let timeline = controller
                    .store()
                    .step_data(StepId(2))
                    .and_then(|slice| slice.get("timeline").cloned());
                assert_eq!(timeline, Some(json!("3-6")));
                Ok(())
            })
            .expect("session still live");
        assert_eq!(sessions.live_count(), 1);
    }

    #[test]
    fn idle_sessions_are_evicted_on_open() {
        let sessions = registry(Duration::ZERO);
        let started = Utc::now();
        let (idle, _) = sessions.open_at(None, Locale::En, started);

        let later = started + chrono::Duration::hours(73);
        let (fresh, _) = sessions.open_at(None, Locale::En, later);

        assert_eq!(sessions.live_count(), 1);
        assert!(matches!(
            sessions.with_session(&idle, |_| Ok(())),
            Err(WizardError::SessionNotFound(_))
        ));
        assert!(sessions.with_session(&fresh, |_| Ok(())).is_ok());
    }

    #[test]
    fn blank_ids_get_a_generated_one() {
        let sessions = registry(Duration::ZERO);
        let (id, resume) = sessions.open(Some("  ".to_string()), Locale::En);
        assert!(id.starts_with("wiz-"));
        assert!(resume.is_none());
    }
}
