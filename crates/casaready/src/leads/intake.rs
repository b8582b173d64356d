use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::domain::{LeadId, LeadRecord};
use crate::wizard::validation::ValidationEngine;

/// Stored lead with the identifier assigned at intake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredLead {
    pub lead_id: LeadId,
    pub record: LeadRecord,
}

pub trait LeadRepository: Send + Sync {
    fn insert(&self, lead: StoredLead) -> Result<StoredLead, RepositoryError>;
    fn fetch(&self, id: &LeadId) -> Result<Option<StoredLead>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("lead already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("lead failed validation")]
    Invalid(BTreeMap<String, Vec<String>>),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

/// First-party lead intake: validates contact fields with the wizard's terminal
/// step rules, then stores the record.
pub struct LeadIntakeService<R> {
    repository: Arc<R>,
    validation: ValidationEngine,
}

impl<R> LeadIntakeService<R>
where
    R: LeadRepository + 'static,
{
    pub fn new(repository: Arc<R>, validation: ValidationEngine) -> Self {
        Self {
            repository,
            validation,
        }
    }

    pub fn accept(&self, record: LeadRecord) -> Result<StoredLead, IntakeError> {
        let terminal = self.validation.registry().terminal();
        let result = self
            .validation
            .validate(terminal, &record.contact().as_fields(), record.locale);
        if !result.is_valid {
            return Err(IntakeError::Invalid(result.errors));
        }

        let stored = self.repository.insert(StoredLead {
            lead_id: next_lead_id(),
            record,
        })?;
        info!(lead_id = %stored.lead_id.0, source = %stored.record.source, "lead accepted");
        Ok(stored)
    }

    pub fn get(&self, id: &LeadId) -> Result<Option<StoredLead>, IntakeError> {
        Ok(self.repository.fetch(id)?)
    }
}

pub fn lead_intake_router<R>(service: Arc<LeadIntakeService<R>>) -> Router
where
    R: LeadRepository + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(intake_handler::<R>))
        .with_state(service)
}

pub(crate) async fn intake_handler<R>(
    State(service): State<Arc<LeadIntakeService<R>>>,
    axum::Json(record): axum::Json<LeadRecord>,
) -> Response
where
    R: LeadRepository + 'static,
{
    match service.accept(record) {
        Ok(stored) => {
            let payload = json!({
                "lead_id": stored.lead_id.0,
                "status": "accepted",
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(IntakeError::Invalid(errors)) => {
            let payload = json!({
                "error": "lead failed validation",
                "errors": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(IntakeError::Repository(RepositoryError::Conflict)) => {
            let payload = json!({ "error": "lead already exists" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::domain::{FieldMap, Locale};
    use chrono::Utc;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct MemoryLeads {
        leads: Mutex<Vec<StoredLead>>,
    }

    impl LeadRepository for MemoryLeads {
        fn insert(&self, lead: StoredLead) -> Result<StoredLead, RepositoryError> {
            self.leads.lock().expect("lock").push(lead.clone());
            Ok(lead)
        }

        fn fetch(&self, id: &LeadId) -> Result<Option<StoredLead>, RepositoryError> {
            Ok(self
                .leads
                .lock()
                .expect("lock")
                .iter()
                .find(|lead| &lead.lead_id == id)
                .cloned())
        }
    }

    struct DownRepository;

    impl LeadRepository for DownRepository {
        fn insert(&self, _lead: StoredLead) -> Result<StoredLead, RepositoryError> {
            Err(RepositoryError::Unavailable("disk full".to_string()))
        }

        fn fetch(&self, _id: &LeadId) -> Result<Option<StoredLead>, RepositoryError> {
            Err(RepositoryError::Unavailable("disk full".to_string()))
        }
    }

    fn record(email: &str) -> LeadRecord {
        LeadRecord {
            first_name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            email: email.to_string(),
            phone: "512-555-0100".to_string(),
            locale: Locale::En,
            city: Some("Austin".to_string()),
            zip: Some("78701".to_string()),
            timeline: None,
            profile: FieldMap::new(),
            source: "casaready-wizard".to_string(),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn accepted_leads_are_retrievable() {
        let service =
            LeadIntakeService::new(Arc::new(MemoryLeads::default()), ValidationEngine::standard());

        let stored = service.accept(record("a@b.com")).expect("accepted");
        assert!(stored.lead_id.0.starts_with("lead-"));

        let fetched = service.get(&stored.lead_id).expect("fetch");
        assert_eq!(fetched, Some(stored));
    }

    #[test]
    fn invalid_contact_is_rejected_with_field_messages() {
        let service =
            LeadIntakeService::new(Arc::new(MemoryLeads::default()), ValidationEngine::standard());

        match service.accept(record("invalid-email")) {
            Err(IntakeError::Invalid(errors)) => assert!(errors.contains_key("email")),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn route_returns_created() {
        let service = Arc::new(LeadIntakeService::new(
            Arc::new(MemoryLeads::default()),
            ValidationEngine::standard(),
        ));
        let response = lead_intake_router(service)
            .oneshot(
                axum::http::Request::post("/api/v1/leads")
                    .header(axum::http::header::CONTENT_TYPE, "application/json")
                    .body(axum::body::Body::from(
                        serde_json::to_vec(&record("a@b.com")).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn handler_maps_failures_to_status_codes() {
        let invalid = Arc::new(LeadIntakeService::new(
            Arc::new(MemoryLeads::default()),
            ValidationEngine::standard(),
        ));
        let response =
            intake_handler::<MemoryLeads>(State(invalid), axum::Json(record("nope"))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let down = Arc::new(LeadIntakeService::new(
            Arc::new(DownRepository),
            ValidationEngine::standard(),
        ));
        let response =
            intake_handler::<DownRepository>(State(down), axum::Json(record("a@b.com"))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
