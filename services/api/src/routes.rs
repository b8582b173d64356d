use crate::infra::{AppState, SessionRegistry};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use casaready::enrichment::CensusInsights;
use casaready::error::AppError;
use casaready::leads::{lead_intake_router, LeadIntakeService, LeadRepository};
use casaready::report::{ReportAccumulator, ReportError, ReportEvent, ReportRequest};
use casaready::wizard::{
    ContactInfo, FieldMap, Locale, ResumeSummary, StepId, StepOutcome, SubmissionStatus,
    WizardController, WizardError, WizardPhase,
};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OpenSessionRequest {
    /// Id of an earlier session whose saved progress should be offered.
    #[serde(default)]
    pub(crate) session_id: Option<String>,
    #[serde(default)]
    pub(crate) locale: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusRequest {
    pub(crate) city: String,
    #[serde(default)]
    pub(crate) state: Option<String>,
    #[serde(default)]
    pub(crate) locale: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionView {
    pub(crate) session_id: String,
    pub(crate) phase: WizardPhase,
    pub(crate) current_step: StepId,
    pub(crate) total_steps: u8,
    pub(crate) progress: u8,
    pub(crate) step_title: Option<&'static str>,
    pub(crate) step_description: Option<&'static str>,
    pub(crate) completed_steps: Vec<StepId>,
    pub(crate) furthest_reachable_step: StepId,
    pub(crate) locale: Locale,
    pub(crate) step_data: BTreeMap<StepId, FieldMap>,
    pub(crate) contact_info: ContactInfo,
    pub(crate) census_data: Option<CensusInsights>,
    pub(crate) is_transitioning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_error: Option<String>,
}

impl SessionView {
    pub(crate) fn capture(session_id: &str, controller: &WizardController) -> Self {
        let store = controller.store();
        let session = store.session();
        let locale = store.locale();
        let descriptor = store.validation().registry().get(store.current_step());

        Self {
            session_id: session_id.to_string(),
            phase: controller.phase(),
            current_step: store.current_step(),
            total_steps: store.total_steps(),
            progress: store.progress(),
            step_title: descriptor.map(|step| step.title.get(locale)),
            step_description: descriptor.map(|step| step.description.get(locale)),
            completed_steps: store.completed_steps().iter().copied().collect(),
            furthest_reachable_step: store.furthest_reachable_step(),
            locale,
            step_data: session.step_data.clone(),
            contact_info: session.contact_info.clone(),
            census_data: session.census_data.clone(),
            is_transitioning: session.is_transitioning,
            last_error: controller.last_error().map(str::to_string),
        }
    }
}

pub(crate) fn with_wizard_routes<R>(
    sessions: Arc<SessionRegistry>,
    intake: Arc<LeadIntakeService<R>>,
) -> Router
where
    R: LeadRepository + 'static,
{
    lead_intake_router(intake)
        .merge(wizard_router(sessions))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

fn wizard_router(sessions: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/api/v1/wizard/sessions", post(open_session))
        .route("/api/v1/wizard/sessions/:session_id", get(session_status))
        .route(
            "/api/v1/wizard/sessions/:session_id/steps/:step",
            put(submit_step),
        )
        .route("/api/v1/wizard/sessions/:session_id/back", post(go_back))
        .route("/api/v1/wizard/sessions/:session_id/submit", post(submit_wizard))
        .route("/api/v1/wizard/sessions/:session_id/reset", post(reset_session))
        .route(
            "/api/v1/wizard/sessions/:session_id/resume",
            get(resume_prompt).post(accept_resume),
        )
        .route("/api/v1/census", post(census_lookup))
        .route("/api/v1/report", post(generate_report))
        .with_state(sessions)
}

/// Explicit locale first, then the `locale` cookie, then English.
fn request_locale(explicit: Option<&str>, headers: &HeaderMap) -> Locale {
    explicit
        .and_then(Locale::parse)
        .or_else(|| {
            headers
                .get(header::COOKIE)
                .and_then(|value| value.to_str().ok())
                .and_then(Locale::from_cookie_header)
        })
        .unwrap_or_default()
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(
    Extension(state): Extension<AppState>,
) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(
    Extension(state): Extension<AppState>,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn open_session(
    State(sessions): State<Arc<SessionRegistry>>,
    headers: HeaderMap,
    body: Option<Json<OpenSessionRequest>>,
) -> Result<Response, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let locale = request_locale(request.locale.as_deref(), &headers);
    let (session_id, resume) = sessions.open(request.session_id, locale);
    let view = sessions.with_session(&session_id, |controller| {
        Ok(SessionView::capture(&session_id, controller))
    })?;

    let payload = json!({ "session": view, "resume": resume });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn session_status(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let view = sessions.with_session(&session_id, |controller| {
        Ok(SessionView::capture(&session_id, controller))
    })?;
    Ok(Json(view))
}

/// Merge the step's answers, validate, and advance on success. Editing an earlier
/// step first navigates back to it.
pub(crate) async fn submit_step(
    State(sessions): State<Arc<SessionRegistry>>,
    Path((session_id, step)): Path<(String, u8)>,
    Json(fields): Json<FieldMap>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let step = StepId(step);
    let (outcome, enrichment) = sessions.with_session(&session_id, |controller| {
        if controller.store().current_step() != step {
            controller.jump_to(step, now)?;
        }
        controller.record_step(step, fields, now)?;
        let enrichment = if step == StepId::FIRST {
            controller.enrichment_request()
        } else {
            None
        };
        Ok((controller.next(now)?, enrichment))
    })?;

    if let Some(ticket) = enrichment {
        let response = sessions
            .services()
            .enrichment
            .lookup(&ticket.city, ticket.state.as_deref(), ticket.locale)
            .await;
        sessions.with_session(&session_id, |controller| {
            Ok(controller.apply_enrichment(&ticket, response))
        })?;
    }

    let view = sessions.with_session(&session_id, |controller| {
        Ok(SessionView::capture(&session_id, controller))
    })?;
    let status = match outcome {
        StepOutcome::Blocked { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StepOutcome::Advanced { .. } | StepOutcome::ReadyToSubmit => StatusCode::OK,
    };
    let payload = json!({ "result": outcome, "session": view });
    Ok((status, Json(payload)).into_response())
}

pub(crate) async fn go_back(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let view = sessions.with_session(&session_id, |controller| {
        controller.back(Utc::now())?;
        Ok(SessionView::capture(&session_id, controller))
    })?;
    Ok(Json(view))
}

pub(crate) async fn reset_session(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let view = sessions.with_session(&session_id, |controller| {
        controller.start_fresh();
        Ok(SessionView::capture(&session_id, controller))
    })?;
    Ok(Json(view))
}

pub(crate) async fn resume_prompt(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<Response, AppError> {
    let summary: Option<ResumeSummary> = sessions.with_session(&session_id, |controller| {
        Ok(controller.resume_summary(Utc::now()))
    })?;

    Ok(match summary {
        Some(summary) => (StatusCode::OK, Json(json!(summary))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no saved progress" })),
        )
            .into_response(),
    })
}

pub(crate) async fn accept_resume(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let view = sessions.with_session(&session_id, |controller| {
        controller.resume()?;
        Ok(SessionView::capture(&session_id, controller))
    })?;
    Ok(Json(view))
}

/// Run the terminal submission. The session lock is released while the report and
/// lead calls are in flight.
pub(crate) async fn submit_wizard(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    let ticket = match sessions.with_session(&session_id, |controller| {
        controller.begin_submission(Utc::now())
    }) {
        Ok(ticket) => ticket,
        Err(WizardError::ValidationFailed { step, result }) => {
            let payload = json!({
                "error": format!("step {step} failed validation"),
                "step": step,
                "errors": result.errors,
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
        Err(other) => return AppError::from(other).into_response(),
    };

    let outcome = sessions.services().dispatcher.dispatch(&ticket).await;

    let applied = sessions.with_session(&session_id, |controller| {
        let status = controller.apply_submission(&ticket, outcome);
        Ok((
            status,
            controller.report().cloned(),
            controller.lead_result().cloned(),
            SessionView::capture(&session_id, controller),
        ))
    });

    match applied {
        Ok((status, report, lead, view)) => {
            let code = match status {
                SubmissionStatus::Completed => StatusCode::OK,
                SubmissionStatus::Failed => StatusCode::BAD_GATEWAY,
                SubmissionStatus::Discarded => StatusCode::CONFLICT,
            };
            let markdown = report.as_ref().map(|report| report.markdown());
            let payload = json!({
                "status": status,
                "report": report,
                "markdown": markdown,
                "lead": lead,
                "session": view,
            });
            (code, Json(payload)).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

pub(crate) async fn census_lookup(
    State(sessions): State<Arc<SessionRegistry>>,
    headers: HeaderMap,
    Json(request): Json<CensusRequest>,
) -> Response {
    let locale = request_locale(request.locale.as_deref(), &headers);
    let response = sessions
        .services()
        .enrichment
        .lookup(&request.city, request.state.as_deref(), locale)
        .await;
    (StatusCode::OK, Json(response)).into_response()
}

/// Build a report through the chunked stream; `chunks` counts the markdown fragments.
pub(crate) async fn generate_report(
    State(sessions): State<Arc<SessionRegistry>>,
    Json(request): Json<ReportRequest>,
) -> Response {
    let mut events = sessions.services().report.stream(request);
    let mut accumulator = ReportAccumulator::default();
    let mut chunks = 0usize;

    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                if matches!(event, ReportEvent::Chunk(_)) {
                    chunks += 1;
                }
                if accumulator.apply(event) {
                    break;
                }
            }
            Err(ReportError::InsufficientData) => {
                let payload = json!({ "error": ReportError::InsufficientData.to_string() });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
            }
            Err(err) => {
                let payload = json!({ "error": err.to_string() });
                return (StatusCode::BAD_GATEWAY, Json(payload)).into_response();
            }
        }
    }

    let payload = json!({
        "markdown": accumulator.text(),
        "chunks": chunks,
        "report": accumulator.summary(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}
