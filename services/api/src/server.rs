use crate::cli::ServeArgs;
use crate::infra::{
    build_services, AppState, InMemoryLeadRepository, IntakeLeadChannel, SessionRegistry,
};
use crate::routes::with_wizard_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use casaready::config::AppConfig;
use casaready::error::AppError;
use casaready::leads::{LeadChannel, LeadIntakeService};
use casaready::telemetry;
use casaready::wizard::ValidationEngine;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryLeadRepository::default());
    let intake = Arc::new(LeadIntakeService::new(
        repository,
        ValidationEngine::standard(),
    ));

    // Without an explicit primary URL the wizard delivers to this process's own intake.
    let primary: Option<Arc<dyn LeadChannel>> = if config.leads.primary_is_local {
        Some(Arc::new(IntakeLeadChannel::new(intake.clone())))
    } else {
        None
    };
    let services = build_services(&config, primary)?;
    let sessions = Arc::new(SessionRegistry::new(services));

    let app = with_wizard_routes(sessions, intake)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "casaready wizard service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
