use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryCatalog, InMemoryLogRepository, InMemoryRuleRepository, InMemorySettings,
};
use crate::routes::with_production_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use shopfloor::config::AppConfig;
use shopfloor::error::AppError;
use shopfloor::production::{DigestCredentialStore, ProductionService};
use shopfloor::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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

    let verifier = DigestCredentialStore::from_config(&config.auth);
    if config.auth.admin_secret.is_none() {
        warn!("APP_ADMIN_SECRET is not set; administrative endpoints will reject every request");
    }

    let production_service = Arc::new(ProductionService::new(
        Arc::new(InMemoryRuleRepository::default()),
        Arc::new(InMemoryLogRepository::default()),
        Arc::new(InMemorySettings::default()),
        Arc::new(InMemoryCatalog::default()),
        Arc::new(verifier),
        config.production.clone(),
    ));

    let app = with_production_routes(production_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        daily_target = config.production.daily_target,
        "shop-floor production service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
