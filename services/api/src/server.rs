use crate::cli::ServeArgs;
use crate::infra::{
    load_directory, seeded_directory, AppState, LocalDocumentStore, LoggingNotificationPublisher,
};
use crate::routes::with_hiring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use talent_pipeline::config::AppConfig;
use talent_pipeline::error::AppError;
use talent_pipeline::telemetry;
use talent_pipeline::workflows::hiring::{Collaborators, HiringService, InMemoryHiringStore};
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

    let store = match &config.pipeline.data_path {
        Some(path) => {
            info!(path = %path.display(), "loading hiring snapshot");
            InMemoryHiringStore::open(path)?
        }
        None => {
            warn!("HIRING_DATA_PATH not set; pipeline state lives in memory only");
            InMemoryHiringStore::new()
        }
    };
    let directory = match &config.pipeline.directory_path {
        Some(path) => load_directory(path)?,
        None => seeded_directory(),
    };

    let collaborators = Collaborators::new(
        Arc::new(directory),
        Arc::new(LocalDocumentStore::default()),
    );
    let service = Arc::new(HiringService::new(
        Arc::new(store),
        Arc::new(LoggingNotificationPublisher::default()),
        collaborators,
        config.pipeline.service_settings(),
    ));

    let app = with_hiring_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        decline_policy = ?config.pipeline.decline_policy,
        "talent pipeline ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
