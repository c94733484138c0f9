use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_sandbox_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use securekyc::config::AppConfig;
use securekyc::error::AppError;
use securekyc::telemetry;
use securekyc::workflows::kyc::sandbox::{HeuristicAnalyzer, InMemoryKycRepository, SandboxService};
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

    let admin_count = config.server.admin_tokens.len();
    let service = Arc::new(
        SandboxService::new(
            Arc::new(InMemoryKycRepository::default()),
            Arc::new(HeuristicAnalyzer),
        )
        .with_admin_tokens(config.server.admin_tokens.iter().cloned()),
    );

    let app = with_sandbox_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, admin_tokens = admin_count, "verification sandbox ready");

    axum::serve(listener, app).await?;
    Ok(())
}
