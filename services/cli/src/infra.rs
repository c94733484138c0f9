use crate::cli::ConnectionArgs;
use metrics_exporter_prometheus::PrometheusHandle;
use securekyc::config::AppConfig;
use securekyc::error::AppError;
use securekyc::workflows::kyc::KycStatus;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Loads configuration and applies the command-line connection overrides.
pub(crate) fn client_config(connection: ConnectionArgs) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load()?;
    apply_overrides(&mut config, connection);
    Ok(config)
}

fn apply_overrides(config: &mut AppConfig, connection: ConnectionArgs) {
    if let Some(api_url) = connection.api_url {
        config.api.base_url = api_url;
    }
    if let Some(token) = connection.token {
        let token = token.trim().to_string();
        config.api.token = (!token.is_empty()).then_some(token);
    }
}

/// Declared media type for a document on disk: the explicit value, else a guess from the
/// extension. Unknown extensions fall back to `application/octet-stream`, which the
/// validator rejects.
pub(crate) fn declared_media_type(path: &Path, explicit: Option<&str>) -> String {
    match explicit {
        Some(media_type) => media_type.to_string(),
        None => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

pub(crate) fn parse_status(raw: &str) -> Result<KycStatus, String> {
    KycStatus::parse(raw).ok_or_else(|| {
        format!("unknown status '{raw}' (expected APPROVED, REVIEW, REJECTED or NONE)")
    })
}
