use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::kyc::{GatewayError, SubmissionError, UploadError, ValidationError};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Gateway(GatewayError),
    Document(ValidationError),
    Upload(UploadError),
    Submission(SubmissionError),
}

impl AppError {
    /// Text suitable for an end user, without the error chain.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Document(err) => err.user_message(),
            AppError::Upload(err) => err.user_message(),
            AppError::Submission(err) => err.user_message(),
            other => other.to_string(),
        }
    }

    /// Whether the service refused the caller's credentials.
    pub fn requires_authentication(&self) -> bool {
        match self {
            AppError::Gateway(err) => matches!(err, GatewayError::Unauthorized),
            AppError::Upload(err) => matches!(err, UploadError::AuthRequired),
            AppError::Submission(err) => err.requires_authentication(),
            _ => false,
        }
    }

    /// Whether running the same submission again can succeed.
    pub fn retry_permitted(&self) -> bool {
        matches!(self, AppError::Submission(err) if err.retry_permitted())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Gateway(err) => write!(f, "gateway error: {}", err),
            AppError::Document(err) => write!(f, "document rejected: {}", err),
            AppError::Upload(err) => write!(f, "upload error: {}", err),
            AppError::Submission(err) => write!(f, "submission error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Gateway(err) => Some(err),
            AppError::Document(err) => Some(err),
            AppError::Upload(err) => Some(err),
            AppError::Submission(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<GatewayError> for AppError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<ValidationError> for AppError {
    fn from(value: ValidationError) -> Self {
        Self::Document(value)
    }
}

impl From<UploadError> for AppError {
    fn from(value: UploadError) -> Self {
        Self::Upload(value)
    }
}

impl From<SubmissionError> for AppError {
    fn from(value: SubmissionError) -> Self {
        Self::Submission(value)
    }
}
