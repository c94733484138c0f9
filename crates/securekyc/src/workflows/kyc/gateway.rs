use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{
    AdminView, ApplicantForm, AttemptState, CandidateDocument, HistoryView, KycStatus,
    SubmissionMode, UploadSignals, VerificationResult,
};

/// Detail string the service uses when the resubmission cap has been hit.
pub const MAX_ATTEMPTS_DETAIL: &str = "Maximum resubmission attempts reached";

/// Boundary to the external verification service so the workflow can be exercised in
/// isolation.
#[async_trait]
pub trait VerificationGateway: Send + Sync {
    /// `Ok(None)` when the account has no prior verification record.
    async fn attempt_status(&self) -> Result<Option<StatusPayload>, GatewayError>;

    async fn upload_document(
        &self,
        document: &CandidateDocument,
        declared_name: &str,
    ) -> Result<UploadSignals, GatewayError>;

    async fn submit(
        &self,
        mode: SubmissionMode,
        request: &SubmissionRequest,
    ) -> Result<VerificationResult, GatewayError>;

    async fn history(&self) -> Result<HistoryView, GatewayError>;

    async fn all_records(&self) -> Result<AdminView, GatewayError>;
}

/// Body of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub status: Option<KycStatus>,
    #[serde(default)]
    pub attempt_number: Option<u32>,
}

impl StatusPayload {
    pub fn into_state(self) -> AttemptState {
        match self.status {
            None => AttemptState::none(),
            Some(status) => AttemptState::observed(status, self.attempt_number.unwrap_or(0)),
        }
    }
}

/// Query parameters shared by the submit and resubmit endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub name: String,
    pub aadhaar_number: String,
    pub district: String,
    pub age: u32,
    pub ocr_aadhaar_found: bool,
    pub ocr_name_found: bool,
    pub face_detected: bool,
    #[serde(default)]
    pub ocr_flags: String,
}

impl SubmissionRequest {
    pub fn assemble(form: &ApplicantForm, signals: &UploadSignals) -> Self {
        Self {
            name: form.name.trim().to_string(),
            aadhaar_number: form.id_number.clone(),
            district: form.district.trim().to_string(),
            age: form.age,
            ocr_aadhaar_found: signals.aadhaar_found,
            ocr_name_found: signals.name_found,
            face_detected: signals.face_detected,
            ocr_flags: signals.joined_flags(),
        }
    }
}

/// Error body returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("authentication required")]
    Unauthorized,
    #[error(
        "service rejected the request ({status}): {}",
        .detail.as_deref().unwrap_or("no detail")
    )]
    Rejected { status: u16, detail: Option<String> },
    #[error("verification service unreachable: {0}")]
    Transport(String),
    #[error("unexpected response from verification service: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn detail(&self) -> Option<&str> {
        match self {
            GatewayError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn is_max_attempts(&self) -> bool {
        self.detail() == Some(MAX_ATTEMPTS_DETAIL)
    }
}
