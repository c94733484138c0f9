use std::collections::BTreeSet;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::analysis::DocumentAnalyzer;
use super::risk;
use super::store::{AccountId, KycRecord, KycRecordRepository, RepositoryError};
use crate::workflows::kyc::domain::{
    AdminView, ApplicantForm, FormError, HistoryView, KycStatus, SubmissionMode, UploadSignals,
    VerificationResult, MAX_ATTEMPTS,
};
use crate::workflows::kyc::gateway::{StatusPayload, SubmissionRequest, MAX_ATTEMPTS_DETAIL};
use crate::workflows::kyc::validation::{DocumentPolicy, ValidationError};

/// Errors surfaced by the sandbox as `{"detail": ...}` bodies.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Admin access required")]
    Forbidden,
    #[error("File is required")]
    MissingFile,
    #[error("Malformed upload: {0}")]
    Multipart(String),
    #[error(transparent)]
    InvalidDocument(#[from] ValidationError),
    #[error(transparent)]
    InvalidForm(#[from] FormError),
    #[error("No rejected KYC record to resubmit")]
    NothingToResubmit,
    #[error("A rejected KYC record exists; use resubmission")]
    ResubmissionRequired,
    #[error("{}", MAX_ATTEMPTS_DETAIL)]
    MaxAttemptsReached,
    #[error("Another submission for this account was recorded first; check status and retry")]
    ConcurrentSubmission,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl IntoResponse for SandboxError {
    fn into_response(self) -> Response {
        let status = match self {
            SandboxError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SandboxError::Forbidden => StatusCode::FORBIDDEN,
            SandboxError::MissingFile | SandboxError::InvalidForm(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SandboxError::ResubmissionRequired | SandboxError::ConcurrentSubmission => {
                StatusCode::CONFLICT
            }
            SandboxError::Repository(_) => StatusCode::SERVICE_UNAVAILABLE,
            SandboxError::Multipart(_)
            | SandboxError::InvalidDocument(_)
            | SandboxError::NothingToResubmit
            | SandboxError::MaxAttemptsReached => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

/// In-memory verification service composing the analyzer, risk rules and record store.
pub struct SandboxService<R, A> {
    repository: Arc<R>,
    analyzer: Arc<A>,
    policy: DocumentPolicy,
    admin_tokens: BTreeSet<String>,
}

impl<R, A> SandboxService<R, A>
where
    R: KycRecordRepository + 'static,
    A: DocumentAnalyzer + 'static,
{
    pub fn new(repository: Arc<R>, analyzer: Arc<A>) -> Self {
        Self {
            repository,
            analyzer,
            policy: DocumentPolicy::default(),
            admin_tokens: BTreeSet::new(),
        }
    }

    pub fn with_admin_tokens(mut self, tokens: impl IntoIterator<Item = String>) -> Self {
        self.admin_tokens.extend(tokens);
        self
    }

    pub fn status(&self, account: &AccountId) -> Result<Option<StatusPayload>, SandboxError> {
        let latest = self.repository.latest(account)?;
        Ok(latest.map(|record| StatusPayload {
            status: Some(record.status),
            attempt_number: Some(record.attempt_number),
        }))
    }

    /// Re-applies the client's envelope checks before analysing the bytes.
    pub fn analyze(
        &self,
        declared_name: &str,
        filename: &str,
        content_type: &str,
        content: &[u8],
    ) -> Result<UploadSignals, SandboxError> {
        let media_type = self
            .policy
            .check_envelope(filename, content_type, content.len())?;
        let signals = self.analyzer.analyze(declared_name, media_type, content);
        info!(
            filename,
            aadhaar_found = signals.aadhaar_found,
            name_found = signals.name_found,
            face_detected = signals.face_detected,
            "sandbox analysed upload"
        );
        Ok(signals)
    }

    pub fn submit(
        &self,
        account: &AccountId,
        mode: SubmissionMode,
        request: SubmissionRequest,
    ) -> Result<VerificationResult, SandboxError> {
        ApplicantForm {
            name: request.name.clone(),
            id_number: request.aadhaar_number.clone(),
            district: request.district.clone(),
            age: request.age,
        }
        .validate()?;

        let existing = self.repository.for_account(account)?;
        let attempt_number = match (mode, existing.last()) {
            (SubmissionMode::Submit, Some(record)) if record.status == KycStatus::Rejected => {
                if record.attempt_number >= MAX_ATTEMPTS {
                    return Err(SandboxError::MaxAttemptsReached);
                }
                return Err(SandboxError::ResubmissionRequired);
            }
            (SubmissionMode::Submit, _) => 1,
            (SubmissionMode::Resubmit, Some(record)) if record.status == KycStatus::Rejected => {
                if record.attempt_number >= MAX_ATTEMPTS {
                    return Err(SandboxError::MaxAttemptsReached);
                }
                record.attempt_number + 1
            }
            (SubmissionMode::Resubmit, _) => return Err(SandboxError::NothingToResubmit),
        };

        let assessment = risk::assess(&request);
        let record = KycRecord {
            account: account.clone(),
            name: request.name,
            aadhaar_number: request.aadhaar_number,
            district: request.district,
            age: request.age,
            risk_score: f64::from(assessment.score),
            status: assessment.status,
            attempt_number,
            reasons: assessment.reasons.clone(),
            submitted_at: Utc::now(),
        };
        self.repository
            .append_if(record, existing.len())
            .map_err(|err| match err {
                RepositoryError::Conflict { expected, found } => {
                    warn!(
                        account = %account.0,
                        expected,
                        found,
                        "concurrent submission lost the race"
                    );
                    SandboxError::ConcurrentSubmission
                }
                other => SandboxError::Repository(other),
            })?;

        info!(
            account = %account.0,
            mode = mode.path(),
            status = assessment.status.label(),
            attempt = attempt_number,
            "sandbox recorded submission"
        );

        Ok(VerificationResult {
            status: assessment.status,
            risk_score: f64::from(assessment.score),
            district_risk: f64::from(assessment.district_risk),
            reasons: assessment.reasons,
            attempt_number: Some(attempt_number),
        })
    }

    pub fn history(&self, account: &AccountId) -> Result<HistoryView, SandboxError> {
        let records = self.repository.for_account(account)?;
        let counts = StatusCounts::tally(records.iter().map(|record| record.status));
        Ok(HistoryView {
            total: counts.total,
            approved: counts.approved,
            review: counts.review,
            rejected: counts.rejected,
            records: records.iter().map(KycRecord::history_row).collect(),
        })
    }

    pub fn all_records(&self, token: &str) -> Result<AdminView, SandboxError> {
        if !self.admin_tokens.contains(token) {
            return Err(SandboxError::Forbidden);
        }
        let records = self.repository.all()?;
        let counts = StatusCounts::tally(records.iter().map(|record| record.status));
        Ok(AdminView {
            total: counts.total,
            approved: counts.approved,
            review: counts.review,
            rejected: counts.rejected,
            records: records.iter().map(KycRecord::admin_row).collect(),
        })
    }
}

#[derive(Default)]
struct StatusCounts {
    total: u32,
    approved: u32,
    review: u32,
    rejected: u32,
}

impl StatusCounts {
    fn tally(statuses: impl Iterator<Item = KycStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.total += 1;
            match status {
                KycStatus::Approved => counts.approved += 1,
                KycStatus::Review => counts.review += 1,
                KycStatus::Rejected => counts.rejected += 1,
                KycStatus::None => {}
            }
        }
        counts
    }
}
