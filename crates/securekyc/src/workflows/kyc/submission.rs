use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{ApplicantForm, FormError, SubmissionMode, UploadSignals, VerificationResult};
use super::gateway::{GatewayError, SubmissionRequest, VerificationGateway};

/// Failures of a submission or resubmission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("Please upload your document before submitting.")]
    UploadRequired,
    #[error(transparent)]
    InvalidForm(#[from] FormError),
    #[error(
        "You have reached the maximum number of resubmission attempts. Please contact support."
    )]
    MaxAttemptsReached,
    #[error("Your session has expired. Please log in again.")]
    AuthRequired,
    #[error("Submission failed. Please try again.")]
    Generic { detail: Option<String> },
    #[error("This workflow run already produced a verification result.")]
    AlreadySubmitted,
    #[error("A submission for this run is already in progress.")]
    InFlight,
}

impl SubmissionError {
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Whether re-invoking submit (with the same or a corrected form) can succeed.
    pub fn retry_permitted(&self) -> bool {
        matches!(
            self,
            SubmissionError::UploadRequired
                | SubmissionError::InvalidForm(_)
                | SubmissionError::Generic { .. }
        )
    }

    pub fn requires_authentication(&self) -> bool {
        matches!(self, SubmissionError::AuthRequired)
    }
}

impl From<GatewayError> for SubmissionError {
    fn from(value: GatewayError) -> Self {
        if value.is_max_attempts() {
            return SubmissionError::MaxAttemptsReached;
        }
        match value {
            GatewayError::Unauthorized => SubmissionError::AuthRequired,
            GatewayError::Rejected { detail, .. } => SubmissionError::Generic { detail },
            GatewayError::Transport(detail) | GatewayError::Decode(detail) => {
                SubmissionError::Generic {
                    detail: Some(detail),
                }
            }
        }
    }
}

/// Assembles form and OCR signals and calls the submit or resubmit endpoint.
pub struct SubmissionCoordinator<G> {
    gateway: Arc<G>,
}

impl<G> SubmissionCoordinator<G>
where
    G: VerificationGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// `signals` must come from a latched upload; without them nothing is sent.
    pub async fn submit(
        &self,
        form: &ApplicantForm,
        signals: Option<&UploadSignals>,
        mode: SubmissionMode,
    ) -> Result<VerificationResult, SubmissionError> {
        let signals = signals.ok_or(SubmissionError::UploadRequired)?;
        form.validate()?;

        let request = SubmissionRequest::assemble(form, signals);
        info!(
            mode = mode.path(),
            district = %request.district,
            flags = signals.flags.len(),
            "submitting verification request"
        );

        match self.gateway.submit(mode, &request).await {
            Ok(result) => {
                info!(
                    status = result.status.label(),
                    risk_score = result.risk_score,
                    reasons = result.reasons.len(),
                    "verification result received"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, mode = mode.path(), "verification submission refused");
                Err(SubmissionError::from(err))
            }
        }
    }
}
