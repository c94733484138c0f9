use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use super::attempts::{AttemptDisplay, AttemptTracker, FormAvailability};
use super::domain::{
    ApplicantForm, AttemptState, DocumentFile, Finding, ImageDimensions, MediaType,
    SubmissionIntent, SubmissionMode, UploadSignals, VerificationResult,
};
use super::gateway::{GatewayError, VerificationGateway};
use super::submission::{SubmissionCoordinator, SubmissionError};
use super::upload::{DocumentSlot, UploadCoordinator, UploadError};
use super::validation::{DocumentPolicy, DocumentValidator, ValidationError};

/// What the presentation layer needs to render the form on entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowEntry {
    pub state: AttemptState,
    pub mode: SubmissionMode,
    pub attempt_display: Option<AttemptDisplay>,
    pub availability: FormAvailability,
}

/// Acknowledgement of an accepted document selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReceipt {
    pub filename: String,
    pub media_type: MediaType,
    pub byte_len: usize,
    pub dimensions: Option<ImageDimensions>,
    pub message: String,
}

/// Coarse progress of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    AwaitingDocument,
    DocumentReady,
    Uploading,
    ReadyToSubmit,
    Completed,
}

/// Orchestrates validation, upload, and submission for a single run.
pub struct KycWorkflow<G> {
    intent: SubmissionIntent,
    validator: DocumentValidator,
    tracker: AttemptTracker<G>,
    uploads: UploadCoordinator<G>,
    submissions: SubmissionCoordinator<G>,
    outcome: Mutex<Option<VerificationResult>>,
    submitting: AtomicBool,
}

/// Clears the in-flight submission flag when dropped.
struct SubmissionPermit<'a>(&'a AtomicBool);

impl<'a> SubmissionPermit<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SubmissionPermit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<G> KycWorkflow<G>
where
    G: VerificationGateway + 'static,
{
    pub fn new(gateway: Arc<G>, policy: DocumentPolicy, intent: SubmissionIntent) -> Self {
        Self {
            intent,
            validator: DocumentValidator::new(policy),
            tracker: AttemptTracker::new(gateway.clone()),
            uploads: UploadCoordinator::new(gateway.clone()),
            submissions: SubmissionCoordinator::new(gateway),
            outcome: Mutex::new(None),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn intent(&self) -> SubmissionIntent {
        self.intent
    }

    /// Loads the attempt snapshot and derives mode, attempt label, and form availability.
    pub async fn enter(&self) -> Result<WorkflowEntry, GatewayError> {
        let state = self.tracker.current_state().await?;
        let mode = state.resolve_mode(self.intent);
        let entry = WorkflowEntry {
            state,
            mode,
            attempt_display: state.display_attempt(mode),
            availability: state.availability(),
        };

        info!(
            intent = ?self.intent,
            mode = mode.path(),
            open = entry.availability.is_open(),
            "workflow entered"
        );
        Ok(entry)
    }

    /// A new selection always invalidates the previous document, even when it fails.
    pub async fn select_document(
        &self,
        file: DocumentFile,
    ) -> Result<DocumentReceipt, ValidationError> {
        let generation = self.uploads.invalidate();
        let document = match self.validator.validate(file).await {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "document rejected by local validation");
                return Err(err);
            }
        };

        let receipt = DocumentReceipt {
            filename: document.filename().to_string(),
            media_type: document.media_type(),
            byte_len: document.byte_len(),
            dimensions: document.dimensions(),
            message: "File looks valid. Click Upload Document.".to_string(),
        };

        if !self.uploads.stage_if_current(generation, document) {
            warn!(filename = %receipt.filename, "selection superseded before staging");
        }
        Ok(receipt)
    }

    pub async fn upload(&self, declared_name: &str) -> Result<UploadSignals, UploadError> {
        self.uploads.upload(declared_name).await
    }

    /// Findings of the latched upload, if any.
    pub fn findings(&self) -> Vec<Finding> {
        self.uploads
            .latched_signals()
            .map(|signals| signals.findings())
            .unwrap_or_default()
    }

    /// At most one submission per run is in flight; a concurrent call is refused.
    pub async fn submit(
        &self,
        form: &ApplicantForm,
    ) -> Result<VerificationResult, SubmissionError> {
        let Some(_permit) = SubmissionPermit::acquire(&self.submitting) else {
            warn!("submission refused; another submission is in flight");
            return Err(SubmissionError::InFlight);
        };
        if self.result().is_some() {
            return Err(SubmissionError::AlreadySubmitted);
        }

        let signals = self.uploads.latched_signals();
        if signals.is_none() {
            return Err(SubmissionError::UploadRequired);
        }

        let state = self.tracker.current_state().await?;
        if self.intent == SubmissionIntent::Resubmit && state.is_exhausted() {
            warn!(
                attempt = state.attempt_number,
                "resubmission refused locally; attempt cap reached"
            );
            return Err(SubmissionError::MaxAttemptsReached);
        }

        let mode = state.resolve_mode(self.intent);
        let result = self
            .submissions
            .submit(form, signals.as_ref(), mode)
            .await?;

        self.uploads.consume();
        self.tracker.observe(&result);
        *self.outcome.lock().expect("workflow outcome mutex poisoned") = Some(result.clone());
        Ok(result)
    }

    pub fn result(&self) -> Option<VerificationResult> {
        self.outcome
            .lock()
            .expect("workflow outcome mutex poisoned")
            .clone()
    }

    /// Attempt state after the run; re-fetched when the result did not carry a counter.
    pub async fn attempt_state(&self) -> Result<AttemptState, GatewayError> {
        self.tracker.current_state().await
    }

    pub fn phase(&self) -> WorkflowPhase {
        if self.result().is_some() {
            return WorkflowPhase::Completed;
        }
        match self.uploads.slot() {
            DocumentSlot::Empty => WorkflowPhase::AwaitingDocument,
            DocumentSlot::Validated(_) => WorkflowPhase::DocumentReady,
            DocumentSlot::Uploading(_) => WorkflowPhase::Uploading,
            DocumentSlot::Uploaded { .. } => WorkflowPhase::ReadyToSubmit,
        }
    }
}
