use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::domain::{CandidateDocument, UploadSignals};
use super::gateway::{GatewayError, VerificationGateway};

/// Where the single document of a workflow run currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DocumentSlot {
    #[default]
    Empty,
    Validated(CandidateDocument),
    Uploading(CandidateDocument),
    Uploaded {
        document: CandidateDocument,
        signals: UploadSignals,
    },
}

impl DocumentSlot {
    pub const fn label(&self) -> &'static str {
        match self {
            DocumentSlot::Empty => "empty",
            DocumentSlot::Validated(_) => "validated",
            DocumentSlot::Uploading(_) => "uploading",
            DocumentSlot::Uploaded { .. } => "uploaded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("Please select a valid file first.")]
    NoDocument,
    #[error("An upload for this document is already in progress.")]
    InFlight,
    #[error("A newer document was selected while this upload was in progress.")]
    Superseded,
    #[error("{reason}")]
    Rejected { reason: String },
    #[error("Authentication required. Please log in again.")]
    AuthRequired,
    #[error("Upload failed: verification service unavailable ({0}).")]
    Unavailable(String),
}

impl UploadError {
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<GatewayError> for UploadError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::Unauthorized => UploadError::AuthRequired,
            GatewayError::Rejected { detail, .. } => UploadError::Rejected {
                reason: detail.unwrap_or_else(|| "Upload failed".to_string()),
            },
            GatewayError::Transport(message) | GatewayError::Decode(message) => {
                UploadError::Unavailable(message)
            }
        }
    }
}

struct SlotState {
    generation: u64,
    slot: DocumentSlot,
}

/// Sends the staged document for analysis and latches the returned signals.
pub struct UploadCoordinator<G> {
    gateway: Arc<G>,
    state: Mutex<SlotState>,
}

impl<G> UploadCoordinator<G>
where
    G: VerificationGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            state: Mutex::new(SlotState {
                generation: 0,
                slot: DocumentSlot::Empty,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().expect("document slot mutex poisoned")
    }

    /// Drops whatever is held and starts a new selection. Returns the selection's generation.
    pub fn invalidate(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.slot = DocumentSlot::Empty;
        state.generation
    }

    /// Replaces the held document with a freshly validated one.
    pub fn stage(&self, document: CandidateDocument) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.slot = DocumentSlot::Validated(document);
        state.generation
    }

    /// Stages the document only if no newer selection started after `generation`.
    pub fn stage_if_current(&self, generation: u64, document: CandidateDocument) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.slot = DocumentSlot::Validated(document);
        true
    }

    pub fn slot(&self) -> DocumentSlot {
        self.lock().slot.clone()
    }

    /// Signals of a latched upload; `None` in every other state.
    pub fn latched_signals(&self) -> Option<UploadSignals> {
        match &self.lock().slot {
            DocumentSlot::Uploaded { signals, .. } => Some(signals.clone()),
            _ => None,
        }
    }

    /// Empties a latched slot once its signals have been used by a submission.
    pub fn consume(&self) -> Option<UploadSignals> {
        let mut state = self.lock();
        match std::mem::take(&mut state.slot) {
            DocumentSlot::Uploaded { signals, .. } => Some(signals),
            other => {
                state.slot = other;
                None
            }
        }
    }

    pub async fn upload(&self, declared_name: &str) -> Result<UploadSignals, UploadError> {
        let (generation, document) = {
            let mut state = self.lock();
            let generation = state.generation;
            match std::mem::take(&mut state.slot) {
                DocumentSlot::Empty => return Err(UploadError::NoDocument),
                DocumentSlot::Uploading(document) => {
                    state.slot = DocumentSlot::Uploading(document);
                    return Err(UploadError::InFlight);
                }
                DocumentSlot::Uploaded { document, signals } => {
                    state.slot = DocumentSlot::Uploaded {
                        document,
                        signals: signals.clone(),
                    };
                    return Ok(signals);
                }
                DocumentSlot::Validated(document) => {
                    state.slot = DocumentSlot::Uploading(document.clone());
                    (generation, document)
                }
            }
        };

        info!(
            filename = document.filename(),
            bytes = document.byte_len(),
            media_type = document.media_type().label(),
            "uploading document for analysis"
        );
        let outcome = self.gateway.upload_document(&document, declared_name).await;

        let mut state = self.lock();
        if state.generation != generation {
            warn!(
                filename = document.filename(),
                "discarding upload result for superseded document"
            );
            return Err(UploadError::Superseded);
        }

        match outcome {
            Ok(signals) => {
                info!(
                    aadhaar_found = signals.aadhaar_found,
                    name_found = signals.name_found,
                    face_detected = signals.face_detected,
                    flags = signals.flags.len(),
                    "document upload latched"
                );
                state.slot = DocumentSlot::Uploaded {
                    document,
                    signals: signals.clone(),
                };
                Ok(signals)
            }
            Err(err) => {
                warn!(error = %err, "document upload rejected");
                state.slot = DocumentSlot::Validated(document);
                Err(UploadError::from(err))
            }
        }
    }
}
