//! Identity document intake: local validation, upload for analysis, and the
//! attempt-limited submission workflow.
//!
//! The verification service is reached through [`VerificationGateway`]; the
//! [`sandbox`] module serves an in-memory stand-in of that service.

pub mod attempts;
pub mod controller;
pub mod domain;
pub mod gateway;
pub mod http;
pub mod sandbox;
pub mod submission;
pub mod upload;
pub mod validation;

#[cfg(test)]
mod tests;

pub use attempts::{AttemptDisplay, AttemptTracker, FormAvailability};
pub use controller::{DocumentReceipt, KycWorkflow, WorkflowEntry, WorkflowPhase};
pub use domain::{
    AdminRecord, AdminView, ApplicantForm, AttemptState, CandidateDocument, DocumentFile,
    Finding, FormError, HistoryRecord, HistoryView, ImageDimensions, KycStatus, MediaType,
    SubmissionIntent, SubmissionMode, UploadSignals, VerificationResult, MAX_ATTEMPTS,
};
pub use gateway::{GatewayError, StatusPayload, SubmissionRequest, VerificationGateway};
pub use http::HttpVerificationGateway;
pub use submission::{SubmissionCoordinator, SubmissionError};
pub use upload::{DocumentSlot, UploadCoordinator, UploadError};
pub use validation::{DocumentPolicy, DocumentValidator, ValidationError};
