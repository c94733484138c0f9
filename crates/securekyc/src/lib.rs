//! Identity document intake and verification-submission workflow.
//!
//! The [`workflows::kyc`] module holds the client-side pipeline (validation, upload,
//! submission, attempt tracking) together with an in-memory sandbox of the verification
//! service so the workflow can be exercised end to end.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
