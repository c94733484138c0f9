//! In-memory stand-in for the verification service.
//!
//! Serves the same endpoints the client workflow consumes so the CLI demo and the
//! integration tests can run the real HTTP gateway end to end. Analysis and scoring are
//! deterministic heuristics, not a model of the production service.

pub mod analysis;
pub mod risk;
pub mod router;
pub mod service;
pub mod store;

pub use analysis::{DocumentAnalyzer, HeuristicAnalyzer};
pub use router::sandbox_router;
pub use service::{SandboxError, SandboxService};
pub use store::{
    AccountId, InMemoryKycRepository, KycRecord, KycRecordRepository, RepositoryError,
};
