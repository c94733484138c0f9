use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info};

use super::domain::{
    AttemptState, KycStatus, SubmissionIntent, SubmissionMode, VerificationResult, MAX_ATTEMPTS,
};
use super::gateway::{GatewayError, VerificationGateway};

impl AttemptState {
    pub const fn none() -> Self {
        Self {
            status: KycStatus::None,
            attempt_number: 0,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// A rejection always counts as at least one attempt and the counter never exceeds the cap.
    pub fn observed(status: KycStatus, attempt_number: u32) -> Self {
        let attempt_number = match status {
            KycStatus::Rejected => attempt_number.max(1),
            _ => attempt_number,
        }
        .min(MAX_ATTEMPTS);

        Self {
            status,
            attempt_number,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn resubmission_available(&self) -> bool {
        self.status == KycStatus::Rejected && self.attempt_number < self.max_attempts
    }

    /// Rejected with every attempt used up. No further submission is accepted.
    pub fn is_exhausted(&self) -> bool {
        self.status == KycStatus::Rejected && self.attempt_number >= self.max_attempts
    }

    pub fn resolve_mode(&self, intent: SubmissionIntent) -> SubmissionMode {
        if intent == SubmissionIntent::Resubmit && self.resubmission_available() {
            SubmissionMode::Resubmit
        } else {
            SubmissionMode::Submit
        }
    }

    /// Advisory attempt number for display. The service keeps the authoritative count.
    pub fn display_attempt(&self, mode: SubmissionMode) -> Option<AttemptDisplay> {
        if self.status != KycStatus::Rejected {
            return None;
        }

        let bump = u32::from(mode == SubmissionMode::Resubmit);
        Some(AttemptDisplay {
            current: self.attempt_number.saturating_add(bump).min(self.max_attempts),
            max: self.max_attempts,
        })
    }

    pub fn availability(&self) -> FormAvailability {
        if self.is_exhausted() {
            FormAvailability::Closed {
                reason: "Maximum resubmission attempts reached. Please contact support."
                    .to_string(),
            }
        } else {
            FormAvailability::Open
        }
    }
}

/// "Attempt n of m" label shown next to the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptDisplay {
    pub current: u32,
    pub max: u32,
}

impl fmt::Display for AttemptDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attempt {} of {}", self.current, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FormAvailability {
    Open,
    Closed { reason: String },
}

impl FormAvailability {
    pub fn is_open(&self) -> bool {
        matches!(self, FormAvailability::Open)
    }
}

/// Caches the service's attempt snapshot for one workflow run.
pub struct AttemptTracker<G> {
    gateway: Arc<G>,
    snapshot: Mutex<Option<AttemptState>>,
}

impl<G> AttemptTracker<G>
where
    G: VerificationGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            snapshot: Mutex::new(None),
        }
    }

    /// Fetched once, then served from the cached snapshot until refreshed or invalidated.
    pub async fn current_state(&self) -> Result<AttemptState, GatewayError> {
        match self.cached() {
            Some(state) => Ok(state),
            None => self.refresh().await,
        }
    }

    pub async fn refresh(&self) -> Result<AttemptState, GatewayError> {
        let state = self
            .gateway
            .attempt_status()
            .await?
            .map(|payload| payload.into_state())
            .unwrap_or_else(AttemptState::none);

        info!(
            status = state.status.label(),
            attempt = state.attempt_number,
            "attempt state fetched"
        );
        *self.snapshot.lock().expect("attempt snapshot mutex poisoned") = Some(state);
        Ok(state)
    }

    /// Adopts the server-confirmed counter from a result, or drops the snapshot so the next
    /// read goes back to the service.
    pub fn observe(&self, result: &VerificationResult) {
        let mut snapshot = self.snapshot.lock().expect("attempt snapshot mutex poisoned");
        match result.attempt_number {
            Some(attempt) => {
                *snapshot = Some(AttemptState::observed(result.status, attempt));
            }
            None => {
                debug!("result carried no attempt number; snapshot invalidated");
                *snapshot = None;
            }
        }
    }

    /// The last snapshot, without touching the network.
    pub fn cached(&self) -> Option<AttemptState> {
        *self.snapshot.lock().expect("attempt snapshot mutex poisoned")
    }
}
