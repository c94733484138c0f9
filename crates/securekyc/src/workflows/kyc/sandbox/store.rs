use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::kyc::domain::{AdminRecord, HistoryRecord, KycStatus};

/// Identifies a sandbox account; the bearer token doubles as the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn email(&self) -> String {
        format!("{}@sandbox.local", self.0)
    }
}

/// One stored submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycRecord {
    pub account: AccountId,
    pub name: String,
    pub aadhaar_number: String,
    pub district: String,
    pub age: u32,
    pub risk_score: f64,
    pub status: KycStatus,
    pub attempt_number: u32,
    pub reasons: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

impl KycRecord {
    pub fn history_row(&self) -> HistoryRecord {
        HistoryRecord {
            name: self.name.clone(),
            district: self.district.clone(),
            age: self.age,
            risk_score: Some(self.risk_score),
            status: self.status,
            attempt_number: Some(self.attempt_number),
        }
    }

    pub fn admin_row(&self) -> AdminRecord {
        AdminRecord {
            email: self.account.email(),
            name: self.name.clone(),
            district: self.district.clone(),
            age: self.age,
            risk_score: Some(self.risk_score),
            status: self.status,
            attempt_number: Some(self.attempt_number),
            submission_date: Some(self.submitted_at),
        }
    }
}

/// Storage abstraction so the sandbox handlers can be exercised in isolation.
pub trait KycRecordRepository: Send + Sync {
    /// Appends only while the account still holds `expected_len` records.
    fn append_if(&self, record: KycRecord, expected_len: usize) -> Result<(), RepositoryError>;
    fn latest(&self, account: &AccountId) -> Result<Option<KycRecord>, RepositoryError>;
    fn for_account(&self, account: &AccountId) -> Result<Vec<KycRecord>, RepositoryError>;
    fn all(&self) -> Result<Vec<KycRecord>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("account changed concurrently: expected {expected} records, found {found}")]
    Conflict { expected: usize, found: usize },
}

/// Process-local record store, newest record last per account.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKycRepository {
    records: Arc<Mutex<HashMap<AccountId, Vec<KycRecord>>>>,
}

impl KycRecordRepository for InMemoryKycRepository {
    fn append_if(&self, record: KycRecord, expected_len: usize) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let records = guard.entry(record.account.clone()).or_default();
        if records.len() != expected_len {
            return Err(RepositoryError::Conflict {
                expected: expected_len,
                found: records.len(),
            });
        }
        records.push(record);
        Ok(())
    }

    fn latest(&self, account: &AccountId) -> Result<Option<KycRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .get(account)
            .and_then(|records| records.last())
            .cloned())
    }

    fn for_account(&self, account: &AccountId) -> Result<Vec<KycRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(account).cloned().unwrap_or_default())
    }

    fn all(&self) -> Result<Vec<KycRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<KycRecord> = guard.values().flatten().cloned().collect();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(records)
    }
}
