use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Number of attempts a rejected account may use before the rejection becomes final.
pub const MAX_ATTEMPTS: u32 = 3;

/// Document formats accepted for identity verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Jpeg,
    Png,
    Pdf,
}

impl MediaType {
    /// Exact, case-sensitive match against the declared type. `image/jpg` is accepted as an
    /// alias because browsers and scanners still emit it.
    pub fn from_declared(declared: &str) -> Option<Self> {
        if declared == mime::IMAGE_JPEG.essence_str() || declared == "image/jpg" {
            Some(Self::Jpeg)
        } else if declared == mime::IMAGE_PNG.essence_str() {
            Some(Self::Png)
        } else if declared == mime::APPLICATION_PDF.essence_str() {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    pub const fn is_image(self) -> bool {
        matches!(self, MediaType::Jpeg | MediaType::Png)
    }

    pub const fn label(self) -> &'static str {
        match self {
            MediaType::Jpeg => "JPEG",
            MediaType::Png => "PNG",
            MediaType::Pdf => "PDF",
        }
    }
}

/// Pixel size reported by the image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Raw file as handed over by a picker or the command line, before any checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub filename: String,
    pub media_type: String,
    pub content: Vec<u8>,
}

impl DocumentFile {
    pub fn new(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            content,
        }
    }
}

/// A document that passed local validation. Only the validator constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDocument {
    filename: String,
    declared_type: String,
    media_type: MediaType,
    content: Vec<u8>,
    dimensions: Option<ImageDimensions>,
}

impl CandidateDocument {
    pub(crate) fn new(
        file: DocumentFile,
        media_type: MediaType,
        dimensions: Option<ImageDimensions>,
    ) -> Self {
        Self {
            filename: file.filename,
            declared_type: file.media_type,
            media_type,
            content: file.content,
            dimensions,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The media type string exactly as declared by the source.
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn byte_len(&self) -> usize {
        self.content.len()
    }

    pub fn dimensions(&self) -> Option<ImageDimensions> {
        self.dimensions
    }
}

/// Findings returned by the document-analysis endpoint for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSignals {
    #[serde(default)]
    pub message: String,
    pub aadhaar_found: bool,
    pub name_found: bool,
    pub face_detected: bool,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// One human-readable line derived from [`UploadSignals`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub passed: bool,
    pub message: String,
}

impl Finding {
    fn check(passed: bool, ok: &str, failed: &str) -> Self {
        Self {
            passed,
            message: if passed { ok } else { failed }.to_string(),
        }
    }
}

impl UploadSignals {
    pub fn findings(&self) -> Vec<Finding> {
        let mut findings = vec![
            Finding::check(
                self.aadhaar_found,
                "Aadhaar number detected in document",
                "No Aadhaar number detected in document",
            ),
            Finding::check(
                self.name_found,
                "Name found in document",
                "Name mismatch between form and document",
            ),
            Finding::check(
                self.face_detected,
                "Face detected in document (looks like a valid ID photo)",
                "No face detected, document may not be a valid ID",
            ),
        ];
        findings.extend(self.flags.iter().map(|flag| Finding {
            passed: false,
            message: flag.clone(),
        }));
        findings
    }

    /// Flags in the single-field form the submission endpoints expect.
    pub fn joined_flags(&self) -> String {
        self.flags.join("; ")
    }
}

/// Applicant details entered alongside the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantForm {
    pub name: String,
    pub id_number: String,
    pub district: String,
    pub age: u32,
}

pub const ID_NUMBER_LEN: usize = 12;
const MIN_NAME_LEN: usize = 3;

impl ApplicantForm {
    /// Shallow checks only; the verification service owns deep validation.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.name.trim().chars().count() < MIN_NAME_LEN {
            return Err(FormError::NameTooShort);
        }
        if self.id_number.len() != ID_NUMBER_LEN
            || !self.id_number.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(FormError::InvalidIdNumber);
        }
        if self.district.trim().is_empty() {
            return Err(FormError::MissingDistrict);
        }
        if self.age == 0 {
            return Err(FormError::InvalidAge);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Full name must be at least 3 characters.")]
    NameTooShort,
    #[error("Aadhaar number must be exactly 12 digits.")]
    InvalidIdNumber,
    #[error("District is required.")]
    MissingDistrict,
    #[error("Age must be a positive number.")]
    InvalidAge,
}

/// Verification status as reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KycStatus {
    #[default]
    None,
    Approved,
    Review,
    Rejected,
}

impl KycStatus {
    pub const fn label(self) -> &'static str {
        match self {
            KycStatus::None => "NONE",
            KycStatus::Approved => "APPROVED",
            KycStatus::Review => "REVIEW",
            KycStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NONE" => Some(KycStatus::None),
            "APPROVED" => Some(KycStatus::Approved),
            "REVIEW" => Some(KycStatus::Review),
            "REJECTED" => Some(KycStatus::Rejected),
            _ => None,
        }
    }
}

/// Read-only snapshot of the service-owned attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptState {
    pub status: KycStatus,
    pub attempt_number: u32,
    pub max_attempts: u32,
}

/// What the caller wants to do; the tracker decides what is actually possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionIntent {
    FirstSubmission,
    Resubmit,
}

/// Endpoint family used for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    Submit,
    Resubmit,
}

impl SubmissionMode {
    pub const fn path(self) -> &'static str {
        match self {
            SubmissionMode::Submit => "/kyc/submit",
            SubmissionMode::Resubmit => "/kyc/resubmit",
        }
    }
}

/// Terminal artifact of a submission or resubmission call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    #[serde(rename = "verification_status", alias = "status")]
    pub status: KycStatus,
    #[serde(default)]
    pub risk_score: f64,
    #[serde(rename = "uidai_district_risk", alias = "district_risk", default)]
    pub district_risk: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_number: Option<u32>,
}

impl VerificationResult {
    pub fn summary(&self) -> String {
        let decision = match self.status {
            KycStatus::Approved => "verification approved",
            KycStatus::Review => "verification under manual review",
            KycStatus::Rejected => "verification rejected",
            KycStatus::None => "verification pending",
        };
        if self.reasons.is_empty() {
            format!("{decision} (risk score {})", self.risk_score)
        } else {
            format!(
                "{decision} (risk score {}): {}",
                self.risk_score,
                self.reasons.join("; ")
            )
        }
    }
}

/// Row of the per-account submission history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub name: String,
    pub district: String,
    pub age: u32,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub status: KycStatus,
    #[serde(default)]
    pub attempt_number: Option<u32>,
}

/// Aggregate returned by the history endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryView {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub approved: u32,
    #[serde(default)]
    pub review: u32,
    #[serde(default)]
    pub rejected: u32,
    #[serde(default)]
    pub records: Vec<HistoryRecord>,
}

/// Row of the cross-account administrative view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub email: String,
    pub name: String,
    pub district: String,
    pub age: u32,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub status: KycStatus,
    #[serde(default)]
    pub attempt_number: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub submission_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminView {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub approved: u32,
    #[serde(default)]
    pub review: u32,
    #[serde(default)]
    pub rejected: u32,
    #[serde(default)]
    pub records: Vec<AdminRecord>,
}

impl AdminView {
    /// `None` keeps every record.
    pub fn records_with_status(&self, status: Option<KycStatus>) -> Vec<&AdminRecord> {
        self.records
            .iter()
            .filter(|record| status.map_or(true, |wanted| record.status == wanted))
            .collect()
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("failed to parse '{raw}' as a timestamp ({err})"))
}

fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_timestamp(&value).map_err(serde::de::Error::custom))
        .transpose()
}
