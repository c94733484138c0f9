use crate::workflows::kyc::domain::KycStatus;
use crate::workflows::kyc::gateway::SubmissionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DistrictLoad {
    Normal,
    High,
}

/// Enrolment load per district from the upload-volume analysis.
const DISTRICT_LOAD: [(&str, DistrictLoad); 8] = [
    ("Chennai", DistrictLoad::Normal),
    ("Tirupati", DistrictLoad::Normal),
    ("Mumbai Suburban", DistrictLoad::High),
    ("Mumbai", DistrictLoad::High),
    ("Delhi", DistrictLoad::Normal),
    ("Bangalore", DistrictLoad::Normal),
    ("Hyderabad", DistrictLoad::Normal),
    ("Kolkata", DistrictLoad::High),
];

const UNKNOWN_DISTRICT_RISK: u32 = 15;
const HIGH_LOAD_DISTRICT_RISK: u32 = 25;
const MISSING_ID_PENALTY: u32 = 30;
const NAME_MISMATCH_PENALTY: u32 = 30;
const NO_FACE_PENALTY: u32 = 20;
const REVIEW_THRESHOLD: u32 = 30;
const REJECT_THRESHOLD: u32 = 60;

pub fn district_risk(district: &str) -> u32 {
    let district = district.trim();
    match DISTRICT_LOAD
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(district))
    {
        None => UNKNOWN_DISTRICT_RISK,
        Some((_, DistrictLoad::High)) => HIGH_LOAD_DISTRICT_RISK,
        Some((_, DistrictLoad::Normal)) => 0,
    }
}

/// Score, decision and the reasons behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub score: u32,
    pub district_risk: u32,
    pub status: KycStatus,
    pub reasons: Vec<String>,
}

pub fn assess(request: &SubmissionRequest) -> RiskAssessment {
    let mut reasons = Vec::new();
    let district = district_risk(&request.district);
    let mut score = district;

    match district {
        0 => {}
        UNKNOWN_DISTRICT_RISK => reasons.push(format!("Unknown district: {}", request.district)),
        _ => reasons.push(format!("High-load district: {}", request.district)),
    }
    if !request.ocr_aadhaar_found {
        score += MISSING_ID_PENALTY;
        reasons.push("Aadhaar number not found in document".to_string());
    }
    if !request.ocr_name_found {
        score += NAME_MISMATCH_PENALTY;
        reasons.push("Name on document does not match the form".to_string());
    }
    if !request.face_detected {
        score += NO_FACE_PENALTY;
        reasons.push("No face detected in document".to_string());
    }

    let status = if score < REVIEW_THRESHOLD {
        KycStatus::Approved
    } else if score < REJECT_THRESHOLD {
        KycStatus::Review
    } else {
        KycStatus::Rejected
    };

    RiskAssessment {
        score,
        district_risk: district,
        status,
        reasons,
    }
}
