use crate::workflows::kyc::domain::{MediaType, UploadSignals, ID_NUMBER_LEN};

/// Stand-in for the document-analysis backend.
pub trait DocumentAnalyzer: Send + Sync {
    fn analyze(&self, declared_name: &str, media_type: MediaType, content: &[u8])
        -> UploadSignals;
}

/// Deterministic byte-level checks. Good enough to drive the workflow, not an OCR engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

impl DocumentAnalyzer for HeuristicAnalyzer {
    fn analyze(
        &self,
        declared_name: &str,
        media_type: MediaType,
        content: &[u8],
    ) -> UploadSignals {
        let aadhaar_found = contains_digit_run(content, ID_NUMBER_LEN);
        let name_found = contains_name(content, declared_name);
        let face_detected = media_type.is_image();

        let mut flags = Vec::new();
        if !aadhaar_found {
            flags.push("Aadhaar number not found in document".to_string());
        }
        if !name_found {
            flags.push("Name not found in document".to_string());
        }
        if !face_detected {
            flags.push("No face detected".to_string());
        }

        UploadSignals {
            message: "Document uploaded and analysed".to_string(),
            aadhaar_found,
            name_found,
            face_detected,
            flags,
        }
    }
}

fn contains_digit_run(content: &[u8], run: usize) -> bool {
    let mut streak = 0;
    for byte in content {
        if byte.is_ascii_digit() {
            streak += 1;
            if streak >= run {
                return true;
            }
        } else {
            streak = 0;
        }
    }
    false
}

fn contains_name(content: &[u8], declared_name: &str) -> bool {
    let needle = declared_name.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    String::from_utf8_lossy(content)
        .to_lowercase()
        .contains(&needle)
}
