use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tokio::sync::Notify;

use crate::workflows::kyc::domain::{
    AdminView, ApplicantForm, CandidateDocument, DocumentFile, HistoryView, KycStatus,
    SubmissionIntent, SubmissionMode, UploadSignals, VerificationResult,
};
use crate::workflows::kyc::gateway::{
    GatewayError, StatusPayload, SubmissionRequest, VerificationGateway,
};
use crate::workflows::kyc::sandbox::{HeuristicAnalyzer, InMemoryKycRepository, SandboxService};
use crate::workflows::kyc::validation::DocumentPolicy;
use crate::workflows::kyc::KycWorkflow;

/// One request the workflow sent to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum GatewayCall {
    Status,
    Upload {
        filename: String,
        declared_name: String,
    },
    Submit {
        mode: SubmissionMode,
        request: SubmissionRequest,
    },
}

/// Gateway answering from scripted responses and recording every call.
pub(super) struct ScriptedGateway {
    status: Mutex<Result<Option<StatusPayload>, GatewayError>>,
    uploads: Mutex<VecDeque<Result<UploadSignals, GatewayError>>>,
    submissions: Mutex<VecDeque<Result<VerificationResult, GatewayError>>>,
    calls: Mutex<Vec<GatewayCall>>,
    hold_uploads: bool,
    upload_started: Notify,
    upload_release: Notify,
    hold_submissions: bool,
    submit_started: Notify,
    submit_release: Notify,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            status: Mutex::new(Ok(None)),
            uploads: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            hold_uploads: false,
            upload_started: Notify::new(),
            upload_release: Notify::new(),
            hold_submissions: false,
            submit_started: Notify::new(),
            submit_release: Notify::new(),
        }
    }
}

impl ScriptedGateway {
    pub(super) fn with_status(status: KycStatus, attempt_number: u32) -> Self {
        let gateway = Self::default();
        gateway.set_status(Ok(Some(StatusPayload {
            status: Some(status),
            attempt_number: Some(attempt_number),
        })));
        gateway
    }

    /// Uploads block until [`ScriptedGateway::release_upload`] is called.
    pub(super) fn holding_uploads(mut self) -> Self {
        self.hold_uploads = true;
        self
    }

    /// Parks every `submit` call until `release_submission` is called.
    pub(super) fn holding_submissions(mut self) -> Self {
        self.hold_submissions = true;
        self
    }

    pub(super) fn set_status(&self, status: Result<Option<StatusPayload>, GatewayError>) {
        *self.status.lock().unwrap() = status;
    }

    pub(super) fn push_upload(&self, response: Result<UploadSignals, GatewayError>) {
        self.uploads.lock().unwrap().push_back(response);
    }

    pub(super) fn push_submission(&self, response: Result<VerificationResult, GatewayError>) {
        self.submissions.lock().unwrap().push_back(response);
    }

    pub(super) async fn upload_started(&self) {
        self.upload_started.notified().await;
    }

    pub(super) fn release_upload(&self) {
        self.upload_release.notify_one();
    }

    pub(super) async fn submit_started(&self) {
        self.submit_started.notified().await;
    }

    pub(super) fn release_submission(&self) {
        self.submit_release.notify_one();
    }

    pub(super) fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(super) fn status_calls(&self) -> usize {
        self.count(|call| matches!(call, GatewayCall::Status))
    }

    pub(super) fn upload_calls(&self) -> usize {
        self.count(|call| matches!(call, GatewayCall::Upload { .. }))
    }

    pub(super) fn submit_calls(&self) -> usize {
        self.count(|call| matches!(call, GatewayCall::Submit { .. }))
    }

    pub(super) fn last_submission(&self) -> Option<(SubmissionMode, SubmissionRequest)> {
        self.calls().into_iter().rev().find_map(|call| match call {
            GatewayCall::Submit { mode, request } => Some((mode, request)),
            _ => None,
        })
    }

    fn count(&self, predicate: impl Fn(&GatewayCall) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VerificationGateway for ScriptedGateway {
    async fn attempt_status(&self) -> Result<Option<StatusPayload>, GatewayError> {
        self.record(GatewayCall::Status);
        self.status.lock().unwrap().clone()
    }

    async fn upload_document(
        &self,
        document: &CandidateDocument,
        declared_name: &str,
    ) -> Result<UploadSignals, GatewayError> {
        self.record(GatewayCall::Upload {
            filename: document.filename().to_string(),
            declared_name: declared_name.to_string(),
        });
        if self.hold_uploads {
            self.upload_started.notify_one();
            self.upload_release.notified().await;
        }
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Transport("no scripted upload".to_string())))
    }

    async fn submit(
        &self,
        mode: SubmissionMode,
        request: &SubmissionRequest,
    ) -> Result<VerificationResult, GatewayError> {
        self.record(GatewayCall::Submit {
            mode,
            request: request.clone(),
        });
        if self.hold_submissions {
            self.submit_started.notify_one();
            self.submit_release.notified().await;
        }
        self.submissions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Transport("no scripted submission".to_string())))
    }

    async fn history(&self) -> Result<HistoryView, GatewayError> {
        Ok(HistoryView::default())
    }

    async fn all_records(&self) -> Result<AdminView, GatewayError> {
        Ok(AdminView::default())
    }
}

pub(super) fn workflow(
    gateway: &Arc<ScriptedGateway>,
    intent: SubmissionIntent,
) -> KycWorkflow<ScriptedGateway> {
    KycWorkflow::new(gateway.clone(), DocumentPolicy::default(), intent)
}

pub(super) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub(super) fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([212, 196, 170]));
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, format).expect("encode fixture");
    cursor.into_inner()
}

/// A 400x400 JPEG padded past its end marker to `total` bytes.
pub(super) fn padded_jpeg(total: usize) -> Vec<u8> {
    let mut bytes = jpeg_bytes(400, 400);
    bytes.resize(total.max(bytes.len()), 0);
    bytes
}

pub(super) fn id_card_png() -> DocumentFile {
    DocumentFile::new("id.png", "image/png", png_bytes(400, 400))
}

pub(super) fn scanned_pdf() -> DocumentFile {
    DocumentFile::new("id.pdf", "application/pdf", b"%PDF-1.4\n%%EOF".to_vec())
}

pub(super) fn form() -> ApplicantForm {
    ApplicantForm {
        name: "Asha Rao".to_string(),
        id_number: "123456789012".to_string(),
        district: "Chennai".to_string(),
        age: 34,
    }
}

pub(super) fn clean_signals() -> UploadSignals {
    UploadSignals {
        message: "Document uploaded and analysed".to_string(),
        aadhaar_found: true,
        name_found: true,
        face_detected: true,
        flags: Vec::new(),
    }
}

pub(super) fn result(status: KycStatus, attempt_number: Option<u32>) -> VerificationResult {
    VerificationResult {
        status,
        risk_score: 12.0,
        district_risk: 0.0,
        reasons: Vec::new(),
        attempt_number,
    }
}

pub(super) fn rejected_by_service(detail: &str) -> GatewayError {
    GatewayError::Rejected {
        status: 400,
        detail: Some(detail.to_string()),
    }
}

pub(super) type Sandbox = SandboxService<InMemoryKycRepository, HeuristicAnalyzer>;

pub(super) fn sandbox() -> Arc<Sandbox> {
    Arc::new(
        SandboxService::new(
            Arc::new(InMemoryKycRepository::default()),
            Arc::new(HeuristicAnalyzer),
        )
        .with_admin_tokens(["root".to_string()]),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
