use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::analysis::DocumentAnalyzer;
use super::service::{SandboxError, SandboxService};
use super::store::{AccountId, KycRecordRepository};
use crate::workflows::kyc::domain::{
    AdminView, HistoryView, SubmissionMode, UploadSignals, VerificationResult,
};
use crate::workflows::kyc::gateway::{StatusPayload, SubmissionRequest};
use crate::workflows::kyc::validation::MAX_DOCUMENT_BYTES;

/// Multipart framing needs headroom above the document ceiling.
const UPLOAD_BODY_LIMIT: usize = MAX_DOCUMENT_BYTES * 2;

/// Router exposing the verification endpoints the client workflow consumes.
pub fn sandbox_router<R, A>(service: Arc<SandboxService<R, A>>) -> Router
where
    R: KycRecordRepository + 'static,
    A: DocumentAnalyzer + 'static,
{
    Router::new()
        .route("/kyc/status", get(status_handler::<R, A>))
        .route("/kyc/upload", post(upload_handler::<R, A>))
        .route("/kyc/submit", post(submit_handler::<R, A>))
        .route("/kyc/resubmit", post(resubmit_handler::<R, A>))
        .route("/kyc/history", get(history_handler::<R, A>))
        .route("/admin/all-kyc", get(admin_handler::<R, A>))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(service)
}

fn bearer_token(headers: &HeaderMap) -> Result<String, SandboxError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(SandboxError::Unauthenticated)
}

fn account(headers: &HeaderMap) -> Result<AccountId, SandboxError> {
    bearer_token(headers).map(AccountId)
}

pub(crate) async fn status_handler<R, A>(
    State(service): State<Arc<SandboxService<R, A>>>,
    headers: HeaderMap,
) -> Result<Json<Option<StatusPayload>>, SandboxError>
where
    R: KycRecordRepository + 'static,
    A: DocumentAnalyzer + 'static,
{
    let account = account(&headers)?;
    service.status(&account).map(Json)
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadQuery {
    #[serde(default)]
    name: String,
}

pub(crate) async fn upload_handler<R, A>(
    State(service): State<Arc<SandboxService<R, A>>>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadSignals>, SandboxError>
where
    R: KycRecordRepository + 'static,
    A: DocumentAnalyzer + 'static,
{
    account(&headers)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| SandboxError::Multipart(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let content = field
            .bytes()
            .await
            .map_err(|err| SandboxError::Multipart(err.to_string()))?;

        let signals = service.analyze(&query.name, &filename, &content_type, &content)?;
        return Ok(Json(signals));
    }

    Err(SandboxError::MissingFile)
}

pub(crate) async fn submit_handler<R, A>(
    State(service): State<Arc<SandboxService<R, A>>>,
    headers: HeaderMap,
    Query(request): Query<SubmissionRequest>,
) -> Result<Json<VerificationResult>, SandboxError>
where
    R: KycRecordRepository + 'static,
    A: DocumentAnalyzer + 'static,
{
    let account = account(&headers)?;
    service
        .submit(&account, SubmissionMode::Submit, request)
        .map(Json)
}

pub(crate) async fn resubmit_handler<R, A>(
    State(service): State<Arc<SandboxService<R, A>>>,
    headers: HeaderMap,
    Query(request): Query<SubmissionRequest>,
) -> Result<Json<VerificationResult>, SandboxError>
where
    R: KycRecordRepository + 'static,
    A: DocumentAnalyzer + 'static,
{
    let account = account(&headers)?;
    service
        .submit(&account, SubmissionMode::Resubmit, request)
        .map(Json)
}

pub(crate) async fn history_handler<R, A>(
    State(service): State<Arc<SandboxService<R, A>>>,
    headers: HeaderMap,
) -> Result<Json<HistoryView>, SandboxError>
where
    R: KycRecordRepository + 'static,
    A: DocumentAnalyzer + 'static,
{
    let account = account(&headers)?;
    service.history(&account).map(Json)
}

pub(crate) async fn admin_handler<R, A>(
    State(service): State<Arc<SandboxService<R, A>>>,
    headers: HeaderMap,
) -> Result<Json<AdminView>, SandboxError>
where
    R: KycRecordRepository + 'static,
    A: DocumentAnalyzer + 'static,
{
    let token = bearer_token(&headers)?;
    service.all_records(&token).map(Json)
}
