use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::domain::{
    AdminView, CandidateDocument, HistoryView, SubmissionMode, UploadSignals, VerificationResult,
};
use super::gateway::{
    ErrorBody, GatewayError, StatusPayload, SubmissionRequest, VerificationGateway,
};
use crate::config::ApiConfig;

/// `reqwest` client for the verification service's JSON API.
#[derive(Debug, Clone)]
pub struct HttpVerificationGateway {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpVerificationGateway {
    pub fn new(config: &ApiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("securekyc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Requests never leave the process without a credential.
    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, GatewayError> {
        match &self.token {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Err(GatewayError::Unauthorized),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let response = self
            .authorized(builder)?
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "verification service responded");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            return Err(rejection(response).await);
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GatewayError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

async fn rejection(response: Response) -> GatewayError {
    let status = response.status().as_u16();
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .map(|body| body.message());
    GatewayError::Rejected { status, detail }
}

#[async_trait]
impl VerificationGateway for HttpVerificationGateway {
    async fn attempt_status(&self) -> Result<Option<StatusPayload>, GatewayError> {
        let response = match self.send(self.client.get(self.url("/kyc/status"))).await {
            Ok(response) => response,
            Err(GatewayError::Rejected { status: 404, .. }) => return Ok(None),
            Err(other) => return Err(other),
        };

        let body = response
            .text()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let payload: Option<StatusPayload> =
            serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))?;
        Ok(payload.filter(|payload| payload.status.is_some()))
    }

    async fn upload_document(
        &self,
        document: &CandidateDocument,
        declared_name: &str,
    ) -> Result<UploadSignals, GatewayError> {
        let part = Part::bytes(document.content().to_vec())
            .file_name(document.filename().to_string())
            .mime_str(document.declared_type())
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let form = Form::new().part("file", part);

        let request = self
            .client
            .post(self.url("/kyc/upload"))
            .query(&[("name", declared_name)])
            .multipart(form);
        self.json(request).await
    }

    async fn submit(
        &self,
        mode: SubmissionMode,
        request: &SubmissionRequest,
    ) -> Result<VerificationResult, GatewayError> {
        let builder = self.client.post(self.url(mode.path())).query(request);
        self.json(builder).await
    }

    async fn history(&self) -> Result<HistoryView, GatewayError> {
        self.json(self.client.get(self.url("/kyc/history"))).await
    }

    async fn all_records(&self) -> Result<AdminView, GatewayError> {
        self.json(self.client.get(self.url("/admin/all-kyc"))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::kyc::domain::KycStatus;
    use mockito::Matcher;
    use serde_json::json;

    fn gateway(server: &mockito::ServerGuard, token: Option<&str>) -> HttpVerificationGateway {
        let config = ApiConfig::new(server.url(), token.map(str::to_string));
        HttpVerificationGateway::new(&config).expect("client builds")
    }

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            name: "Asha Rao".to_string(),
            aadhaar_number: "123456789012".to_string(),
            district: "Chennai".to_string(),
            age: 34,
            ocr_aadhaar_found: true,
            ocr_name_found: false,
            face_detected: true,
            ocr_flags: "blurred corner; name mismatch".to_string(),
        }
    }

    #[tokio::test]
    async fn status_reads_snake_case_payload_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/kyc/status")
            .match_header("authorization", "Bearer user-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "REJECTED", "attempt_number": 2}"#)
            .create_async()
            .await;

        let payload = gateway(&server, Some("user-token"))
            .attempt_status()
            .await
            .expect("status loads")
            .expect("record present");

        assert_eq!(payload.status, Some(KycStatus::Rejected));
        assert_eq!(payload.attempt_number, Some(2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_treats_null_and_not_found_as_no_record() {
        let mut server = mockito::Server::new_async().await;
        let _null = server
            .mock("GET", "/kyc/status")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;
        assert_eq!(
            gateway(&server, Some("t")).attempt_status().await,
            Ok(None)
        );

        let mut missing = mockito::Server::new_async().await;
        let _not_found = missing
            .mock("GET", "/kyc/status")
            .with_status(404)
            .with_body(r#"{"detail": "No KYC record"}"#)
            .create_async()
            .await;
        assert_eq!(
            gateway(&missing, Some("t")).attempt_status().await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn missing_token_short_circuits_before_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/kyc/history")
            .expect(0)
            .create_async()
            .await;

        let result = gateway(&server, None).history().await;

        assert_eq!(result, Err(GatewayError::Unauthorized));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn resubmit_forwards_form_and_signals_as_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/kyc/resubmit")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "Asha Rao".into()),
                Matcher::UrlEncoded("aadhaar_number".into(), "123456789012".into()),
                Matcher::UrlEncoded("district".into(), "Chennai".into()),
                Matcher::UrlEncoded("age".into(), "34".into()),
                Matcher::UrlEncoded("ocr_aadhaar_found".into(), "true".into()),
                Matcher::UrlEncoded("ocr_name_found".into(), "false".into()),
                Matcher::UrlEncoded("face_detected".into(), "true".into()),
                Matcher::UrlEncoded(
                    "ocr_flags".into(),
                    "blurred corner; name mismatch".into(),
                ),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "verification_status": "REVIEW",
                    "risk_score": 45,
                    "uidai_district_risk": 0,
                    "reasons": ["Name mismatch"]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let result = gateway(&server, Some("t"))
            .submit(SubmissionMode::Resubmit, &request())
            .await
            .expect("resubmission accepted");

        assert_eq!(result.status, KycStatus::Review);
        assert_eq!(result.risk_score, 45.0);
        assert_eq!(result.reasons, vec!["Name mismatch".to_string()]);
        assert_eq!(result.attempt_number, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_detail_is_preserved() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/kyc/resubmit")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"detail": "Maximum resubmission attempts reached"}"#)
            .create_async()
            .await;

        let err = gateway(&server, Some("t"))
            .submit(SubmissionMode::Resubmit, &request())
            .await
            .expect_err("service refuses");

        assert!(err.is_max_attempts());
        assert_eq!(
            err,
            GatewayError::Rejected {
                status: 400,
                detail: Some("Maximum resubmission attempts reached".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn forbidden_maps_to_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/admin/all-kyc")
            .with_status(403)
            .with_body(r#"{"detail": "Admin only"}"#)
            .create_async()
            .await;

        assert_eq!(
            gateway(&server, Some("t")).all_records().await,
            Err(GatewayError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn upload_sends_multipart_file_and_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/kyc/upload")
            .match_query(Matcher::UrlEncoded("name".into(), "Asha Rao".into()))
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".to_string()),
            )
            .match_body(Matcher::Regex(r#"filename="id.pdf""#.to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "message": "Document analysed",
                    "aadhaar_found": true,
                    "name_found": true,
                    "face_detected": false,
                    "flags": ["No face detected"]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let document = crate::workflows::kyc::domain::CandidateDocument::new(
            crate::workflows::kyc::domain::DocumentFile::new(
                "id.pdf",
                "application/pdf",
                b"%PDF-1.4 Asha Rao 123456789012".to_vec(),
            ),
            crate::workflows::kyc::domain::MediaType::Pdf,
            None,
        );

        let signals = gateway(&server, Some("t"))
            .upload_document(&document, "Asha Rao")
            .await
            .expect("upload accepted");

        assert!(signals.aadhaar_found);
        assert!(!signals.face_detected);
        assert_eq!(signals.flags, vec!["No face detected".to_string()]);
        mock.assert_async().await;
    }
}
