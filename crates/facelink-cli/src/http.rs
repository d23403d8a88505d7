//! HTTP/JSON client for the recognition service.

use async_trait::async_trait;
use facelink_core::types::{AnalyzeRequest, AnalyzeResponse, VerifyRequest, VerifyResponse};
use facelink_core::{RecognitionService, ServiceError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Talks to `POST {endpoint}/verify` and `POST {endpoint}/analyze`.
///
/// No request timeout is set: a hung service delays the answer indefinitely.
pub struct HttpRecognitionService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecognitionService {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("facelink/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, R>(&self, operation: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = format!("{}/{operation}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // The service reports failures as `{"error": "..."}`; anything else is dropped.
            let detail = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or_else(|_| serde_json::json!({}));
            tracing::error!(%url, status = status.as_u16(), %detail, "server error");
            return Err(ServiceError::Rejected {
                status: status.as_u16(),
                detail: detail.to_string(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| ServiceError::Decode(format!("{operation}: {e}")))
    }
}

#[async_trait]
impl RecognitionService for HttpRecognitionService {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, ServiceError> {
        self.post("verify", request).await
    }

    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, ServiceError> {
        self.post("analyze", request).await
    }
}
