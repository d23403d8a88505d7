//! Seams to the two external collaborators: the recognition service and the camera.

use crate::types::{AnalyzeRequest, AnalyzeResponse, CaptureFrame, VerifyRequest, VerifyResponse};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("service rejected request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ServiceError {
    /// The service answered with a non-success status. Verify treats this as a non-match.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ServiceError::Rejected { .. })
    }
}

/// Remote face-analysis endpoint.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, ServiceError>;

    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, ServiceError>;
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Something that can hand out a live stream, once.
#[async_trait]
pub trait CameraSource: Send + Sync {
    async fn open(&self) -> Result<Box<dyn FrameStream>, CaptureError>;
}

/// A live stream that yields encoded still frames on demand.
#[async_trait]
pub trait FrameStream: Send + Sync {
    async fn capture(&self) -> Result<CaptureFrame, CaptureError>;
}
