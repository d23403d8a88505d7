//! facelink-core — Client-side orchestration for a remote face-analysis service.
//!
//! Holds the identity registry, confidence scoring, the display state
//! machine and the controller that drives verify and analyze against a
//! [`RecognitionService`].

pub mod controller;
pub mod service;
pub mod state;
pub mod types;

pub use controller::{verify_against_registry, Controller};
pub use service::{CameraSource, CaptureError, FrameStream, RecognitionService, ServiceError};
pub use state::{DisplayState, Phase};
pub use types::{
    confidence, CaptureFrame, IdentityRegistry, Purpose, RecognitionSettings, RegistryEntry,
    VerifyOutcome,
};
