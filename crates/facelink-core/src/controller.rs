//! Client controller: capture a frame, run it through the recognition
//! service, fold the answer into the display state.

use crate::service::{CameraSource, FrameStream, RecognitionService, ServiceError};
use crate::state::DisplayState;
use crate::types::{
    confidence, CaptureFrame, IdentityRegistry, Purpose, RecognitionSettings, VerifyOutcome,
};

/// Compare `frame` against each registry entry until one matches.
///
/// Requests are issued strictly one after another in registry order; the
/// next entry is only tried once the previous response has arrived. A
/// rejected request counts as a non-match. Transport or decode failures
/// abort the pass.
pub async fn verify_against_registry<S: RecognitionService + ?Sized>(
    service: &S,
    settings: &RecognitionSettings,
    registry: &IdentityRegistry,
    frame: &CaptureFrame,
) -> Result<VerifyOutcome, ServiceError> {
    let mut outcome = VerifyOutcome::default();

    for entry in registry.iter() {
        let Some(reference) = entry.reference() else {
            tracing::warn!(label = %entry.label, "no reference image for identity, skipping");
            continue;
        };

        let request = settings.verify_request(frame, reference);
        tracing::debug!(
            label = %entry.label,
            model = %request.model_name,
            detector = %request.detector_backend,
            metric = %request.distance_metric,
            anti_spoofing = request.anti_spoofing,
            "sending verify request"
        );

        outcome.attempts += 1;
        let response = match service.verify(&request).await {
            Ok(response) => response,
            Err(err) if err.is_rejection() => {
                tracing::error!(label = %entry.label, error = %err, "verify request rejected");
                continue;
            }
            Err(err) => return Err(err),
        };

        tracing::debug!(
            label = %entry.label,
            verified = response.verified,
            distance = ?response.distance,
            "verify response"
        );

        match response.distance {
            Some(distance) => outcome.confidence = Some(confidence(distance)),
            None => tracing::warn!(label = %entry.label, "verify response carried no distance"),
        }

        if response.verified {
            outcome.verified = true;
            outcome.identity = Some(entry.label.clone());
            break;
        }
    }

    Ok(outcome)
}

/// Owns the session: service handle, settings, registry and the camera stream.
pub struct Controller<S> {
    service: S,
    settings: RecognitionSettings,
    registry: IdentityRegistry,
    stream: Option<Box<dyn FrameStream>>,
    camera_requested: bool,
}

impl<S: RecognitionService> Controller<S> {
    pub fn new(service: S, settings: RecognitionSettings, registry: IdentityRegistry) -> Self {
        Self {
            service,
            settings,
            registry,
            stream: None,
            camera_requested: false,
        }
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Request the camera stream. Only the first call does anything; a
    /// failure is logged and never retried.
    pub async fn acquire_camera(&mut self, source: &dyn CameraSource) {
        if self.camera_requested {
            tracing::debug!("camera already requested this session");
            return;
        }
        self.camera_requested = true;

        match source.open().await {
            Ok(stream) => {
                tracing::info!("camera stream acquired");
                self.stream = Some(stream);
            }
            Err(err) => tracing::error!(error = %err, "error accessing camera"),
        }
    }

    /// Grab a still from the stream. Always clears the verification fields.
    pub async fn capture_frame(
        &self,
        purpose: Purpose,
        state: DisplayState,
    ) -> (DisplayState, Option<CaptureFrame>) {
        let state = state.cleared_for_capture();

        let Some(stream) = &self.stream else {
            tracing::warn!(%purpose, "no active camera stream; nothing captured");
            return (state, None);
        };

        match stream.capture().await {
            Ok(frame) => {
                tracing::debug!(%purpose, bytes = frame.as_str().len(), "frame captured");
                (state, Some(frame))
            }
            Err(err) => {
                tracing::error!(%purpose, error = %err, "frame capture failed");
                (state, None)
            }
        }
    }

    pub async fn verify(&self, frame: Option<&CaptureFrame>, state: DisplayState) -> DisplayState {
        let state = state.begin_verify();

        let Some(frame) = frame else {
            tracing::error!("no image captured for verification");
            return state.with_verification_failure();
        };

        match verify_against_registry(&self.service, &self.settings, &self.registry, frame).await {
            Ok(outcome) => {
                tracing::info!(
                    verified = outcome.verified,
                    identity = ?outcome.identity,
                    confidence = ?outcome.confidence,
                    attempts = outcome.attempts,
                    "verification finished"
                );
                state.with_verification(outcome)
            }
            Err(err) => {
                tracing::error!(error = %err, "exception while verifying image");
                state.with_verification_failure()
            }
        }
    }

    pub async fn analyze(&self, frame: Option<&CaptureFrame>, state: DisplayState) -> DisplayState {
        let state = state.begin_analysis();

        let Some(frame) = frame else {
            tracing::error!("no image captured for analysis");
            return state.analysis_abandoned();
        };

        let request = self.settings.analyze_request(frame);
        tracing::debug!(
            detector = %request.detector_backend,
            anti_spoofing = request.anti_spoofing,
            "sending analyze request"
        );

        match self.service.analyze(&request).await {
            Ok(response) => {
                let summaries: Vec<String> = response
                    .results
                    .iter()
                    .map(|face| {
                        let summary = face.summary();
                        tracing::info!(%summary, "face analyzed");
                        summary
                    })
                    .collect();
                if summaries.is_empty() {
                    tracing::warn!("analysis returned no faces; display left unchanged");
                }
                state.with_analysis(summaries)
            }
            Err(err) => {
                tracing::error!(error = %err, "exception while analyzing image");
                state.analysis_abandoned()
            }
        }
    }

    /// One user action: capture, then verify or analyze.
    pub async fn run(&self, purpose: Purpose, state: DisplayState) -> DisplayState {
        let (state, frame) = self.capture_frame(purpose, state).await;
        match purpose {
            Purpose::Verify => self.verify(frame.as_ref(), state).await,
            Purpose::Analyze => self.analyze(frame.as_ref(), state).await,
        }
    }
}
