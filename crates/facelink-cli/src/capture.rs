//! Frame sources for the controller: a V4L2 camera driven from its own
//! thread, or a still image file read on every capture.

use async_trait::async_trait;
use facelink_core::{CameraSource, CaptureError, CaptureFrame, FrameStream};
use facelink_hw::{frame, Camera, CameraStream};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// Messages sent from the controller to the camera thread.
enum CaptureRequest {
    Frame {
        reply: oneshot::Sender<Result<CaptureFrame, CaptureError>>,
    },
}

/// Clone-safe handle to the camera thread.
#[derive(Clone)]
pub struct CameraHandle {
    tx: mpsc::Sender<CaptureRequest>,
}

#[async_trait]
impl FrameStream for CameraHandle {
    async fn capture(&self) -> Result<CaptureFrame, CaptureError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CaptureRequest::Frame { reply: reply_tx })
            .await
            .map_err(|_| CaptureError::Failed("camera thread exited".into()))?;
        reply_rx
            .await
            .map_err(|_| CaptureError::Failed("camera thread exited".into()))?
    }
}

/// Opens a V4L2 device on first use and keeps it streaming for the session.
pub struct V4lCameraSource {
    device: String,
    warmup_frames: usize,
}

impl V4lCameraSource {
    pub fn new(device: impl Into<String>, warmup_frames: usize) -> Self {
        Self {
            device: device.into(),
            warmup_frames,
        }
    }
}

#[async_trait]
impl CameraSource for V4lCameraSource {
    async fn open(&self) -> Result<Box<dyn FrameStream>, CaptureError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel::<CaptureRequest>(4);
        let device = self.device.clone();
        let warmup_frames = self.warmup_frames;

        std::thread::Builder::new()
            .name("facelink-camera".into())
            .spawn(move || run_camera(&device, warmup_frames, ready_tx, rx))
            .map_err(|e| {
                CaptureError::Unavailable(format!("failed to spawn camera thread: {e}"))
            })?;

        ready_rx.await.map_err(|_| {
            CaptureError::Unavailable("camera thread exited during startup".into())
        })??;
        Ok(Box::new(CameraHandle { tx }))
    }
}

/// Camera thread body.
///
/// Opens the device, starts one stream and discards warmup frames, reports
/// the outcome on `ready`, then serves capture requests from the running
/// stream until every handle is dropped.
fn run_camera(
    device: &str,
    warmup_frames: usize,
    ready: oneshot::Sender<Result<(), CaptureError>>,
    mut rx: mpsc::Receiver<CaptureRequest>,
) {
    let camera = match Camera::open(device) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::Unavailable(e.to_string())));
            return;
        }
    };
    let mut stream = match camera.start_stream(warmup_frames) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::Unavailable(e.to_string())));
            return;
        }
    };

    tracing::info!(
        device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        format = ?camera.pixel_format(),
        "camera streaming"
    );
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Some(req) = rx.blocking_recv() {
        match req {
            CaptureRequest::Frame { reply } => {
                let _ = reply.send(grab(&mut stream));
            }
        }
    }
    tracing::debug!("camera thread exiting");
}

fn grab(stream: &mut CameraStream<'_>) -> Result<CaptureFrame, CaptureError> {
    let frame = stream
        .capture_frame()
        .map_err(|e| CaptureError::Failed(e.to_string()))?;
    let encoded =
        frame::encode_png_data_url(&frame).map_err(|e| CaptureError::Failed(e.to_string()))?;
    tracing::debug!(
        sequence = frame.sequence,
        width = frame.width,
        height = frame.height,
        "frame encoded"
    );
    Ok(CaptureFrame::new(encoded))
}

/// Stands in for a camera: every capture re-reads and re-encodes the file.
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CameraSource for ImageFileSource {
    async fn open(&self) -> Result<Box<dyn FrameStream>, CaptureError> {
        if !self.path.is_file() {
            return Err(CaptureError::Unavailable(format!(
                "image file not found: {}",
                self.path.display()
            )));
        }
        Ok(Box::new(ImageFileStream {
            path: self.path.clone(),
        }))
    }
}

struct ImageFileStream {
    path: PathBuf,
}

#[async_trait]
impl FrameStream for ImageFileStream {
    async fn capture(&self) -> Result<CaptureFrame, CaptureError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let frame =
                frame::load_image_file(&path).map_err(|e| CaptureError::Failed(e.to_string()))?;
            frame::encode_png_data_url(&frame)
                .map(CaptureFrame::new)
                .map_err(|e| CaptureError::Failed(e.to_string()))
        })
        .await
        .map_err(|e| CaptureError::Failed(format!("image load task failed: {e}")))?
    }
}
