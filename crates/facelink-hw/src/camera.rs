//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("device has no video capture capability")]
    CaptureNotSupported,
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Motion JPEG, one compressed image per buffer.
    Mjpg,
    /// 8-bit grayscale.
    Grey,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        if fourcc == FourCC::new(b"YUYV") {
            Some(PixelFormat::Yuyv)
        } else if fourcc == FourCC::new(b"MJPG") {
            Some(PixelFormat::Mjpg)
        } else if fourcc == FourCC::new(b"GREY") {
            Some(PixelFormat::Grey)
        } else {
            None
        }
    }
}

/// Buffers in the mmap ring.
const STREAM_BUFFERS: u32 = 4;
/// Dark frames skipped per capture before the last one is accepted anyway.
const MAX_DARK_SKIPS: usize = 3;
/// Fraction of dark pixels above which a frame counts as dark.
const DARK_THRESHOLD: f32 = 0.95;

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    ///
    /// Keeps the device's current (native) resolution and only negotiates
    /// the pixel format: YUYV preferred, MJPG or GREY accepted.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::CaptureNotSupported);
        }

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = PixelFormat::from_fourcc(fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, MJPG, or GREY)"
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            fourcc,
            pixel_format,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Start streaming and discard `warmup_frames` while auto exposure and
    /// gain settle. The returned stream stays live until dropped.
    pub fn start_stream(&self, warmup_frames: usize) -> Result<CameraStream<'_>, CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;
        let mut live = CameraStream {
            camera: self,
            stream,
        };

        if warmup_frames > 0 {
            tracing::info!(count = warmup_frames, "discarding warmup frames");
            for _ in 0..warmup_frames {
                live.skip()?;
            }
        }

        Ok(live)
    }

    fn buf_to_frame(&self, buf: &[u8], sequence: u32) -> Result<Frame, CameraError> {
        let data = match self.pixel_format {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, self.width, self.height),
            PixelFormat::Grey => frame::grey_to_rgb(buf, self.width, self.height),
            PixelFormat::Mjpg => {
                return frame::decode_mjpeg(buf, sequence)
                    .map_err(|e| CameraError::CaptureFailed(format!("MJPG decode failed: {e}")));
            }
        }
        .map_err(|e| {
            CameraError::CaptureFailed(format!("{:?} conversion failed: {e}", self.pixel_format))
        })?;

        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            sequence,
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

/// A running capture stream borrowed from its [`Camera`].
pub struct CameraStream<'a> {
    camera: &'a Camera,
    stream: MmapStream<'a>,
}

impl CameraStream<'_> {
    /// Capture the current frame at native resolution, converted to RGB.
    ///
    /// Buffers filled since the previous capture are stale, so the ring is
    /// drained first. Dark frames are skipped up to a few times.
    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        for _ in 0..STREAM_BUFFERS {
            self.skip()?;
        }
        first_lit_frame(|| self.next_frame(), MAX_DARK_SKIPS)
    }

    fn skip(&mut self) -> Result<(), CameraError> {
        self.stream
            .next()
            .map(|_| ())
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))
    }

    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let used = (meta.bytesused as usize).min(buf.len());
        self.camera.buf_to_frame(&buf[..used], meta.sequence)
    }
}

/// Pull frames until one is not dark. After `max_dark` skips the last frame
/// is returned as is.
fn first_lit_frame(
    mut next: impl FnMut() -> Result<Frame, CameraError>,
    max_dark: usize,
) -> Result<Frame, CameraError> {
    let mut current = next()?;
    for _ in 0..max_dark {
        if !frame::is_dark_frame(&current, DARK_THRESHOLD) {
            return Ok(current);
        }
        tracing::debug!(seq = current.sequence, "skipping dark frame");
        current = next()?;
    }
    if frame::is_dark_frame(&current, DARK_THRESHOLD) {
        tracing::warn!(seq = current.sequence, "camera image is dark; lens may be covered");
    }
    Ok(current)
}
