//! facelink-hw — Camera capture and frame encoding.
//!
//! Provides V4L2-based camera access, pixel format conversion to RGB,
//! and lossless PNG data-URL encoding for transport.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
