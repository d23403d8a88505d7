//! Frame type and conversions — YUYV/GREY/MJPG to RGB, lossless PNG data URLs.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use std::path::Path;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A captured frame as packed RGB8.
#[derive(Clone, Debug)]
pub struct Frame {
    /// RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    pub fn from_image(image: DynamicImage, sequence: u32) -> Self {
        let rgb = image.to_rgb8();
        Self {
            width: rgb.width(),
            height: rgb.height(),
            data: rgb.into_raw(),
            sequence,
        }
    }

    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Convert packed YUYV (4:2:2) to RGB8 using integer BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| (x >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e + 128),
        clamp(298 * c - 100 * d - 208 * e + 128),
        clamp(298 * c + 516 * d + 128),
    ]
}

/// Check whether a frame is dark: more than `threshold_pct` of its pixels
/// have every channel below 32.
pub fn is_dark_frame(frame: &Frame, threshold_pct: f32) -> bool {
    let pixels = frame.data.len() / 3;
    if pixels == 0 {
        return true;
    }
    let dark_count = frame
        .data
        .chunks_exact(3)
        .filter(|px| px.iter().all(|&c| c < 32))
        .count();
    (dark_count as f32 / pixels as f32) > threshold_pct
}

/// Replicate 8-bit grayscale into three channels.
pub fn grey_to_rgb(gray: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height) as usize;
    if gray.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: gray.len(),
        });
    }
    Ok(gray[..expected].iter().flat_map(|&p| [p, p, p]).collect())
}

/// Decode a motion-JPEG buffer.
pub fn decode_mjpeg(jpeg: &[u8], sequence: u32) -> Result<Frame, FrameError> {
    let image = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)?;
    Ok(Frame::from_image(image, sequence))
}

/// Load a still image from disk (any format the `image` crate recognizes).
pub fn load_image_file(path: &Path) -> Result<Frame, FrameError> {
    let image = image::open(path)?;
    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "loaded still image"
    );
    Ok(Frame::from_image(image, 0))
}

/// Encode a frame as PNG.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, FrameError> {
    let expected = frame.expected_len();
    if frame.data.len() != expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: frame.data.len(),
        });
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        &frame.data,
        frame.width,
        frame.height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(png)
}

/// Encode a frame as `data:image/png;base64,...`.
pub fn encode_png_data_url(frame: &Frame) -> Result<String, FrameError> {
    let png = encode_png(frame)?;
    Ok(format!("{PNG_DATA_URL_PREFIX}{}", BASE64_STANDARD.encode(png)))
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("image codec: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_black_and_white() {
        // 2x1 image: black pixel (Y=16), white pixel (Y=235), neutral chroma
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_output_length() {
        let yuyv = vec![128u8; 4 * 2 * 2];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.len(), 4 * 2 * 3);
    }

    #[test]
    fn test_yuyv_red_chroma_raises_red_channel() {
        let yuyv = vec![128, 128, 128, 240];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb[0] > rgb[1] && rgb[0] > rgb[2]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(matches!(
            yuyv_to_rgb(&yuyv, 2, 1),
            Err(FrameError::InvalidLength { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_grey_to_rgb() {
        let rgb = grey_to_rgb(&[7, 200], 2, 1).unwrap();
        assert_eq!(rgb, vec![7, 7, 7, 200, 200, 200]);
    }

    fn solid(value: u8, pixels: usize) -> Frame {
        Frame {
            data: vec![value; pixels * 3],
            width: pixels as u32,
            height: 1,
            sequence: 0,
        }
    }

    #[test]
    fn test_dark_frame_all_black() {
        assert!(is_dark_frame(&solid(0, 100), 0.95));
    }

    #[test]
    fn test_dark_frame_normal() {
        assert!(!is_dark_frame(&solid(128, 100), 0.95));
    }

    #[test]
    fn test_dark_frame_empty() {
        assert!(is_dark_frame(&solid(0, 0), 0.95));
    }

    #[test]
    fn test_dark_frame_one_bright_channel_is_lit() {
        let mut frame = solid(0, 10);
        for px in frame.data.chunks_exact_mut(3) {
            px[2] = 200;
        }
        assert!(!is_dark_frame(&frame, 0.95));
    }

    #[test]
    fn test_png_data_url_is_lossless() {
        let frame = Frame {
            data: (0..12).map(|i| i * 20).collect(),
            width: 2,
            height: 2,
            sequence: 0,
        };
        let url = encode_png_data_url(&frame).unwrap();
        let encoded = url.strip_prefix(PNG_DATA_URL_PREFIX).unwrap();
        let png = BASE64_STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.into_raw(), frame.data);
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let frame = Frame {
            data: vec![0; 5],
            width: 2,
            height: 2,
            sequence: 0,
        };
        assert!(matches!(encode_png(&frame), Err(FrameError::InvalidLength { .. })));
    }

    #[test]
    fn test_decode_mjpeg_rejects_garbage() {
        assert!(matches!(decode_mjpeg(&[0, 1, 2, 3], 0), Err(FrameError::Image(_))));
    }
}
