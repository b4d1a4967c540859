//! Video raster received from the rover camera

use std::sync::Arc;

use crate::DecodeError;

/// Camera raster width in pixels (QVGA).
pub const VIDEO_WIDTH: usize = 320;

/// Camera raster height in pixels (QVGA).
pub const VIDEO_HEIGHT: usize = 240;

/// RGB565 packs one pixel into two bytes.
pub const BYTES_PER_PIXEL: usize = 2;

/// Exact payload length of a video message.
pub const VIDEO_FRAME_LEN: usize = VIDEO_WIDTH * VIDEO_HEIGHT * BYTES_PER_PIXEL;

/// A 320×240 RGB565 frame, row-major, each pixel a little-endian `u16`.
///
/// The pixel buffer is shared (`Arc<[u8]>`) so publishing a frame to observers
/// and handing it to the classifier never copies the 150 KiB raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    data: Arc<[u8]>,
}

impl VideoFrame {
    /// Build a frame from a raw payload, which must be exactly [`VIDEO_FRAME_LEN`] bytes.
    pub fn from_rgb565(data: Vec<u8>) -> Result<Self, DecodeError> {
        if data.len() != VIDEO_FRAME_LEN {
            return Err(DecodeError::VideoSize { expected: VIDEO_FRAME_LEN, actual: data.len() });
        }
        Ok(Self { data: data.into() })
    }

    pub fn width(&self) -> usize {
        VIDEO_WIDTH
    }

    pub fn height(&self) -> usize {
        VIDEO_HEIGHT
    }

    /// Raw packed pixel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Packed RGB565 value at `(x, y)`, or `None` outside the raster.
    pub fn pixel(&self, x: usize, y: usize) -> Option<u16> {
        if x >= VIDEO_WIDTH || y >= VIDEO_HEIGHT {
            return None;
        }
        let offset = (y * VIDEO_WIDTH + x) * BYTES_PER_PIXEL;
        Some(u16::from_le_bytes([self.data[offset], self.data[offset + 1]]))
    }

    /// Pixel at `(x, y)` expanded to 8-bit RGB.
    pub fn rgb888(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        self.pixel(x, y).map(expand_rgb565)
    }

    /// Whole raster expanded to tightly packed RGB888 rows.
    pub fn to_rgb888(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(VIDEO_WIDTH * VIDEO_HEIGHT * 3);
        for px in self.data.chunks_exact(BYTES_PER_PIXEL) {
            out.extend_from_slice(&expand_rgb565(u16::from_le_bytes([px[0], px[1]])));
        }
        out
    }
}

/// Replicate the high bits into the low bits so full-scale channels map to 255.
fn expand_rgb565(value: u16) -> [u8; 3] {
    let r = ((value >> 11) & 0x1F) as u8;
    let g = ((value >> 5) & 0x3F) as u8;
    let b = (value & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}
