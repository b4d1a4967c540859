//! Builders for synthetic rover streams.
//!
//! Shared by unit tests and the codec benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use crate::codec::encode_frame;
use crate::messages::{Message, MessageKind};
use crate::types::{
    BatterySample, CentroidSample, GpsSample, PressureSample, VIDEO_FRAME_LEN, VideoFrame,
};

/// Deterministic RGB565 raster where pixel `i` holds the value `i as u16`.
pub fn gradient_video_payload() -> Vec<u8> {
    (0..VIDEO_FRAME_LEN / 2).flat_map(|i| (i as u16).to_le_bytes()).collect()
}

/// One framed message of every kind, in type-code order.
pub fn one_of_each() -> Vec<u8> {
    let messages = [
        Message::Video(
            VideoFrame::from_rgb565(gradient_video_payload()).expect("gradient raster size"),
        ),
        Message::Centroid(CentroidSample { x: 160.0, y: 120.0 }),
        Message::Pressure(PressureSample::from_pressure(1000.0)),
        Message::Gps(GpsSample { latitude: 47.3769, longitude: 8.5417 }),
        Message::Battery(BatterySample::from_voltage(3.9)),
    ];
    messages.iter().flat_map(encode_message).collect()
}

pub fn encode_message(message: &Message) -> Vec<u8> {
    encode_frame(message.kind().code(), &message.to_payload())
}

/// `count` text telemetry frames cycling through centroid, pressure, GPS and battery.
pub fn telemetry_stream(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| {
            let (kind, payload) = match i % 4 {
                0 => (MessageKind::Centroid, format!("X:{},Y:{}", i % 320, i % 240)),
                1 => (MessageKind::Pressure, format!("P:{:.2}", 950.0 + (i % 100) as f32)),
                2 => (MessageKind::Gps, format!("LAT:{:.6},LON:{:.6}", 47.0 + i as f64 * 1e-6, 8.5)),
                _ => (MessageKind::Battery, format!("V:{:.2}", 3.2 + (i % 100) as f32 / 100.0)),
            };
            encode_frame(kind.code(), payload.as_bytes())
        })
        .collect()
}

/// Like [`telemetry_stream`] but with `garbage_len` junk bytes before every frame.
///
/// The junk never contains `0xAA`, so it cannot form a start marker.
pub fn noisy_telemetry_stream(count: usize, garbage_len: usize) -> Vec<u8> {
    let clean = telemetry_stream(count);
    let mut out = Vec::with_capacity(clean.len() + count * garbage_len);
    let mut junk = (0..).map(|i: u32| (i.wrapping_mul(37) % 0xA9) as u8);
    for frame in split_frames(&clean) {
        out.extend(junk.by_ref().take(garbage_len));
        out.extend_from_slice(frame);
    }
    out
}

/// Split a clean encoded stream back into its frames.
fn split_frames(mut bytes: &[u8]) -> Vec<&[u8]> {
    let mut frames = Vec::new();
    while bytes.len() >= 8 {
        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let (frame, rest) = bytes.split_at(8 + len + 3);
        frames.push(frame);
        bytes = rest;
    }
    frames
}
