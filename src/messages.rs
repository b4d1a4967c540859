//! Typed messages carried inside frames.
//!
//! Each frame type maps to exactly one [`Message`] variant:
//!
//! | Type | Variant    | Payload                         |
//! |------|------------|---------------------------------|
//! | 1    | `Video`    | 153 600 bytes of RGB565 raster  |
//! | 2    | `Centroid` | `X:<num>,Y:<num>`               |
//! | 3    | `Pressure` | `P:<num>` (hPa)                 |
//! | 4    | `Gps`      | `LAT:<num>,LON:<num>`           |
//! | 5    | `Battery`  | `V:<num>`                       |
//!
//! Decoding is pure: a payload either yields a value or a [`DecodeError`].
//! Callers decide what a failure means; the reader logs it and moves on.

use crate::DecodeError;
use crate::codec::Frame;
use crate::types::{BatterySample, CentroidSample, GpsSample, PressureSample, VideoFrame};

/// Wire type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Video = 1,
    Centroid = 2,
    Pressure = 3,
    Gps = 4,
    Battery = 5,
}

impl MessageKind {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Video),
            2 => Ok(Self::Centroid),
            3 => Ok(Self::Pressure),
            4 => Ok(Self::Gps),
            5 => Ok(Self::Battery),
            other => Err(DecodeError::UnknownType(other)),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Video => "video",
            Self::Centroid => "centroid",
            Self::Pressure => "pressure",
            Self::Gps => "gps",
            Self::Battery => "battery",
        };
        f.write_str(name)
    }
}

/// A decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Video(VideoFrame),
    Centroid(CentroidSample),
    Pressure(PressureSample),
    Gps(GpsSample),
    Battery(BatterySample),
}

impl Message {
    /// Decode a frame, rejecting unknown type codes.
    pub fn decode(frame: Frame) -> Result<Self, DecodeError> {
        let kind = MessageKind::try_from(frame.frame_type)?;
        Self::decode_payload(kind, frame.payload)
    }

    pub fn decode_payload(kind: MessageKind, payload: Vec<u8>) -> Result<Self, DecodeError> {
        match kind {
            MessageKind::Video => VideoFrame::from_rgb565(payload).map(Self::Video),
            MessageKind::Centroid => decode_centroid(&payload).map(Self::Centroid),
            MessageKind::Pressure => decode_pressure(&payload).map(Self::Pressure),
            MessageKind::Gps => decode_gps(&payload).map(Self::Gps),
            MessageKind::Battery => decode_battery(&payload).map(Self::Battery),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Video(_) => MessageKind::Video,
            Self::Centroid(_) => MessageKind::Centroid,
            Self::Pressure(_) => MessageKind::Pressure,
            Self::Gps(_) => MessageKind::Gps,
            Self::Battery(_) => MessageKind::Battery,
        }
    }

    /// Payload bytes in the format the rover firmware sends.
    pub fn to_payload(&self) -> Vec<u8> {
        match self {
            Self::Video(frame) => frame.as_bytes().to_vec(),
            Self::Centroid(c) => format!("X:{},Y:{}", c.x, c.y).into_bytes(),
            Self::Pressure(p) => format!("P:{}", p.pressure).into_bytes(),
            Self::Gps(g) => format!("LAT:{},LON:{}", g.latitude, g.longitude).into_bytes(),
            Self::Battery(b) => format!("V:{:.2}", b.voltage).into_bytes(),
        }
    }
}

/// `X:<num>,Y:<num>`
pub fn decode_centroid(payload: &[u8]) -> Result<CentroidSample, DecodeError> {
    let [x, y] = fields(text(payload)?, ["X", "Y"])?;
    Ok(CentroidSample { x: parse_number("X", x)?, y: parse_number("Y", y)? })
}

/// `P:<num>`; altitude is derived on the spot.
pub fn decode_pressure(payload: &[u8]) -> Result<PressureSample, DecodeError> {
    let [p] = fields(text(payload)?, ["P"])?;
    Ok(PressureSample::from_pressure(parse_number("P", p)?))
}

/// `LAT:<num>,LON:<num>`
pub fn decode_gps(payload: &[u8]) -> Result<GpsSample, DecodeError> {
    let [lat, lon] = fields(text(payload)?, ["LAT", "LON"])?;
    Ok(GpsSample { latitude: parse_number("LAT", lat)?, longitude: parse_number("LON", lon)? })
}

/// `V:<num>`; percentage is derived on the spot.
pub fn decode_battery(payload: &[u8]) -> Result<BatterySample, DecodeError> {
    let [v] = fields(text(payload)?, ["V"])?;
    Ok(BatterySample::from_voltage(parse_number("V", v)?))
}

fn text(payload: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(payload)
        .map(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '\0'))
        .map_err(|_| DecodeError::Utf8)
}

/// Split `text` on commas and strip the expected `KEY:` prefix from each part.
///
/// Parts beyond `keys.len()` are ignored.
fn fields<'a, const N: usize>(
    text: &'a str,
    keys: [&'static str; N],
) -> Result<[&'a str; N], DecodeError> {
    let mut parts = text.split(',');
    let mut out = [""; N];
    for (slot, key) in out.iter_mut().zip(keys) {
        let part = parts.next().ok_or(DecodeError::MissingField { field: key })?;
        *slot = part
            .trim()
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::trim)
            .ok_or(DecodeError::MissingField { field: key })?;
    }
    Ok(out)
}

fn parse_number<T>(field: &'static str, raw: &str) -> Result<T, DecodeError>
where
    T: std::str::FromStr + Into<f64> + Copy,
{
    raw.parse::<T>()
        .ok()
        .filter(|v| Into::<f64>::into(*v).is_finite())
        .ok_or_else(|| DecodeError::InvalidNumber { field, value: raw.to_string() })
}
