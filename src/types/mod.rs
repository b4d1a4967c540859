//! Core value types published by the link.
//!
//! Everything a UI layer can observe is defined here:
//! - [`ConnectionStatus`] for the connection lifecycle
//! - [`VideoFrame`] for the 320×240 RGB565 camera raster
//! - [`CentroidSample`], [`PressureSample`], [`GpsSample`], [`BatterySample`] for telemetry
//! - [`Classification`] for object detection results
//! - [`SignalLevel`] for the coarse link quality
//! - [`UpdateRate`] for rate-limited observation streams
//!
//! ## Usage Example
//!
//! ```rust
//! use marcs_link::types::{BatterySample, PressureSample, SignalLevel};
//!
//! let battery = BatterySample::from_voltage(3.7);
//! assert_eq!(battery.percentage, 50);
//!
//! let pressure = PressureSample::from_pressure(1013.25);
//! assert!(pressure.altitude.abs() < 0.01);
//!
//! assert_eq!(SignalLevel::from_rssi(-60), SignalLevel::Good);
//! ```

mod classification;
mod frame;
mod samples;
mod signal;
mod status;
mod update_rate;

pub use classification::{Classification, MAX_CLASSIFICATIONS};
pub use frame::{BYTES_PER_PIXEL, VIDEO_FRAME_LEN, VIDEO_HEIGHT, VIDEO_WIDTH, VideoFrame};
pub use samples::{
    BATTERY_EMPTY_VOLTS, BATTERY_FULL_VOLTS, BatterySample, CentroidSample, GpsSample,
    PressureSample, SEA_LEVEL_PRESSURE_HPA, altitude_from_pressure,
};
pub use signal::{MISSING_RSSI_DBM, SignalLevel};
pub use status::ConnectionStatus;
pub use update_rate::UpdateRate;
