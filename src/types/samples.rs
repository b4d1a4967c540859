//! Telemetry samples decoded from the text messages

use serde::{Deserialize, Serialize};

/// Standard sea-level reference pressure in hPa.
pub const SEA_LEVEL_PRESSURE_HPA: f32 = 1013.25;

/// Battery voltage treated as empty.
pub const BATTERY_EMPTY_VOLTS: f32 = 3.2;

/// Battery voltage treated as full.
pub const BATTERY_FULL_VOLTS: f32 = 4.2;

/// Tracked object centroid in camera coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CentroidSample {
    pub x: f32,
    pub y: f32,
}

/// Barometric reading with its derived altitude.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PressureSample {
    /// Pressure in hPa.
    pub pressure: f32,
    /// Altitude in metres, always derived from `pressure`.
    pub altitude: f32,
}

impl PressureSample {
    pub fn from_pressure(pressure: f32) -> Self {
        Self { pressure, altitude: altitude_from_pressure(pressure) }
    }
}

/// International barometric formula against [`SEA_LEVEL_PRESSURE_HPA`].
pub fn altitude_from_pressure(pressure: f32) -> f32 {
    44_330.0 * (1.0 - (pressure / SEA_LEVEL_PRESSURE_HPA).powf(1.0 / 5.255))
}

/// GPS fix in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GpsSample {
    pub latitude: f64,
    pub longitude: f64,
}

/// Battery reading with its charge estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatterySample {
    /// Cell voltage in volts.
    pub voltage: f32,
    /// Linear charge estimate in `0..=100`.
    pub percentage: u8,
}

impl BatterySample {
    /// Linear charge estimate between 3.2 V (0 %) and 4.2 V (100 %), clamped.
    ///
    /// Partial percent points are truncated: 3.999 V reads 79 %.
    pub fn from_voltage(voltage: f32) -> Self {
        let span = f64::from(BATTERY_FULL_VOLTS) - f64::from(BATTERY_EMPTY_VOLTS);
        let ratio = (f64::from(voltage) - f64::from(BATTERY_EMPTY_VOLTS)) / span;
        let percentage = (ratio * 100.0).trunc().clamp(0.0, 100.0) as u8;
        Self { voltage, percentage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn battery_percentage_reference_points() {
        assert_eq!(BatterySample::from_voltage(3.2).percentage, 0);
        assert_eq!(BatterySample::from_voltage(3.7).percentage, 50);
        assert_eq!(BatterySample::from_voltage(4.2).percentage, 100);
    }

    #[test]
    fn battery_percentage_truncates_between_reference_points() {
        assert_eq!(BatterySample::from_voltage(3.999).percentage, 79);
        assert_eq!(BatterySample::from_voltage(3.455).percentage, 25);
        assert_eq!(BatterySample::from_voltage(4.199).percentage, 99);
    }

    #[test]
    fn battery_percentage_clamps() {
        assert_eq!(BatterySample::from_voltage(5.0).percentage, 100);
        assert_eq!(BatterySample::from_voltage(2.0).percentage, 0);
        assert_eq!(BatterySample::from_voltage(-1.0).percentage, 0);
    }

    #[test]
    fn battery_keeps_raw_voltage() {
        let sample = BatterySample::from_voltage(3.7);
        assert!((sample.voltage - 3.7).abs() < f32::EPSILON);
    }

    #[test]
    fn sea_level_pressure_is_zero_altitude() {
        let sample = PressureSample::from_pressure(SEA_LEVEL_PRESSURE_HPA);
        assert!(sample.altitude.abs() < 0.01, "altitude = {}", sample.altitude);
    }

    #[test]
    fn lower_pressure_is_higher_altitude() {
        // ~899 hPa corresponds to roughly 1000 m in the standard atmosphere.
        let altitude = altitude_from_pressure(898.76);
        assert!((altitude - 1000.0).abs() < 5.0, "altitude = {altitude}");
        assert!(altitude_from_pressure(1030.0) < 0.0);
    }

    #[test]
    fn defaults_are_zeroed() {
        assert_eq!(GpsSample::default(), GpsSample { latitude: 0.0, longitude: 0.0 });
        assert_eq!(BatterySample::default().percentage, 0);
        assert_eq!(PressureSample::default(), PressureSample { pressure: 0.0, altitude: 0.0 });
    }

    proptest! {
        #[test]
        fn battery_percentage_always_in_range(voltage in -10.0f32..20.0f32) {
            let sample = BatterySample::from_voltage(voltage);
            prop_assert!(sample.percentage <= 100);
        }

        #[test]
        fn altitude_decreases_with_pressure(a in 300.0f32..1100.0f32, b in 300.0f32..1100.0f32) {
            prop_assume!((a - b).abs() > 0.5);
            let (low, high) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(altitude_from_pressure(low) > altitude_from_pressure(high));
        }
    }
}
