//! Coarse link-quality classification

use serde::{Deserialize, Serialize};

/// RSSI assumed when no reading is available.
pub const MISSING_RSSI_DBM: i32 = -100;

/// Link quality bucket derived from an RSSI reading in dBm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum SignalLevel {
    /// Not sampling.
    #[default]
    None,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SignalLevel {
    pub fn from_rssi(rssi: i32) -> Self {
        match rssi {
            r if r >= -55 => Self::Excellent,
            r if r >= -67 => Self::Good,
            r if r >= -80 => Self::Fair,
            _ => Self::Poor,
        }
    }

    /// A missing reading counts as the worst case, not as a failure.
    pub fn from_reading(rssi: Option<i32>) -> Self {
        Self::from_rssi(rssi.unwrap_or(MISSING_RSSI_DBM))
    }
}
