//! Update rate control for observation streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate at which an observer wants to receive updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every published value
    Native,

    /// At most this many values per second, latest wins
    Max(u32),
}

impl UpdateRate {
    /// Throttle interval, or `None` when every value should be delivered.
    ///
    /// `Max(0)` is treated as `Native`.
    pub fn throttle_interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}
