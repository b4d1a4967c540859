//! Object detection results

use serde::{Deserialize, Serialize};

/// Maximum number of detections kept from a single classifier run.
pub const MAX_CLASSIFICATIONS: usize = 5;

/// One labelled detection with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub score: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self { label: label.into(), score }
    }
}
