//! Single-flight, rate-limited object detection.
//!
//! [`ProcessingGate::offer`] is called from the read loop for every decoded
//! video frame and never waits. At most one classification runs at a time, and
//! a new one starts no sooner than `min_interval` after the previous start.
//! Frames that arrive while the gate is closed are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::Result;
use crate::state::StateWriter;
use crate::types::{Classification, MAX_CLASSIFICATIONS, VideoFrame};

/// Default minimum time between two classification starts.
pub const DEFAULT_DETECTION_INTERVAL: Duration = Duration::from_millis(250);

/// Object detector run on decoded video frames.
///
/// Implementations own their own model and thresholds. Results beyond
/// [`MAX_CLASSIFICATIONS`] are discarded by the gate.
#[async_trait]
pub trait Classifier: Send + Sync + 'static {
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<Classification>>;
}

/// Classifier that never detects anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetections;

#[async_trait]
impl Classifier for NoDetections {
    async fn detect(&self, _frame: &VideoFrame) -> Result<Vec<Classification>> {
        Ok(Vec::new())
    }
}

/// What happened to an offered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// A classification task was spawned for the frame.
    Scheduled,
    /// A classification is already in flight.
    Busy,
    /// The previous classification started less than `min_interval` ago.
    RateLimited,
}

pub struct ProcessingGate {
    classifier: Arc<dyn Classifier>,
    state: Arc<StateWriter>,
    min_interval: Duration,
    busy: Arc<AtomicBool>,
    last_started: Mutex<Option<Instant>>,
}

impl ProcessingGate {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        state: Arc<StateWriter>,
        min_interval: Duration,
    ) -> Self {
        Self {
            classifier,
            state,
            min_interval,
            busy: Arc::new(AtomicBool::new(false)),
            last_started: Mutex::new(None),
        }
    }

    /// Whether a classification is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Offer a frame for classification. Must be called inside a tokio runtime.
    pub fn offer(&self, frame: Arc<VideoFrame>, now: Instant) -> GateDecision {
        if self.busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            trace!("classifier busy, frame dropped");
            return GateDecision::Busy;
        }
        let guard = BusyGuard(Arc::clone(&self.busy));

        {
            let mut last = self.last_started.lock().unwrap_or_else(PoisonError::into_inner);
            let too_soon = (*last)
                .is_some_and(|previous| now.saturating_duration_since(previous) < self.min_interval);
            if too_soon {
                trace!("detection rate limited, frame dropped");
                return GateDecision::RateLimited;
            }
            *last = Some(now);
        }

        let classifier = Arc::clone(&self.classifier);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let _guard = guard;
            match classifier.detect(&frame).await {
                Ok(mut results) => {
                    results.truncate(MAX_CLASSIFICATIONS);
                    debug!(count = results.len(), "classification complete");
                    state.set_classifications(results);
                }
                Err(e) => warn!(error = %e, "classification failed"),
            }
        });
        GateDecision::Scheduled
    }
}

impl std::fmt::Debug for ProcessingGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingGate")
            .field("min_interval", &self.min_interval)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

/// Clears the busy flag when dropped, including on early return or panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
