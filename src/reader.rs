//! One connection attempt, from connect to teardown.
//!
//! A [`StreamReader`] owns the decode loop for a single session. It moves the
//! connection status through `Connecting → Connected → Disconnected | Error`,
//! routes every decoded message into the shared state, and on the way out
//! stops the signal sampler and clears the per-session telemetry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::{Frame, FrameCodec, FrameOutcome};
use crate::connector::Connector;
use crate::gate::ProcessingGate;
use crate::messages::{Message, MessageKind};
use crate::sampler::{RssiReader, SignalSampler};
use crate::state::StateWriter;
use crate::types::ConnectionStatus;

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Terminal status the session published.
    pub status: ConnectionStatus,
    pub frames: u64,
    pub resyncs: u64,
    /// Frames that were well framed but carried an unknown type or a bad payload.
    pub decode_failures: u64,
    /// Bytes skipped while searching for a start marker.
    pub discarded_bytes: u64,
}

pub struct StreamReader {
    connector: Arc<dyn Connector>,
    state: Arc<StateWriter>,
    gate: Arc<ProcessingGate>,
    rssi: Arc<dyn RssiReader>,
    read_timeout: Option<Duration>,
    signal_period: Duration,
}

impl StreamReader {
    pub fn new(
        connector: Arc<dyn Connector>,
        state: Arc<StateWriter>,
        gate: Arc<ProcessingGate>,
        rssi: Arc<dyn RssiReader>,
    ) -> Self {
        Self {
            connector,
            state,
            gate,
            rssi,
            read_timeout: Some(crate::config::DEFAULT_READ_TIMEOUT),
            signal_period: crate::sampler::DEFAULT_SIGNAL_POLL_INTERVAL,
        }
    }

    /// Fail the session after this long without readable bytes. `None` waits forever.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_signal_period(mut self, period: Duration) -> Self {
        self.signal_period = period;
        self
    }

    /// Run the session until the source ends, fails, or `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> SessionSummary {
        let endpoint = self.connector.describe();
        self.state.set_status(ConnectionStatus::Connecting);

        let sampler = SignalSampler::spawn(
            Arc::clone(&self.rssi),
            Arc::clone(&self.state),
            self.signal_period,
            cancel.child_token(),
        );

        let mut summary = SessionSummary::default();
        let status = self.stream(&endpoint, &cancel, &mut summary).await;
        summary.status = status;

        sampler.stop().await;
        self.state.reset_telemetry();
        self.state.set_status(summary.status);

        info!(
            %endpoint,
            status = %summary.status,
            frames = summary.frames,
            resyncs = summary.resyncs,
            decode_failures = summary.decode_failures,
            discarded_bytes = summary.discarded_bytes,
            "session ended"
        );
        summary
    }

    /// Connect and decode until a terminal status is reached.
    async fn stream(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
        summary: &mut SessionSummary,
    ) -> ConnectionStatus {
        let connected = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%endpoint, "stopped while connecting");
                return ConnectionStatus::Disconnected;
            }
            result = self.connector.connect() => result,
        };
        let source = match connected {
            Ok(source) => source,
            Err(e) => {
                warn!(%endpoint, error = %e, "connection failed");
                return failure_status(cancel);
            }
        };

        self.state.set_status(ConnectionStatus::Connected);
        let mut codec = FrameCodec::with_read_timeout(source, self.read_timeout);

        let status = loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(%endpoint, "read loop cancelled");
                    break ConnectionStatus::Disconnected;
                }
                outcome = codec.next_outcome() => outcome,
            };

            match outcome {
                Ok(FrameOutcome::Frame(frame)) => {
                    if !self.dispatch(frame) {
                        summary.decode_failures += 1;
                    }
                }
                Ok(FrameOutcome::Resync(reason)) => debug!(%reason, "resynchronizing"),
                Ok(FrameOutcome::EndOfStream) => {
                    info!(%endpoint, "rover closed the stream");
                    break ConnectionStatus::Disconnected;
                }
                Err(e) => {
                    if !cancel.is_cancelled() {
                        warn!(%endpoint, error = %e, "stream failed");
                    }
                    break failure_status(cancel);
                }
            }
        };

        let stats = codec.stats();
        summary.frames = stats.frames;
        summary.resyncs = stats.resyncs;
        summary.discarded_bytes = stats.discarded_bytes;
        status
    }

    /// Decode one frame and publish it. Returns `false` if the frame was dropped.
    fn dispatch(&self, frame: Frame) -> bool {
        let frame_type = frame.frame_type;
        let kind = match MessageKind::try_from(frame_type) {
            Ok(kind) => kind,
            Err(_) => {
                warn!(frame_type, len = frame.payload.len(), "unknown frame type dropped");
                return false;
            }
        };

        let message = match Message::decode_payload(kind, frame.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(%kind, error = %e, "undecodable payload dropped");
                return false;
            }
        };
        trace!(%kind, "message decoded");

        match message {
            Message::Video(frame) => {
                let frame = Arc::new(frame);
                self.state.set_video(Arc::clone(&frame));
                let decision = self.gate.offer(frame, Instant::now());
                trace!(?decision, "video frame offered to classifier");
            }
            Message::Centroid(sample) => self.state.set_centroid(sample),
            Message::Pressure(sample) => self.state.set_pressure(sample),
            Message::Gps(sample) => self.state.set_gps(sample),
            Message::Battery(sample) => self.state.set_battery(sample),
        }
        true
    }
}

/// A failure caused by a deliberate stop is not an error.
fn failure_status(cancel: &CancellationToken) -> ConnectionStatus {
    if cancel.is_cancelled() {
        ConnectionStatus::Disconnected
    } else {
        ConnectionStatus::Error
    }
}
