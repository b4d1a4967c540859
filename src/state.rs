//! Observable link state.
//!
//! Every externally visible value lives in its own `watch` channel. The
//! [`StateWriter`] half is held by the session task, the processing gate and
//! the signal sampler; each field has exactly one writer at a time. Any number
//! of [`StreamState`] handles can read the latest value or follow changes as a
//! `Stream`.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::stream::ThrottleExt;
use crate::types::{
    BatterySample, CentroidSample, Classification, ConnectionStatus, GpsSample, PressureSample,
    SignalLevel, UpdateRate, VideoFrame,
};

/// Write half of the link state.
#[derive(Debug)]
pub struct StateWriter {
    status: watch::Sender<ConnectionStatus>,
    video: watch::Sender<Option<Arc<VideoFrame>>>,
    centroid: watch::Sender<Option<CentroidSample>>,
    pressure: watch::Sender<PressureSample>,
    gps: watch::Sender<GpsSample>,
    battery: watch::Sender<BatterySample>,
    classifications: watch::Sender<Arc<[Classification]>>,
    signal: watch::Sender<SignalLevel>,
}

impl StateWriter {
    /// Create a writer with every field at its initial value.
    pub fn new() -> Self {
        Self {
            status: watch::Sender::new(ConnectionStatus::Disconnected),
            video: watch::Sender::new(None),
            centroid: watch::Sender::new(None),
            pressure: watch::Sender::new(PressureSample::default()),
            gps: watch::Sender::new(GpsSample::default()),
            battery: watch::Sender::new(BatterySample::default()),
            classifications: watch::Sender::new(Arc::from(Vec::new())),
            signal: watch::Sender::new(SignalLevel::None),
        }
    }

    /// A fresh read handle.
    pub fn reader(&self) -> StreamState {
        StreamState {
            status: self.status.subscribe(),
            video: self.video.subscribe(),
            centroid: self.centroid.subscribe(),
            pressure: self.pressure.subscribe(),
            gps: self.gps.subscribe(),
            battery: self.battery.subscribe(),
            classifications: self.classifications.subscribe(),
            signal: self.signal.subscribe(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::info!(from = %previous, to = %status, "connection status changed");
        }
    }

    pub fn set_video(&self, frame: Arc<VideoFrame>) {
        self.video.send_replace(Some(frame));
    }

    pub fn set_centroid(&self, sample: CentroidSample) {
        self.centroid.send_replace(Some(sample));
    }

    pub fn set_pressure(&self, sample: PressureSample) {
        self.pressure.send_replace(sample);
    }

    pub fn set_gps(&self, sample: GpsSample) {
        self.gps.send_replace(sample);
    }

    pub fn set_battery(&self, sample: BatterySample) {
        self.battery.send_replace(sample);
    }

    pub fn set_classifications(&self, results: Vec<Classification>) {
        self.classifications.send_replace(Arc::from(results));
    }

    pub fn set_signal(&self, level: SignalLevel) {
        self.signal.send_if_modified(|current| {
            let changed = *current != level;
            *current = level;
            changed
        });
    }

    /// Clear the per-session telemetry.
    ///
    /// The centroid becomes absent; pressure, GPS and battery return to their
    /// zeroed defaults. The last video frame and classification results are
    /// left as they are.
    pub fn reset_telemetry(&self) {
        self.centroid.send_replace(None);
        self.pressure.send_replace(PressureSample::default());
        self.gps.send_replace(GpsSample::default());
        self.battery.send_replace(BatterySample::default());
    }
}

impl Default for StateWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the link state.
///
/// Cheap to clone. Reads never block the writers.
#[derive(Debug, Clone)]
pub struct StreamState {
    status: watch::Receiver<ConnectionStatus>,
    video: watch::Receiver<Option<Arc<VideoFrame>>>,
    centroid: watch::Receiver<Option<CentroidSample>>,
    pressure: watch::Receiver<PressureSample>,
    gps: watch::Receiver<GpsSample>,
    battery: watch::Receiver<BatterySample>,
    classifications: watch::Receiver<Arc<[Classification]>>,
    signal: watch::Receiver<SignalLevel>,
}

impl StreamState {
    pub fn connection_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Most recent complete video frame, kept across disconnects.
    pub fn video_frame(&self) -> Option<Arc<VideoFrame>> {
        self.video.borrow().clone()
    }

    /// Absent until the first valid sample of a session.
    pub fn centroid(&self) -> Option<CentroidSample> {
        *self.centroid.borrow()
    }

    pub fn pressure(&self) -> PressureSample {
        *self.pressure.borrow()
    }

    pub fn gps(&self) -> GpsSample {
        *self.gps.borrow()
    }

    pub fn battery(&self) -> BatterySample {
        *self.battery.borrow()
    }

    /// Latest classifier output, at most five entries.
    pub fn classifications(&self) -> Arc<[Classification]> {
        self.classifications.borrow().clone()
    }

    pub fn signal_level(&self) -> SignalLevel {
        *self.signal.borrow()
    }

    /// Copy of every field except the raster bytes.
    ///
    /// Fields are read one after another, so the snapshot is not atomic
    /// across fields.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            status: self.connection_status(),
            has_video: self.video.borrow().is_some(),
            centroid: self.centroid(),
            pressure: self.pressure(),
            gps: self.gps(),
            battery: self.battery(),
            classifications: self.classifications().to_vec(),
            signal: self.signal_level(),
        }
    }

    /// Status changes, starting with the current status.
    pub fn status_changes(&self) -> impl Stream<Item = ConnectionStatus> + 'static {
        WatchStream::new(self.status.clone())
    }

    /// Video frames as they arrive, optionally rate limited.
    ///
    /// Yields the current frame first if one exists.
    pub fn video_frames(&self, rate: UpdateRate) -> impl Stream<Item = Arc<VideoFrame>> + 'static {
        let frames = WatchStream::new(self.video.clone()).filter_map(|frame| async move { frame });
        match rate.throttle_interval() {
            None => frames.boxed(),
            Some(period) => frames.throttle(period).boxed(),
        }
    }

    /// Battery samples; a zeroed sample marks a reset on disconnect.
    pub fn battery_updates(&self) -> impl Stream<Item = BatterySample> + 'static {
        WatchStream::new(self.battery.clone())
    }

    pub fn classification_updates(&self) -> impl Stream<Item = Arc<[Classification]>> + 'static {
        WatchStream::new(self.classifications.clone())
    }

    pub fn signal_updates(&self) -> impl Stream<Item = SignalLevel> + 'static {
        WatchStream::new(self.signal.clone())
    }

    /// Wait until the connection status satisfies `pred` and return it.
    ///
    /// Returns immediately if the current status already matches. Returns
    /// `None` if the writer is gone before a match is seen.
    pub async fn wait_for_status<F>(&self, mut pred: F) -> Option<ConnectionStatus>
    where
        F: FnMut(ConnectionStatus) -> bool,
    {
        let mut rx = self.status.clone();
        rx.wait_for(|status| pred(*status)).await.ok().map(|status| *status)
    }
}

/// Serializable point-in-time copy of [`StreamState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub status: ConnectionStatus,
    pub has_video: bool,
    pub centroid: Option<CentroidSample>,
    pub pressure: PressureSample,
    pub gps: GpsSample,
    pub battery: BatterySample,
    pub classifications: Vec<Classification>,
    pub signal: SignalLevel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VIDEO_FRAME_LEN;
    use std::time::Duration;

    fn frame(fill: u8) -> Arc<VideoFrame> {
        Arc::new(VideoFrame::from_rgb565(vec![fill; VIDEO_FRAME_LEN]).unwrap())
    }

    #[test]
    fn initial_state_is_empty() {
        let state = StateWriter::new().reader();
        assert_eq!(state.connection_status(), ConnectionStatus::Disconnected);
        assert!(state.video_frame().is_none());
        assert!(state.centroid().is_none());
        assert_eq!(state.pressure(), PressureSample::default());
        assert_eq!(state.gps(), GpsSample::default());
        assert_eq!(state.battery(), BatterySample::default());
        assert!(state.classifications().is_empty());
        assert_eq!(state.signal_level(), SignalLevel::None);
    }

    #[test]
    fn readers_see_writes() {
        let writer = StateWriter::new();
        let state = writer.reader();
        writer.set_status(ConnectionStatus::Connected);
        writer.set_gps(GpsSample { latitude: 1.0, longitude: 2.0 });
        writer.set_battery(BatterySample::from_voltage(3.7));

        let other = state.clone();
        assert_eq!(other.connection_status(), ConnectionStatus::Connected);
        assert_eq!(other.gps(), GpsSample { latitude: 1.0, longitude: 2.0 });
        assert_eq!(other.battery().percentage, 50);
    }

    #[test]
    fn reset_keeps_video_and_classifications() {
        let writer = StateWriter::new();
        let state = writer.reader();
        writer.set_video(frame(1));
        writer.set_classifications(vec![Classification::new("rock", 0.9)]);
        writer.set_centroid(CentroidSample { x: 1.0, y: 2.0 });
        writer.set_pressure(PressureSample::from_pressure(1000.0));
        writer.set_gps(GpsSample { latitude: 1.0, longitude: 2.0 });
        writer.set_battery(BatterySample::from_voltage(4.0));

        writer.reset_telemetry();

        assert!(state.centroid().is_none());
        assert_eq!(state.pressure(), PressureSample { pressure: 0.0, altitude: 0.0 });
        assert_eq!(state.gps(), GpsSample { latitude: 0.0, longitude: 0.0 });
        assert_eq!(state.battery(), BatterySample { voltage: 0.0, percentage: 0 });
        assert!(state.video_frame().is_some());
        assert_eq!(state.classifications().len(), 1);
    }

    #[test]
    fn writes_succeed_without_readers() {
        let writer = StateWriter::new();
        writer.set_status(ConnectionStatus::Connecting);
        writer.set_signal(SignalLevel::Good);
        assert_eq!(writer.status(), ConnectionStatus::Connecting);
        assert_eq!(writer.reader().signal_level(), SignalLevel::Good);
    }

    #[test]
    fn snapshot_serializes_to_yaml() {
        let writer = StateWriter::new();
        writer.set_status(ConnectionStatus::Connected);
        writer.set_battery(BatterySample::from_voltage(3.7));
        writer.set_video(frame(0));

        let snapshot = writer.reader().snapshot();
        assert!(snapshot.has_video);

        let yaml = serde_yaml_ng::to_string(&snapshot).unwrap();
        assert!(yaml.contains("status: Connected"), "{yaml}");
        let back: StateSnapshot = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(back, snapshot);
    }

    #[tokio::test]
    async fn status_stream_starts_with_current_value() {
        let writer = StateWriter::new();
        let state = writer.reader();
        let mut statuses = state.status_changes();

        assert_eq!(statuses.next().await, Some(ConnectionStatus::Disconnected));
        writer.set_status(ConnectionStatus::Connecting);
        assert_eq!(statuses.next().await, Some(ConnectionStatus::Connecting));
    }

    #[tokio::test]
    async fn wait_for_status_resolves_on_match() {
        let writer = Arc::new(StateWriter::new());
        let state = writer.reader();

        let task = {
            let writer = Arc::clone(&writer);
            tokio::spawn(async move {
                writer.set_status(ConnectionStatus::Connecting);
                writer.set_status(ConnectionStatus::Error);
            })
        };

        let status = state.wait_for_status(ConnectionStatus::is_terminal).await;
        task.await.unwrap();
        assert_eq!(status, Some(ConnectionStatus::Error));
    }

    #[tokio::test]
    async fn wait_for_status_returns_none_when_writer_dropped() {
        let writer = StateWriter::new();
        let state = writer.reader();
        drop(writer);
        let status = state.wait_for_status(|s| s == ConnectionStatus::Connected).await;
        assert_eq!(status, None);
    }

    #[tokio::test(start_paused = true)]
    async fn video_stream_skips_until_first_frame() {
        let writer = StateWriter::new();
        let state = writer.reader();
        let mut frames = state.video_frames(UpdateRate::Native);

        let pending = tokio::time::timeout(Duration::from_millis(10), frames.next()).await;
        assert!(pending.is_err());

        writer.set_video(frame(7));
        let got = frames.next().await.unwrap();
        assert_eq!(got.as_bytes()[0], 7);
    }
}
