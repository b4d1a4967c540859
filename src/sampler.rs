//! Periodic Wi-Fi signal sampling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::state::StateWriter;
use crate::types::{MISSING_RSSI_DBM, SignalLevel};

/// Default sampling period.
pub const DEFAULT_SIGNAL_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Kernel wireless statistics on Linux.
pub const PROC_NET_WIRELESS: &str = "/proc/net/wireless";

/// Source of the current RSSI in dBm.
///
/// `None` means no reading is available right now; the sampler treats that as
/// the worst case rather than as an error.
#[async_trait]
pub trait RssiReader: Send + Sync + 'static {
    async fn current_rssi(&self) -> Option<i32>;
}

/// Fixed reading, or no reading at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRssi(pub Option<i32>);

#[async_trait]
impl RssiReader for StaticRssi {
    async fn current_rssi(&self) -> Option<i32> {
        self.0
    }
}

/// Reads the signal level column of `/proc/net/wireless`.
#[derive(Debug, Clone)]
pub struct ProcNetWireless {
    path: PathBuf,
    interface: Option<String>,
}

impl ProcNetWireless {
    /// Use the first interface listed, or only `interface` when given.
    pub fn new(interface: Option<String>) -> Self {
        Self::with_path(PROC_NET_WIRELESS, interface)
    }

    pub fn with_path(path: impl Into<PathBuf>, interface: Option<String>) -> Self {
        Self { path: path.into(), interface }
    }
}

#[async_trait]
impl RssiReader for ProcNetWireless {
    async fn current_rssi(&self) -> Option<i32> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => parse_wireless_level(&text, self.interface.as_deref()),
            Err(e) => {
                trace!(path = %self.path.display(), error = %e, "wireless stats unavailable");
                None
            }
        }
    }
}

/// Extract the signal level in dBm from `/proc/net/wireless` contents.
///
/// Levels reported as positive values use the legacy unsigned encoding and are
/// shifted down by 256.
pub fn parse_wireless_level(text: &str, interface: Option<&str>) -> Option<i32> {
    text.lines().skip(2).find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if interface.is_some_and(|wanted| wanted != name.trim()) {
            return None;
        }
        let level: f32 = rest.split_whitespace().nth(2)?.trim_end_matches('.').parse().ok()?;
        let level = level as i32;
        Some(if level > 0 { level - 256 } else { level })
    })
}

/// Background task publishing [`SignalLevel`] on a fixed cadence.
pub struct SignalSampler;

impl SignalSampler {
    /// Start sampling immediately and then every `period`.
    ///
    /// The task stops when `cancel` fires and leaves [`SignalLevel::None`] behind.
    pub fn spawn(
        reader: Arc<dyn RssiReader>,
        state: Arc<StateWriter>,
        period: Duration,
        cancel: CancellationToken,
    ) -> SamplerHandle {
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {}
                }
                let rssi = tokio::select! {
                    _ = token.cancelled() => break,
                    rssi = reader.current_rssi() => rssi,
                };
                let level = SignalLevel::from_reading(rssi);
                trace!(rssi = rssi.unwrap_or(MISSING_RSSI_DBM), ?level, "signal sampled");
                state.set_signal(level);
            }

            state.set_signal(SignalLevel::None);
            debug!("signal sampler stopped");
        });
        SamplerHandle { cancel, task }
    }
}

/// Owner of a running sampler task.
#[derive(Debug)]
pub struct SamplerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Cancel the task and wait until it has published [`SignalLevel::None`].
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            debug!(error = %e, "signal sampler task ended abnormally");
        }
    }
}
