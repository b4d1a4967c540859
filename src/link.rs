//! Control surface for the rover link.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::connector::Connector;
use crate::gate::{Classifier, ProcessingGate};
use crate::reader::{SessionSummary, StreamReader};
use crate::sampler::RssiReader;
use crate::state::{StateWriter, StreamState};
use crate::types::ConnectionStatus;

/// A restartable connection to the rover.
///
/// `start()` launches a session in the background and `stop()` ends it; both
/// are idempotent. Everything the session produces is observed through
/// [`Link::state`]. Dropping the link stops the current session.
///
/// ```no_run
/// use std::sync::Arc;
/// use marcs_link::{Link, LinkConfig, NoDetections, StaticRssi};
///
/// # async fn run() {
/// let config = LinkConfig::default();
/// let connector = Arc::new(config.tcp_connector());
/// let link = Link::new(config, connector, Arc::new(NoDetections), Arc::new(StaticRssi(None)));
///
/// link.start();
/// let state = link.state();
/// println!("battery at {}%", state.battery().percentage);
/// link.shutdown().await;
/// # }
/// ```
pub struct Link {
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    rssi: Arc<dyn RssiReader>,
    writer: Arc<StateWriter>,
    gate: Arc<ProcessingGate>,
    session: Mutex<Option<Session>>,
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<SessionSummary>,
}

impl Link {
    pub fn new(
        config: LinkConfig,
        connector: Arc<dyn Connector>,
        classifier: Arc<dyn Classifier>,
        rssi: Arc<dyn RssiReader>,
    ) -> Self {
        let writer = Arc::new(StateWriter::new());
        let gate = Arc::new(ProcessingGate::new(
            classifier,
            Arc::clone(&writer),
            config.detection_interval(),
        ));
        Self { config, connector, rssi, writer, gate, session: Mutex::new(None) }
    }

    /// Start a session unless one is already running.
    ///
    /// Returns `false` and does nothing while the link is connecting or
    /// connected. Allowed again after the previous session ended in
    /// `Disconnected` or `Error`. Must be called inside a tokio runtime.
    pub fn start(&self) -> bool {
        let mut session = self.session();
        // The previous task publishes its terminal status as its last write,
        // so a terminal status means it is safe to replace.
        if self.writer.status().is_active() {
            debug!("start ignored, session already active");
            return false;
        }

        let cancel = CancellationToken::new();
        self.writer.set_status(ConnectionStatus::Connecting);

        let reader = StreamReader::new(
            Arc::clone(&self.connector),
            Arc::clone(&self.writer),
            Arc::clone(&self.gate),
            Arc::clone(&self.rssi),
        )
        .with_read_timeout(Some(self.config.read_timeout()))
        .with_signal_period(self.config.signal_poll_interval());

        info!(endpoint = %self.connector.describe(), "starting session");
        let task = tokio::spawn(reader.run(cancel.clone()));
        *session = Some(Session { cancel, task });
        true
    }

    /// Request the current session to end. No effect when idle.
    ///
    /// Returns immediately; the session publishes `Disconnected` once its
    /// read loop has unwound. An in-flight classification still completes.
    pub fn stop(&self) {
        if let Some(session) = self.session().as_ref() {
            if !session.cancel.is_cancelled() {
                info!("stopping session");
            }
            session.cancel.cancel();
        }
    }

    /// Stop and wait for the session to finish, returning its summary.
    ///
    /// Returns `None` if no session was ever started or it was already
    /// collected.
    pub async fn shutdown(&self) -> Option<SessionSummary> {
        let session = self.session().take()?;
        session.cancel.cancel();
        match session.task.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                debug!(error = %e, "session task ended abnormally");
                None
            }
        }
    }

    /// Read handle for everything the link publishes.
    pub fn state(&self) -> StreamState {
        self.writer.reader()
    }

    /// Whether a session task is currently running.
    pub fn is_active(&self) -> bool {
        self.session().as_ref().is_some_and(Session::is_running)
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Session {
    fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        debug!("dropping link");
        self.stop();
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("endpoint", &self.connector.describe())
            .field("status", &self.writer.status())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
