//! Byte sources for a link session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::{LinkError, Result};

/// Default rover access point address.
pub const DEFAULT_HOST: &str = "192.168.4.1";

/// Default rover stream port.
pub const DEFAULT_PORT: u16 = 8888;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An open byte stream handed to the frame codec.
pub type BoxedSource = Box<dyn AsyncRead + Send + Unpin>;

/// Opens a new byte source for every session.
///
/// Connectors are shared between sessions, so `connect` may be called again
/// after a previous source ended or failed.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<BoxedSource>;

    /// Human readable description of the endpoint, used in logs.
    fn describe(&self) -> String;
}

/// Connects to the rover over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<BoxedSource> {
        let address = self.describe();
        debug!(%address, timeout = ?self.connect_timeout, "connecting");

        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| {
            LinkError::connection_failed(format!(
                "{address}: no answer within {:?}",
                self.connect_timeout
            ))
        })?
        .map_err(|e| LinkError::connection_failed_with_source(address.clone(), Box::new(e)))?;

        stream.set_nodelay(true)?;
        info!(%address, "connected to rover");
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Feeds a recorded capture of the raw stream through the pipeline.
///
/// The session ends with a clean end-of-stream once the file is exhausted.
#[derive(Debug, Clone)]
pub struct ReplayConnector {
    path: PathBuf,
}

impl ReplayConnector {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

#[async_trait]
impl Connector for ReplayConnector {
    async fn connect(&self) -> Result<BoxedSource> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| LinkError::file_error(self.path.clone(), e))?;
        info!(path = %self.path.display(), "replaying capture");
        Ok(Box::new(file))
    }

    fn describe(&self) -> String {
        format!("replay:{}", self.path.display())
    }
}
