//! Link configuration.
//!
//! All fields are optional in YAML; anything left out takes its default.
//!
//! ```yaml
//! host: 192.168.4.1
//! port: 8888
//! read_timeout_ms: 5000
//! wireless_interface: wlan0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connector::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT, TcpConnector};
use crate::gate::DEFAULT_DETECTION_INTERVAL;
use crate::sampler::DEFAULT_SIGNAL_POLL_INTERVAL;
use crate::{LinkError, Result};

/// Default inactivity bound on the rover stream.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    /// Inactivity bound; a session with no bytes for this long fails.
    pub read_timeout_ms: u64,
    /// Minimum time between classifier starts.
    pub detection_interval_ms: u64,
    pub signal_poll_interval_ms: u64,
    /// Restrict RSSI sampling to one interface, e.g. `wlan0`.
    pub wireless_interface: Option<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: millis(DEFAULT_CONNECT_TIMEOUT),
            read_timeout_ms: millis(DEFAULT_READ_TIMEOUT),
            detection_interval_ms: millis(DEFAULT_DETECTION_INTERVAL),
            signal_poll_interval_ms: millis(DEFAULT_SIGNAL_POLL_INTERVAL),
            wireless_interface: None,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl LinkConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| LinkError::config(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| LinkError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| LinkError::config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(LinkError::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(LinkError::config("port must be non-zero"));
        }
        let intervals = [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("detection_interval_ms", self.detection_interval_ms),
            ("signal_poll_interval_ms", self.signal_poll_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(LinkError::config(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn signal_poll_interval(&self) -> Duration {
        Duration::from_millis(self.signal_poll_interval_ms)
    }

    /// TCP connector for the configured endpoint.
    pub fn tcp_connector(&self) -> TcpConnector {
        TcpConnector::new(self.host.clone(), self.port).with_connect_timeout(self.connect_timeout())
    }
}
