//! Connection lifecycle status

use serde::{Deserialize, Serialize};

/// The externally visible state of the rover connection.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲  ▲             │             │
///       │  └─────────────┤             │
///       │                ▼             ▼
///       └──────────── Error ◄──────────┘
/// ```
///
/// `Disconnected` and `Error` are both terminal for a session; a new session
/// may be started from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Idle: never started, stopped deliberately, or the peer ended the stream cleanly.
    #[default]
    Disconnected,
    /// The last session ended because of a transport failure or read timeout.
    Error,
}

impl ConnectionStatus {
    /// A session is in progress.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// The last session has ended (or none was ever started).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Error => write!(f, "Error"),
        }
    }
}
