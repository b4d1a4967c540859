//! Error types for the rover link.
//!
//! Two layers of failure exist in this crate:
//!
//! - [`DecodeError`] covers a single message whose payload could not be turned
//!   into a typed value. It is always recovered locally: the affected field is
//!   left unchanged and the stream keeps flowing.
//! - [`LinkError`] covers everything that can end or prevent a session:
//!   transport failures, read timeouts, configuration problems and classifier
//!   failures surfaced to callers.
//!
//! Framing corruption is deliberately absent from both: the codec reports it as
//! a [`FrameOutcome::Resync`](crate::codec::FrameOutcome::Resync) and never as an error.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use marcs_link::LinkError;
//!
//! let error = LinkError::connection_failed("rover access point unreachable");
//! if error.is_retryable() {
//!     println!("Call Link::start() again");
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Failed to connect to rover: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Transport I/O failure")]
    Io(#[from] std::io::Error),

    #[error("No data received for {duration:?}")]
    Timeout { duration: Duration },

    #[error("Message decode failed")]
    Decode(#[from] DecodeError),

    #[error("Classifier failed: {reason}")]
    Classifier { reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("File error: {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LinkError {
    /// Returns whether a new session started with `Link::start()` may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Connection { .. } => true,
            LinkError::Io(_) => true,
            LinkError::Timeout { .. } => true,
            LinkError::Classifier { .. } => true,
            LinkError::Decode(_) => false,
            LinkError::Config { .. } => false,
            LinkError::File { .. } => false,
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        LinkError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LinkError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for classifier failures.
    pub fn classifier(reason: impl Into<String>) -> Self {
        LinkError::Classifier { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        LinkError::Config { reason: reason.into() }
    }

    /// Helper constructor for capture file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        LinkError::File { path, source }
    }
}

/// Failure to turn a single frame payload into a typed message.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("video payload is {actual} bytes, expected {expected}")]
    VideoSize { expected: usize, actual: usize },

    #[error("payload is not valid UTF-8")]
    Utf8,

    #[error("missing field '{field}'")]
    MissingField { field: &'static str },

    #[error("field '{field}' has non-numeric value '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unknown message type {0}")]
    UnknownType(u8),
}
