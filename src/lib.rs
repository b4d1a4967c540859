//! Client side of the MARCS rover link.
//!
//! The rover streams camera frames and telemetry over a single TCP connection
//! using a small binary framing. This crate reads that stream, recovers from
//! corruption, decodes each frame into a typed message and publishes the
//! latest values for a UI layer to observe.
//!
//! # Features
//!
//! - **Resynchronizing codec**: garbage between frames is skipped, never fatal
//! - **Typed messages**: video, centroid, pressure/altitude, GPS and battery
//! - **Object detection**: pluggable [`Classifier`], single-flight and rate limited
//! - **Signal sampling**: periodic RSSI buckets from a pluggable [`RssiReader`]
//! - **Observable state**: `watch`-backed [`StreamState`] with `Stream` adapters
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use marcs_link::{Link, LinkConfig, NoDetections, ProcNetWireless};
//!
//! #[tokio::main]
//! async fn main() -> marcs_link::Result<()> {
//!     let config = LinkConfig::load("marcs.yaml")?;
//!     let connector = Arc::new(config.tcp_connector());
//!     let rssi = Arc::new(ProcNetWireless::new(config.wireless_interface.clone()));
//!     let link = Link::new(config, connector, Arc::new(NoDetections), rssi);
//!
//!     link.start();
//!     let mut statuses = link.state().status_changes();
//!     while let Some(status) = statuses.next().await {
//!         println!("link is {status}");
//!         if status.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

pub mod codec;
pub mod config;
pub mod connector;
pub mod gate;
pub mod link;
pub mod messages;
pub mod reader;
pub mod sampler;
pub mod state;
pub mod stream;

pub use error::*;
pub use types::*;

pub use codec::{Frame, FrameCodec, FrameOutcome};
pub use config::LinkConfig;
pub use connector::{BoxedSource, Connector, ReplayConnector, TcpConnector};
pub use gate::{Classifier, GateDecision, NoDetections, ProcessingGate};
pub use link::Link;
pub use messages::{Message, MessageKind};
pub use reader::{SessionSummary, StreamReader};
pub use sampler::{ProcNetWireless, RssiReader, SignalSampler, StaticRssi};
pub use state::{StateSnapshot, StateWriter, StreamState};
