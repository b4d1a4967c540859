//! Stream combinators for observation streams

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
