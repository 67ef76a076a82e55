//! robot-link: transport from motor directives to the rover's drive controller
//!
//! The controller speaks newline-delimited JSON over TCP. The default build
//! enables a `mock` link so that binaries and tests run without hardware.

pub mod wire;

mod error;
pub use error::{LinkError, Result};

mod traits;
pub use traits::MotorLink;

mod metrics;
pub use metrics::LinkMetrics;

mod tcp;
pub use tcp::{LinkConfig, TcpLink};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockLink;
