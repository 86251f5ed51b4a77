//! Cross-cutting concerns shared by the crates in this workspace:
//!
//! - [`error`] - a platform-wide error enum with retry classification
//! - [`metrics`] - dependency-free counters and gauges exportable as Prometheus text
//! - [`tracing_config`] - structured logging setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod metrics;
pub mod tracing_config;

pub use error::PlatformError;
pub use metrics::{Counter, Gauge};
pub use tracing_config::{init_tracing, TracingConfig};
