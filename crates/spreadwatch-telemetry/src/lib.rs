//! Prometheus metrics and structured logging for spreadwatch.
//!
//! - Prometheus metrics for the push channel, operator commands and alerts
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
