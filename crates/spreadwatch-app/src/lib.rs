//! spreadwatch - operator console for a remote spread trading strategy.
//!
//! Main application that orchestrates all components:
//! - REST client for status, history and commands
//! - Push channel for live strategy updates
//! - Session synchronizer that merges both
//! - Dashboard server over the session

pub mod app;
pub mod config;
pub mod error;

pub use app::{shutdown_signal, Application};
pub use config::{AppConfig, TelemetryConfig};
pub use error::{AppError, AppResult};
