//! spreadwatch-dashboard - HTTP and WebSocket surface over a live session.
//!
//! - REST API for the current snapshot, the historical series and the
//!   operator commands
//! - WebSocket that streams every published snapshot
//! - Prometheus text exposition on `/metrics`
//!
//! # Usage
//!
//! ```ignore
//! use spreadwatch_dashboard::{run_server, DashboardConfig};
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(run_server(session.clone(), DashboardConfig::default(), shutdown.clone()));
//! ```

mod broadcast;
mod config;
mod error;
mod server;
mod types;

pub use config::DashboardConfig;
pub use error::{ApiFailure, DashboardError, DashboardResult};
pub use server::{create_router, run_server, serve, AppState, ConnectionGuard, ConnectionLimiter};
pub use types::{DashboardMessage, ErrorBody, HistoricalResponse, ReloadResponse};
