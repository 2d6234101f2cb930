//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API client error: {0}")]
    Api(#[from] spreadwatch_api::ApiError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] spreadwatch_dashboard::DashboardError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] spreadwatch_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
