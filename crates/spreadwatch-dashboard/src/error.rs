//! Dashboard error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use spreadwatch_session::SessionError;
use thiserror::Error;
use tracing::warn;

use crate::types::ErrorBody;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Failed to bind dashboard listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Dashboard server failed: {0}")]
    Serve(#[source] std::io::Error),
}

pub type DashboardResult<T> = Result<T, DashboardError>;

/// A session failure returned from a handler.
#[derive(Debug)]
pub struct ApiFailure(pub SessionError);

impl From<SessionError> for ApiFailure {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl ApiFailure {
    /// 409 for rejected commands, 503 once the session is closed, 502 otherwise.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_rejection() => StatusCode::CONFLICT,
            SessionError::SessionClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    fn kind(&self) -> &'static str {
        match &self.0 {
            SessionError::Connection(_) => "connection",
            SessionError::Request(_) => "request",
            SessionError::MalformedSeries { .. } => "malformed_series",
            SessionError::InvalidTransition { .. } => "invalid_transition",
            SessionError::PreconditionFailed { .. } => "precondition_failed",
            SessionError::SessionClosed => "session_closed",
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self.0, "Dashboard request failed");
        let body = ErrorBody {
            error: self.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spreadwatch_core::StrategyCommand;
    use spreadwatch_session::RunState;

    #[test]
    fn test_status_mapping() {
        let conflict = ApiFailure(SessionError::InvalidTransition {
            command: StrategyCommand::Stop,
            state: RunState::Initialized,
        });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let precondition = ApiFailure(SessionError::PreconditionFailed {
            command: StrategyCommand::Start,
            reason: "push channel is disconnected".to_string(),
        });
        assert_eq!(precondition.status(), StatusCode::CONFLICT);

        let closed = ApiFailure(SessionError::SessionClosed);
        assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);

        let upstream = ApiFailure(SessionError::MalformedSeries {
            field: "spread",
            expected: 3,
            actual: 2,
        });
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }
}
