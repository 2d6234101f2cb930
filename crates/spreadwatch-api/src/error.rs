//! REST client error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Non-2xx reply. `message` is the server's own error text when present.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl ApiError {
    /// Text to show the operator: the server message for HTTP errors.
    pub fn operator_message(&self) -> String {
        match self {
            Self::Http { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
