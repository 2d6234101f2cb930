//! HTTP client for the strategy REST API.

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use spreadwatch_core::{CommandReply, HistoricalSeries, StrategyCommand, StrategyStatus};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Boxed future type for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations the session needs from the remote strategy.
pub trait StrategyApi: Send + Sync {
    /// `GET /status`.
    fn status(&self) -> BoxFuture<'_, ApiResult<StrategyStatus>>;

    /// `GET /historical`.
    fn historical(&self) -> BoxFuture<'_, ApiResult<HistoricalSeries>>;

    /// `POST /initialize`, `/start` or `/stop`.
    fn command(&self, command: StrategyCommand) -> BoxFuture<'_, ApiResult<CommandReply>>;
}

/// Arc wrapper for StrategyApi trait objects.
pub type DynStrategyApi = Arc<dyn StrategyApi>;

/// reqwest-backed strategy client.
pub struct HttpStrategyApi {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpStrategyApi {
    /// Create a new client.
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Client(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.request_timeout_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        self.decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.url(path);
        info!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> ApiResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.send_error(e))?;

        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            warn!(status = status.as_u16(), %message, "Strategy API returned error");
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn send_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout_ms)
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Server error text from `{"message": ..}` or `{"error": ..}` bodies.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

impl StrategyApi for HttpStrategyApi {
    fn status(&self) -> BoxFuture<'_, ApiResult<StrategyStatus>> {
        Box::pin(self.get_json("/status"))
    }

    fn historical(&self) -> BoxFuture<'_, ApiResult<HistoricalSeries>> {
        Box::pin(self.get_json("/historical"))
    }

    fn command(&self, command: StrategyCommand) -> BoxFuture<'_, ApiResult<CommandReply>> {
        Box::pin(self.post_json(command.path()))
    }
}
