//! REST client for the remote spread strategy.
//!
//! `StrategyApi` is the seam the session talks to:
//! - `HttpStrategyApi`: reqwest-backed client for `/status`, `/historical`
//!   and the command endpoints
//! - `MockStrategyApi`: scripted double for tests

pub mod client;
pub mod config;
pub mod error;
pub mod mock;

pub use client::{BoxFuture, DynStrategyApi, HttpStrategyApi, StrategyApi};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use mock::MockStrategyApi;
