//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use spreadwatch_api::ApiConfig;
use spreadwatch_dashboard::DashboardConfig;
use spreadwatch_session::SessionConfig;
use spreadwatch_ws::ConnectionConfig;
use std::path::Path;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SPREADWATCH_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// `[telemetry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Expose Prometheus metrics on the dashboard.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Strategy REST API.
    #[serde(default)]
    pub api: ApiConfig,
    /// Push channel.
    #[serde(default)]
    pub push: ConnectionConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration: CLI path > `SPREADWATCH_CONFIG` > default path.
    ///
    /// An explicit CLI path must exist. Otherwise a missing file falls back
    /// to defaults.
    pub fn load(cli_path: Option<&str>) -> AppResult<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        let env_path = std::env::var(CONFIG_ENV).ok();
        let path = resolve_path(None, env_path.as_deref());
        if Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject values the components cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        let api_url = &self.api.base_url;
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "api.base_url must be an http(s) URL, got {api_url:?}"
            )));
        }
        let push_url = &self.push.url;
        if !["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| push_url.starts_with(scheme))
        {
            return Err(AppError::Config(format!(
                "push.url must be an http(s) or ws(s) URL, got {push_url:?}"
            )));
        }
        if self.push.connect_timeout_ms == 0 {
            return Err(AppError::Config("push.connect_timeout_ms must be > 0".to_string()));
        }
        if self.session.log_capacity == 0 {
            return Err(AppError::Config("session.log_capacity must be > 0".to_string()));
        }
        if self.session.alert_ttl_ms == 0 {
            return Err(AppError::Config("session.alert_ttl_ms must be > 0".to_string()));
        }
        if self.api.command_timeout_ms == 0 {
            return Err(AppError::Config("api.command_timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Session settings with the command timeout from `[api]`.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            command_timeout_ms: self.api.command_timeout_ms,
            ..self.session.clone()
        }
    }

    /// Dashboard settings with the metrics switch from `[telemetry]`.
    pub fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            metrics_enabled: self.telemetry.metrics_enabled,
            ..self.dashboard.clone()
        }
    }
}

/// Pick the config path from the CLI argument, then the environment.
pub fn resolve_path(cli_path: Option<&str>, env_path: Option<&str>) -> String {
    cli_path
        .or(env_path)
        .unwrap_or(DEFAULT_CONFIG_PATH)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:5000/api");
        assert_eq!(config.push.url, "http://localhost:5000");
        assert_eq!(config.push.max_reconnect_attempts, 5);
        assert_eq!(config.session.log_capacity, 50);
        assert_eq!(config.session.alert_ttl_ms, 6000);
        assert!(config.dashboard.enabled);
        assert!(config.telemetry.metrics_enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file_partial_sections() {
        let file = write_config(
            r#"
[api]
base_url = "http://strategy.internal:5000/api"
command_timeout_ms = 45000

[push]
url = "https://strategy.internal"
reconnect_delay_ms = 2000

[session]
log_capacity = 20

[telemetry]
metrics_enabled = false
"#,
        );

        let config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.push.reconnect_delay_ms, 2000);
        assert_eq!(config.push.max_reconnect_attempts, 5);
        assert_eq!(config.session.log_capacity, 20);
        assert_eq!(config.session.alert_ttl_ms, 6000);

        let session = config.session_config();
        assert_eq!(session.command_timeout_ms, 45_000);
        assert_eq!(session.log_capacity, 20);
        assert!(!config.dashboard_config().metrics_enabled);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = AppConfig::load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_parse_error() {
        let file = write_config("[session]\nlog_capacity = \"many\"\n");
        let err = AppConfig::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.push.url = "localhost:5000".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.push.connect_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.log_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let config: AppConfig = toml::from_str(include_str!("../../../config/default.toml")).unwrap();
        config.validate().unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.api.base_url, defaults.api.base_url);
        assert_eq!(config.push.url, defaults.push.url);
        assert_eq!(config.push.heartbeat_interval_ms, defaults.push.heartbeat_interval_ms);
        assert_eq!(config.push.heartbeat_timeout_ms, defaults.push.heartbeat_timeout_ms);
        assert_eq!(config.push.connect_timeout_ms, defaults.push.connect_timeout_ms);
        assert_eq!(config.session.status_poll_interval_ms, defaults.session.status_poll_interval_ms);
        assert_eq!(config.dashboard.port, defaults.dashboard.port);
    }

    #[test]
    fn test_resolve_path_precedence() {
        assert_eq!(resolve_path(Some("a.toml"), Some("b.toml")), "a.toml");
        assert_eq!(resolve_path(None, Some("b.toml")), "b.toml");
        assert_eq!(resolve_path(None, None), DEFAULT_CONFIG_PATH);
    }
}
