//! Main application orchestration.
//!
//! Wires the REST client and the push transport into a `Session`, serves
//! the dashboard next to it and logs session transitions until shutdown.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use spreadwatch_api::HttpStrategyApi;
use spreadwatch_dashboard::{run_server, DashboardResult};
use spreadwatch_session::{RunState, Session, SessionSnapshot, Severity};
use spreadwatch_ws::{ConnectionState, WsTransport};
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Fields whose changes are worth an operator log line.
#[derive(Debug, Clone, PartialEq)]
struct Observed {
    connection: ConnectionState,
    run_state: RunState,
    alert: Option<(Severity, String)>,
}

impl Observed {
    fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            connection: snapshot.connection,
            run_state: snapshot.run_state,
            alert: snapshot
                .alert
                .as_ref()
                .map(|a| (a.severity, a.message.clone())),
        }
    }

    fn log_changes_from(&self, previous: &Self) {
        if self.connection != previous.connection {
            info!(from = %previous.connection, to = %self.connection, "Push channel state changed");
        }
        if self.run_state != previous.run_state {
            info!(from = %previous.run_state, to = %self.run_state, "Strategy run state changed");
        }
        if self.alert != previous.alert {
            if let Some((severity, message)) = &self.alert {
                info!(severity = severity.as_str(), %message, "Alert");
            }
        }
    }
}

enum Step {
    Shutdown,
    Snapshot,
    SessionEnded,
    DashboardExited(Result<DashboardResult<()>, JoinError>),
}

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Create a new application from a validated config.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then tear the session down.
    pub async fn run_until<F>(self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            api = %self.config.api.base_url,
            push = %self.config.push.url,
            "Starting application"
        );

        let api = Arc::new(HttpStrategyApi::new(&self.config.api)?);
        let transport = Arc::new(WsTransport::new());
        let session = Arc::new(Session::spawn(
            self.config.session_config(),
            self.config.push.clone(),
            api,
            transport,
        ));

        let token = CancellationToken::new();
        let mut dashboard = if self.config.dashboard.enabled {
            Some(tokio::spawn(run_server(
                session.clone(),
                self.config.dashboard_config(),
                token.clone(),
            )))
        } else {
            info!("Dashboard disabled");
            None
        };

        let mut snapshots = session.subscribe();
        let mut observed = Observed::from_snapshot(&snapshots.borrow_and_update());
        tokio::pin!(shutdown);

        let outcome = loop {
            let step = tokio::select! {
                () = &mut shutdown => Step::Shutdown,
                changed = snapshots.changed() => match changed {
                    Ok(()) => Step::Snapshot,
                    Err(_) => Step::SessionEnded,
                },
                joined = join_dashboard(&mut dashboard) => Step::DashboardExited(joined),
            };

            match step {
                Step::Shutdown => {
                    info!("Shutdown signal received");
                    break Ok(());
                }
                Step::Snapshot => {
                    let current = Observed::from_snapshot(&snapshots.borrow_and_update());
                    current.log_changes_from(&observed);
                    observed = current;
                }
                Step::SessionEnded => {
                    warn!("Session ended unexpectedly");
                    break Ok(());
                }
                Step::DashboardExited(joined) => {
                    dashboard = None;
                    match joined {
                        Ok(Ok(())) => warn!("Dashboard server exited"),
                        Ok(Err(e)) => break Err(AppError::from(e)),
                        Err(e) => error!(?e, "Dashboard task panicked"),
                    }
                }
            }
        };

        info!("Shutting down");
        token.cancel();
        if let Some(handle) = dashboard {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Dashboard server failed during shutdown"),
                Err(e) => error!(?e, "Dashboard task panicked"),
            }
        }
        session.shutdown().await;
        info!("Shutdown complete");

        outcome
    }
}

async fn join_dashboard(
    handle: &mut Option<JoinHandle<DashboardResult<()>>>,
) -> Result<DashboardResult<()>, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(?e, "Failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Nothing listens on the discard port, so every remote call fails fast.
    fn unreachable_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.api.base_url = "http://127.0.0.1:9/api".to_string();
        config.push.url = "http://127.0.0.1:9".to_string();
        config.dashboard.enabled = false;
        config
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AppConfig::default();
        config.api.base_url = "localhost:5000".to_string();
        assert!(matches!(
            Application::new(config),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_runs_until_shutdown_with_unreachable_remote() {
        spreadwatch_ws::init_crypto();
        let app = Application::new(unreachable_config()).unwrap();
        app.run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dashboard_on_ephemeral_port() {
        spreadwatch_ws::init_crypto();
        let mut config = unreachable_config();
        config.dashboard.enabled = true;
        config.dashboard.port = 0;

        let app = Application::new(config).unwrap();
        app.run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();
    }

    #[test]
    fn test_observed_tracks_alert_identity() {
        let mut snapshot = SessionSnapshot::default();
        let before = Observed::from_snapshot(&snapshot);
        snapshot.version = 3;
        assert_eq!(Observed::from_snapshot(&snapshot), before);

        snapshot.run_state = RunState::Initialized;
        assert_ne!(Observed::from_snapshot(&snapshot), before);
    }
}
