//! Dashboard test server wired to a mocked session.

use spreadwatch_api::MockStrategyApi;
use spreadwatch_dashboard::{serve, DashboardConfig, DashboardResult};
use spreadwatch_session::{Session, SessionConfig};
use spreadwatch_ws::{ConnectionConfig, MockTransport};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct TestDashboard {
    pub addr: SocketAddr,
    pub session: Arc<Session>,
    pub api: Arc<MockStrategyApi>,
    shutdown: CancellationToken,
    handle: JoinHandle<DashboardResult<()>>,
}

impl TestDashboard {
    pub async fn start(config: DashboardConfig) -> Self {
        let api = Arc::new(MockStrategyApi::new());
        let transport = Arc::new(MockTransport::new());
        let push = ConnectionConfig {
            url: "mock://strategy".to_string(),
            heartbeat_interval_ms: 0,
            ..Default::default()
        };
        let session_config = SessionConfig {
            status_poll_interval_ms: 0,
            ..Default::default()
        };
        let session = Arc::new(Session::spawn(
            session_config,
            push,
            api.clone(),
            transport,
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, session.clone(), config, shutdown.clone()));

        Self {
            addr,
            session,
            api,
            shutdown,
            handle,
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.unwrap().unwrap();
        self.session.shutdown().await;
    }
}
