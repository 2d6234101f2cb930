//! HttpStrategyApi against a local REST server.

mod integration;
use integration::common::mock_rest::MockRestServer;

use spreadwatch_api::{ApiConfig, ApiError, HttpStrategyApi, StrategyApi};
use spreadwatch_core::StrategyCommand;

fn client(base_url: String) -> HttpStrategyApi {
    HttpStrategyApi::new(&ApiConfig {
        base_url,
        request_timeout_ms: 300,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_status_and_historical() {
    let server = MockRestServer::start().await;
    let api = client(server.base_url());

    let status = api.status().await.unwrap();
    assert!(status.is_initialized());
    assert_eq!(status.data_count, 500);

    let series = api.historical().await.unwrap();
    assert_eq!(series.dates.len(), 2);
    assert_eq!(series.positions, vec![0.0, 1.0]);

    server.shutdown();
}

#[tokio::test]
async fn test_command_success_and_error_message() {
    let server = MockRestServer::start().await;
    let api = client(server.base_url());

    let reply = api.command(StrategyCommand::Initialize).await.unwrap();
    assert_eq!(reply.status, "success");

    let err = api.command(StrategyCommand::Start).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Http {
            status: 400,
            message: "Strategy not initialized".to_string()
        }
    );
    assert_eq!(err.operator_message(), "Strategy not initialized");

    server.shutdown();
}

#[tokio::test]
async fn test_slow_command_times_out() {
    let server = MockRestServer::start().await;
    let api = client(server.base_url());

    let err = api.command(StrategyCommand::Stop).await.unwrap_err();
    assert_eq!(err, ApiError::Timeout(300));

    server.shutdown();
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/api", listener.local_addr().unwrap());
    drop(listener);

    let err = client(base_url).status().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
}
