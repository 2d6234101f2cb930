//! spreadwatch - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Operator console for a remote Brent/WTI spread strategy
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SPREADWATCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    spreadwatch_ws::init_crypto();

    let args = Args::parse();

    spreadwatch_telemetry::init_logging()?;

    info!("Starting spreadwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = spreadwatch_app::AppConfig::load(args.config.as_deref())?;
    info!(
        api = %config.api.base_url,
        push = %config.push.url,
        dashboard = config.dashboard.enabled,
        "Configuration loaded"
    );

    let app = spreadwatch_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
