use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use storage_network::config::{Settings, SettingsOverrides};
use storage_network::context::NodeContext;
use storage_network::transport::http::HttpTransport;

#[derive(Debug, Parser)]
#[command(name = "storage-node", about = "Peer-to-peer message storage node")]
struct Cli {
    #[command(flatten)]
    settings: SettingsOverrides,

    /// Maximum log level
    #[arg(long = "log-level", default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    // 1. Settings:
    let settings = Settings::load(cli.settings)?;
    settings.write()?;
    tracing::info!(
        "Starting node {} (listening on {})",
        settings.remote_address,
        settings.local_address
    );

    // 2. Databases, workflows and the first worker:
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(5), 3));
    let context = NodeContext::init(settings, transport)?;

    // 3. Bootstrap before serving; failures here stop the process:
    context.bootstrapper().run().await?;

    // 4. Retention sweep:
    let sweeper = context.spawn_sweeper();

    // 5. HTTP server:
    let app = context.router();
    let listener = tokio::net::TcpListener::bind(context.settings.local_address.as_str()).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await?;

    // 6. Stop background work:
    context.shutdown();
    sweeper.abort();

    Ok(())
}
