// taskboard-daemon: background service owning boards, actions and time logs
//
// Responsibilities:
// - Serve the JSON request protocol on a Unix socket
// - Stream board notifications to subscribed clients
// - Run the automation engine, session sync and time tracking loops

use anyhow::{Context, Result};
use taskboard_lib::daemon::{Config, DaemonServer};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            res = signal::ctrl_c() => res.context("Failed to listen for Ctrl-C")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskboard_lib=info,taskboard_daemon=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    let settings = config.load_settings()?;
    info!(
        state_dir = %config.state_dir.display(),
        socket = %config.socket_path.display(),
        "Starting taskboard daemon"
    );

    let server = DaemonServer::new(config, settings);
    server.start().await?;

    let waited = shutdown_signal().await;
    server.stop().await;
    waited
}
