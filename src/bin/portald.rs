//! Portal daemon - identity portal server

use anyhow::{Context, Result};
use clap::Parser;
use portal::config::ServeArgs;
use portal::server::PortalServer;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "portald")]
#[command(about = "Identity portal daemon")]
#[command(version)]
struct Args {
    #[command(flatten)]
    serve: ServeArgs,

    /// Database URL (users are kept in memory when unset)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args
        .serve
        .to_config(args.database_url.as_deref())
        .context("Invalid configuration")?;
    let server = PortalServer::launch(config).await?;

    info!(addr = %args.serve.bind, "Portal daemon starting");

    // The sweep task is stopped by run_until once the listener drains
    server.run_until(shutdown_signal()).await?;

    info!("Portal daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server");
}
