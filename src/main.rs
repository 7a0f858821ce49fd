use clap::Parser;
use perfboard::bitrix::BitrixClient;
use perfboard::config::AppConfig;
use perfboard::rollup::cache::cache_maintenance_loop;
use perfboard::rollup::{ExpiringCache, RollupService};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[derive(Parser)]
#[command(name = "perfboard", about = "Cached listing-performance rollups for CRM agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perfboard=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;

    if let Err(msg) = config.validate() {
        eprintln!("Configuration error: {msg}");
        return Err(msg.into());
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        cache_ttl_secs = config.cache.ttl_secs,
        "starting perfboard"
    );

    // One cache for the whole process, shared by every request
    let cache = Arc::new(ExpiringCache::new(config.cache.max_capacity));

    let sweep_cache = cache.clone();
    let sweep_interval = config.cache.sweep_interval_secs;
    tokio::spawn(async move {
        cache_maintenance_loop(sweep_cache, sweep_interval).await;
    });

    let client = BitrixClient::new(&config.bitrix)?;
    let svc = Arc::new(RollupService::new(client, cache, config.cache.ttl_secs));
    let app = perfboard::api::router(svc);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    tracing::info!("shutting down...");
}
