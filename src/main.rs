//! bankd - Teller Server
//!
//! A TCP teller server: card/PIN login, balance queries, deposits, and
//! withdrawals authorized by single-use codes.

use bankd_server::metrics::run_metrics_server;
use bankd_server::{Config, Metrics, Server, ServerConfig};
use bankd_storage::LocalStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if BANKD_CONFIG is set, then env overrides)
    let config_path = std::env::var("BANKD_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(ref path) = config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::warn!("Invalid configuration ({}), using defaults", e);
            Config::default()
        }
    };

    tracing::info!("Starting bankd server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Wire mode: {}", config.network.wire_mode);
    tracing::info!("  Idle timeout: {}s", config.network.idle_timeout_secs);
    tracing::info!("  Welcome messages: {}", config.welcome.dir.display());

    // Open account store (created empty on first start)
    let store_path = config.storage.store_path();
    let store = Arc::new(LocalStore::open(&store_path)?);
    tracing::info!(
        "  Account store: {} ({} accounts)",
        store_path.display(),
        store.accounts().len()
    );

    let mut server_config = ServerConfig::from_config(&config);

    // Start metrics endpoint if enabled
    let metrics_shutdown = if config.metrics.enabled {
        let metrics = Arc::new(Metrics::new()?);
        server_config = server_config.with_metrics(metrics.clone());

        let (tx, rx) = tokio::sync::broadcast::channel(1);
        let addr = config.metrics.bind_addr;
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(addr, metrics, rx).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
        tracing::info!("  Metrics: enabled on {}", addr);
        Some(tx)
    } else {
        tracing::info!("  Metrics: disabled");
        None
    };

    let server = Arc::new(Server::new(server_config, store.clone()));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
        if let Some(tx) = metrics_shutdown {
            let _ = tx.send(());
        }
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    // Persist store before exit
    if let Err(e) = store.flush() {
        tracing::error!("Failed to flush account store on shutdown: {}", e);
    }

    tracing::info!("Server stopped");
    Ok(())
}
