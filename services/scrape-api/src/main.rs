//! Scrape gateway service
//!
//! Single-binary REST gateway that:
//! 1. Loads the account and proxy inventories
//! 2. Starts the dispatcher (scheduler + health sweep)
//! 3. Serves the read API under /api/v3, with Prometheus metrics at
//!    /metrics

mod config;
mod error;
mod metrics;
mod routes;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use scraper_accounts::{AccountStore, ProxyStore};
use scraper_pool::Dispatcher;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upstream::HttpClientFactory;

use crate::config::Config;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting scrape-gateway");

    let config = Config::from_env().context("loading configuration")?;
    info!(
        listen_addr = %config.listen_addr,
        upstream = %config.upstream_base_url,
        accounts_path = %config.accounts_path.display(),
        proxies_path = %config.proxies_path.display(),
        max_concurrency = config.max_concurrency,
        max_queue_size = config.max_queue_size,
        "configuration loaded"
    );

    let accounts = Arc::new(
        AccountStore::load(config.accounts_path.clone(), config.cookies_path.clone())
            .await
            .context("loading accounts")?,
    );
    if accounts.is_empty().await {
        warn!("no accounts loaded; every operation will fail until accounts are provisioned");
    }

    // A missing proxies file is not fatal: operations egress directly.
    let proxies = match ProxyStore::load(config.proxies_path.clone()).await {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "proxies unavailable, egressing directly");
            ProxyStore::empty()
        }
    };

    let factory = Arc::new(HttpClientFactory::new(
        config.upstream_base_url.clone(),
        config.client_timeout(),
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        accounts,
        Arc::new(proxies),
        factory,
        config.dispatcher_config(),
    ));
    dispatcher.start().await;

    let metrics_handle = metrics::install_recorder();
    let state = AppState {
        dispatcher: dispatcher.clone(),
        started_at: Instant::now(),
    };
    let app = routes::build_router(state, metrics_handle);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    dispatcher.stop();
    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
