mod config;
mod cache;
mod cache_manager;
mod ssdp;
mod relay;
mod transport;
mod api;

use std::path::PathBuf;
use std::sync::Arc;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::cache::registry::Registry;
use crate::cache::scheduler::Scheduler;
use crate::cache_manager::{CacheHandle, CachePolicy};
use crate::config::Config;
use crate::relay::{Relay, RelaySettings};
use crate::transport::UdpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ssdp_cached=info"))
        )
        .init();

    tracing::info!("Starting ssdp-cached");

    // Load config
    let (config, config_path) = Config::resolve(std::env::args().nth(1).map(PathBuf::from))
        .context("Failed to load config")?;

    match &config_path {
        Some(path) => tracing::info!("Loaded config from {}", path.display()),
        None => tracing::info!("No config file, using defaults"),
    }

    let started = Utc::now();

    // Start cache thread
    let registry = Registry::new();
    let scheduler = Scheduler::new(started, config.sweep_interval());
    let policy = CachePolicy {
        ttl: config.ttl(),
        ignore_byebye: config.relay.ignore_byebye,
    };
    let cache_handle = CacheHandle::spawn(registry, scheduler, policy);

    // Bind the SSDP socket and join the group on every interface
    let transport = UdpTransport::bind(
        config.relay.multicast_group,
        config.relay.port,
        &config.relay.interfaces,
    )
    .context("Failed to set up SSDP socket")?;

    let relay = Relay::new(
        Arc::new(transport),
        cache_handle.clone(),
        RelaySettings {
            max_age_secs: config.cache.max_age_secs,
            multicast_dest: config.multicast_destination(),
            recv_buffer: config.relay.recv_buffer,
        },
    );

    // Ask everything on the network to announce itself
    relay.discover().await;

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn relay receive loop
    let relay_cancel = cancel.clone();
    let relay_handle = tokio::spawn(async move {
        if let Err(e) = relay.run(relay_cancel).await {
            tracing::error!("Relay error: {}", e);
        }
    });

    // Optional inspection API
    let server_handle = match config.api.listen {
        Some(listen) => {
            let app_state = api::routes::AppState {
                cache: cache_handle.clone(),
                config: Arc::new(config.clone()),
            };
            let app = api::routes::router(app_state);

            let listener = tokio::net::TcpListener::bind(listen)
                .await
                .with_context(|| format!("Failed to bind to {}", listen))?;

            tracing::info!("API listening on {}", listen);

            let server_cancel = cancel.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app)
                    .with_graceful_shutdown(async move { server_cancel.cancelled().await })
                    .await
                {
                    tracing::error!("Server error: {}", e);
                }
            }))
        }
        None => None,
    };

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = relay_handle.await;
    if let Some(server_handle) = server_handle {
        let _ = server_handle.await;
    }

    // Shutdown cache thread
    if let Err(e) = cache_handle.shutdown().await {
        tracing::error!("Failed to shutdown cache: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
