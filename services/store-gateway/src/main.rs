use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::serve;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use tsdb_guard_admission::{
    load_overrides, spawn_reload_task, ReservationObserver, TenantLimits, TracingObserver,
};
use tsdb_guard_store_gateway::{
    create_router, ApiState, BlockStore, BucketStore, StoreGatewayConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = StoreGatewayConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config);

    info!(
        blocks_file = ?config.blocks_file,
        log_limiter_decisions = config.log_limiter_decisions,
        "store-gateway starting"
    );

    let overrides = load_overrides(
        config.runtime_config_file.as_deref(),
        config.default_limits.clone(),
    )
    .context("failed to load runtime config")?;

    let _reload_task = config.runtime_config_file.clone().map(|path| {
        spawn_reload_task(
            Arc::clone(&overrides),
            path,
            Duration::from_secs(config.runtime_reload_interval_secs),
        )
    });

    let blocks = match config.blocks_file.as_deref() {
        Some(path) => BlockStore::load_file(path).context("failed to load blocks")?,
        None => BlockStore::new(),
    };
    info!(tenants = blocks.tenant_count(), "blocks loaded");

    let observer = config
        .log_limiter_decisions
        .then(|| Arc::new(TracingObserver::new("store-gateway")) as Arc<dyn ReservationObserver>);
    let limits: Arc<dyn TenantLimits> = overrides;
    let store = Arc::new(BucketStore::new(Arc::new(blocks), limits, observer));

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("invalid server bind address")?;
    let router = create_router(Arc::new(ApiState::new(store, config)));

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;
    let local_addr = listener
        .local_addr()
        .context("failed to read bound address")?;
    info!(%local_addr, "store-gateway listening");

    serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server encountered an unrecoverable error")?;

    info!("store-gateway shutdown complete");
    Ok(())
}

fn init_tracing(config: &StoreGatewayConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
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

    info!("shutdown signal received");
}
