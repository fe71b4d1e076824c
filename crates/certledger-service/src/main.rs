//! Certledger Service - transaction log lookup and recovery
//!
//! This is the main entry point for the certledger service.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use certledger_mirror::{MirrorClient, MirrorOptions, MirrorQuery};
use certledger_service::{create_router, AppState, ServiceConfig, StoreBackend, SweepScheduler};
use certledger_store::{MemoryStore, PgStore, TransactionLogStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,certledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Certledger Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        network = %config.network,
        store_backend = %config.store_backend,
        mirror_override = ?config.mirror_base_url,
        sweep_interval_secs = config.sweep_interval_seconds,
        "Service configuration loaded"
    );

    let store = open_store(&config).await?;

    let mirror_options = MirrorOptions {
        base_url: config.mirror_base_url.clone(),
        ..MirrorOptions::default()
    };
    let mirror = Arc::new(MirrorClient::with_options(config.network, mirror_options)?);
    tracing::info!(base_url = %mirror.base_url(), "Mirror client configured");

    let state = AppState::new(store, Arc::clone(&mirror), config.clone());
    let confirmations = Arc::clone(state.confirmations());
    let sweeps = state.sweeps.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = config.sweep_interval().map(|interval| {
        SweepScheduler::new(
            sweeps.clone(),
            mirror as Arc<dyn MirrorQuery>,
            interval,
            config.sweep_limit,
        )
        .spawn(shutdown_rx)
    });

    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // HTTP is drained; stop background work.
    shutdown_tx.send_replace(true);
    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.await {
            tracing::error!(error = %e, "Sweep scheduler task failed");
        }
    }
    if sweeps.shutdown().await {
        tracing::warn!("On-demand sweep aborted at shutdown");
    }

    let aborted = confirmations.shutdown(config.shutdown_grace()).await;
    if aborted > 0 {
        tracing::warn!(
            aborted,
            "Confirmations aborted at shutdown; the recovery sweep will pick them up"
        );
    }

    tracing::info!("Certledger Service stopped");
    Ok(())
}

/// Open the configured transaction log backend.
async fn open_store(
    config: &ServiceConfig,
) -> Result<Arc<dyn TransactionLogStore>, Box<dyn std::error::Error>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store - records do not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or("DATABASE_URL is required for the postgres backend")?;
            let store = PgStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            tracing::info!("PostgreSQL store ready");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "rocksdb-backend")]
        StoreBackend::Rocksdb => {
            tracing::info!(path = %config.data_dir, "Opening RocksDB store");
            Ok(Arc::new(certledger_store::RocksStore::open(&config.data_dir)?))
        }
        #[cfg(not(feature = "rocksdb-backend"))]
        StoreBackend::Rocksdb => {
            Err("built without the rocksdb-backend feature".into())
        }
    }
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
