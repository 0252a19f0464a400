//! Startup orchestration.
//!
//! Order: metrics → store → health engine → management API. Any failure
//! before the API is serving is fatal. On shutdown the API stops first, then
//! the engine loops, then the checker pool is closed.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::ManagerConfig;
use crate::health::{EngineError, HealthEngine};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::store::{build_store, KeyLayout, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid address for {field}: '{value}'")]
    Address { field: &'static str, value: String },

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to connect to store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("management API I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the manager until a termination signal arrives.
pub async fn run(config: ManagerConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });
    run_until_shutdown(config, shutdown).await
}

/// Run the manager until `shutdown` is triggered.
pub async fn run_until_shutdown(config: ManagerConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = parse_addr("observability.metrics_address", &config.observability.metrics_address)?;
        metrics::init_metrics(addr)?;
    }

    let store = build_store(&config.store)?;
    let layout = KeyLayout::from_config(&config.store);
    tracing::info!(
        backend = ?config.store.backend,
        endpoints = ?config.store.endpoints,
        root = %layout.clusters_root(),
        "Configuration store ready"
    );

    let engine = if config.health.enabled {
        let engine = HealthEngine::new(store.clone(), layout, config.health.clone());
        Some(engine.start(&shutdown).await?)
    } else {
        tracing::info!("Health checks disabled");
        None
    };

    if config.admin.enabled {
        let addr = parse_addr("admin.bind_address", &config.admin.bind_address)?;
        let state = AdminState::new(
            store.clone(),
            &config.store,
            engine.as_ref().map(|e| e.registry()),
            &config.admin.api_key,
        );
        let router = setup_admin_router(state, config.admin.request_timeout());

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %listener.local_addr()?, "Management API listening");

        let mut signal = shutdown.subscribe();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.recv().await })
            .await?;
        tracing::info!("Management API stopped");
    } else {
        shutdown.subscribe().recv().await;
    }

    if let Some(engine) = engine {
        engine.join().await;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|_| StartupError::Address {
        field,
        value: value.to_string(),
    })
}
