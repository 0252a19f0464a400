//! Wires the health subsystem together and owns its background tasks.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::HealthCheckConfig;
use crate::health::checker::Checker;
use crate::health::clock::{Clock, SystemClock};
use crate::health::pool::{CheckerPool, PoolError};
use crate::health::registry::InstanceTaskRegistry;
use crate::health::scheduler::Scheduler;
use crate::health::watch::ConfigWatchAdapter;
use crate::health::writer::ResultWriter;
use crate::lifecycle::Shutdown;
use crate::store::{ConfigStore, KeyLayout, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build checker pool: {0}")]
    Pool(#[from] PoolError),

    #[error("failed to watch clusters root: {0}")]
    Watch(#[source] StoreError),

    #[error("failed to load clusters: {0}")]
    BulkLoad(#[source] StoreError),
}

pub struct HealthEngine {
    store: Arc<dyn ConfigStore>,
    layout: KeyLayout,
    config: HealthCheckConfig,
    clock: Arc<dyn Clock>,
}

impl HealthEngine {
    pub fn new(store: Arc<dyn ConfigStore>, layout: KeyLayout, config: HealthCheckConfig) -> Self {
        Self {
            store,
            layout,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Load the registry and spawn the watch, scheduler and writer loops.
    ///
    /// The watch is opened before the load so that changes made while the
    /// load is running are still applied afterwards.
    pub async fn start(self, shutdown: &Shutdown) -> Result<EngineHandle, EngineError> {
        let registry = Arc::new(InstanceTaskRegistry::new(self.config.cadence(), self.clock.clone()));
        let pool = Arc::new(CheckerPool::new(
            self.config.pool_initial,
            self.config.pool_max,
            Checker::factory(self.config.probe_timeout(), self.config.user_agent.clone()),
        )?);

        let root = self.layout.clusters_root().to_string();
        let events = match self.store.watch(&root).await {
            Ok(events) => events,
            Err(e) => {
                pool.close();
                return Err(EngineError::Watch(e));
            }
        };

        let adapter = ConfigWatchAdapter::new(registry.clone(), self.layout.clone());
        if let Err(e) = adapter.bulk_load(self.store.as_ref()).await {
            pool.close();
            return Err(EngineError::BulkLoad(e));
        }

        let (results_tx, results_rx) = mpsc::channel(self.config.result_buffer.max(1));
        let scheduler = Scheduler::new(registry.clone(), pool.clone(), results_tx, self.config.poll_interval());
        let writer = ResultWriter::new(self.store.clone());

        let tasks = vec![
            tokio::spawn(adapter.run(events, shutdown.subscribe())),
            tokio::spawn(scheduler.run(shutdown.subscribe())),
            tokio::spawn(writer.run(results_rx, shutdown.subscribe())),
        ];

        tracing::info!(
            root = %root,
            jobs = registry.len(),
            cadence_secs = self.config.cadence_secs,
            "Health engine started"
        );
        Ok(EngineHandle { registry, pool, tasks })
    }
}

/// Handle to a running engine.
pub struct EngineHandle {
    registry: Arc<InstanceTaskRegistry>,
    pool: Arc<CheckerPool<Checker>>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn registry(&self) -> Arc<InstanceTaskRegistry> {
        self.registry.clone()
    }

    pub fn pool(&self) -> Arc<CheckerPool<Checker>> {
        self.pool.clone()
    }

    /// Wait for the background loops to exit, then close the pool.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Health engine task failed");
            }
        }
        self.pool.close();
        tracing::info!("Health engine stopped");
    }
}
