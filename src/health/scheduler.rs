//! Polls the registry and dispatches due jobs to pooled checkers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::health::checker::Checker;
use crate::health::job::CheckResult;
use crate::health::pool::CheckerPool;
use crate::health::registry::InstanceTaskRegistry;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

pub struct Scheduler {
    registry: Arc<InstanceTaskRegistry>,
    pool: Arc<CheckerPool<Checker>>,
    results: mpsc::Sender<CheckResult>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(
        registry: Arc<InstanceTaskRegistry>,
        pool: Arc<CheckerPool<Checker>>,
        results: mpsc::Sender<CheckResult>,
        poll_interval: Duration,
    ) -> Self {
        Self { registry, pool, results, poll_interval }
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            cadence_secs = self.registry.cadence().as_secs(),
            "Health scheduler starting"
        );

        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut probes = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(&mut probes);
                }
                _ = shutdown.recv() => {
                    tracing::info!(in_flight = probes.len(), "Health scheduler received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        probes.abort_all();
        while probes.join_next().await.is_some() {}
    }

    /// Reap finished probes, then dispatch every job due now.
    ///
    /// A job can be dispatched again while an earlier probe for it is still
    /// running; the job's own claim keeps each cadence slot to one probe.
    /// Returns the number of probes spawned.
    pub fn tick(&self, probes: &mut JoinSet<()>) -> usize {
        while let Some(finished) = probes.try_join_next() {
            if let Err(e) = finished {
                if e.is_panic() {
                    tracing::error!(error = %e, "Health probe task panicked");
                }
            }
        }

        let now = self.registry.now();
        let mut dispatched = 0;
        for job in self.registry.due_jobs(now) {
            let checker = match self.pool.acquire_scoped() {
                Ok(checker) => checker,
                Err(e) => {
                    tracing::error!(key = %job.instance_key(), error = %e, "Failed to acquire health checker");
                    continue;
                }
            };
            let results = self.results.clone();
            probes.spawn(async move {
                checker.check(&job, now, &results).await;
            });
            dispatched += 1;
        }

        metrics::record_pool_idle(self.pool.len());
        dispatched
    }
}
