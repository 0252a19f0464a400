//! In-memory registry of health jobs keyed by instance key.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cluster::ServerInstance;
use crate::health::clock::Clock;
use crate::health::job::HealthJob;
use crate::observability::metrics;

/// What a reconcile did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Inserted,
    Replaced,
    Unchanged,
    Removed,
    /// No job existed and none is needed.
    Untracked,
}

impl Reconciled {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reconciled::Inserted => "inserted",
            Reconciled::Replaced => "replaced",
            Reconciled::Unchanged => "unchanged",
            Reconciled::Removed => "removed",
            Reconciled::Untracked => "untracked",
        }
    }
}

/// Point-in-time view of one job, as served by the management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub instance_key: String,
    pub target_url: String,
    pub cadence_ms: u64,
    pub last_check_ms_ago: Option<u64>,
    pub next_due_in_ms: u64,
}

#[derive(Debug)]
pub struct InstanceTaskRegistry {
    jobs: RwLock<HashMap<String, Arc<HealthJob>>>,
    cadence: Duration,
    clock: Arc<dyn Clock>,
}

impl InstanceTaskRegistry {
    pub fn new(cadence: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            cadence,
            clock,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Insert a fresh job for `instance_key`, replacing any existing one.
    pub fn insert(&self, instance_key: &str, target_url: &str) -> Arc<HealthJob> {
        let job = Arc::new(self.new_job(instance_key, target_url));
        let mut jobs = self.write();
        jobs.insert(instance_key.to_string(), Arc::clone(&job));
        metrics::record_registry_jobs(jobs.len());
        job
    }

    pub fn remove(&self, instance_key: &str) -> bool {
        let mut jobs = self.write();
        let removed = jobs.remove(instance_key).is_some();
        metrics::record_registry_jobs(jobs.len());
        removed
    }

    /// Drop every job whose key starts with `prefix`. Returns how many went.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|key, _| !key.starts_with(prefix));
        metrics::record_registry_jobs(jobs.len());
        before - jobs.len()
    }

    pub fn get(&self, instance_key: &str) -> Option<Arc<HealthJob>> {
        self.read().get(instance_key).cloned()
    }

    pub fn contains(&self, instance_key: &str) -> bool {
        self.read().contains_key(instance_key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Jobs whose cadence has elapsed at `now`.
    pub fn due_jobs(&self, now: Instant) -> Vec<Arc<HealthJob>> {
        self.read()
            .values()
            .filter(|job| job.is_due(now))
            .cloned()
            .collect()
    }

    /// Bring the job for `instance_key` in line with a freshly written record.
    ///
    /// A record that no longer needs checking drops its job. An unchanged
    /// target URL keeps the existing job and its schedule; a new URL starts
    /// a fresh job.
    pub fn reconcile(&self, instance_key: &str, instance: &ServerInstance) -> Reconciled {
        let mut jobs = self.write();
        let outcome = if !instance.need_check_health {
            if jobs.remove(instance_key).is_some() {
                Reconciled::Removed
            } else {
                Reconciled::Untracked
            }
        } else {
            let same_url = jobs
                .get(instance_key)
                .map(|job| job.target_url() == instance.health_check_url);
            match same_url {
                Some(true) => Reconciled::Unchanged,
                tracked => {
                    let job = self.new_job(instance_key, &instance.health_check_url);
                    jobs.insert(instance_key.to_string(), Arc::new(job));
                    if tracked.is_some() { Reconciled::Replaced } else { Reconciled::Inserted }
                }
            }
        };
        metrics::record_registry_jobs(jobs.len());
        outcome
    }

    /// Snapshot of every job, sorted by instance key.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        let now = self.now();
        let mut out: Vec<JobSnapshot> = self
            .read()
            .values()
            .map(|job| JobSnapshot {
                instance_key: job.instance_key().to_string(),
                target_url: job.target_url().to_string(),
                cadence_ms: job.cadence().as_millis() as u64,
                last_check_ms_ago: job
                    .last_check()
                    .map(|at| now.saturating_duration_since(at).as_millis() as u64),
                next_due_in_ms: job.next_due().saturating_duration_since(now).as_millis() as u64,
            })
            .collect();
        out.sort_by(|a, b| a.instance_key.cmp(&b.instance_key));
        out
    }

    fn new_job(&self, instance_key: &str, target_url: &str) -> HealthJob {
        HealthJob::new(instance_key, target_url, self.cadence, self.clock.now())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<HealthJob>>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<HealthJob>>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
