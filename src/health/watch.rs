//! Keeps the job registry in step with the configuration store.
//!
//! Startup lists every cluster once; afterwards each watch event is applied
//! in arrival order. Instance keys drive single jobs. Deleting a cluster
//! directory, or the whole root, drops every job below it, since etcd reports
//! a recursive delete as one event for the directory.

use std::sync::Arc;

use crate::cluster::{ClusterOption, ServerInstance};
use crate::health::registry::{InstanceTaskRegistry, Reconciled};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::store::keys::last_segment;
use crate::store::{ConfigStore, KeyKind, KeyLayout, StoreError, WatchEvent, WatchOp, WatchStream};

/// What applying one watch event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Not an instance key.
    Ignored,
    /// The record could not be decoded; the registry was left alone.
    Undecodable,
    Reconciled(Reconciled),
    /// An instance was deleted. `true` if it had a job.
    Deleted(bool),
    /// A cluster directory or the root was deleted; holds the jobs dropped.
    Purged(usize),
}

impl Applied {
    fn outcome(&self) -> &'static str {
        match self {
            Applied::Ignored => "ignored",
            Applied::Undecodable => "undecodable",
            Applied::Reconciled(r) => r.as_str(),
            Applied::Deleted(true) => "removed",
            Applied::Deleted(false) => "untracked",
            Applied::Purged(_) => "purged",
        }
    }
}

/// Counts from the startup load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub clusters: usize,
    pub instances: usize,
    pub jobs: usize,
    pub undecodable: usize,
}

#[derive(Debug, Clone)]
pub struct ConfigWatchAdapter {
    registry: Arc<InstanceTaskRegistry>,
    layout: KeyLayout,
}

impl ConfigWatchAdapter {
    pub fn new(registry: Arc<InstanceTaskRegistry>, layout: KeyLayout) -> Self {
        Self { registry, layout }
    }

    /// Populate the registry from every cluster under the clusters root.
    ///
    /// A missing root means there is nothing to check yet. Any other store
    /// failure aborts the load.
    pub async fn bulk_load(&self, store: &dyn ConfigStore) -> Result<LoadSummary, StoreError> {
        let root = self.layout.clusters_root();
        let clusters = match store.list(root).await {
            Ok(nodes) => nodes,
            Err(StoreError::NotFound(_)) => {
                tracing::info!(root = %root, "Clusters root does not exist yet, starting with no jobs");
                return Ok(LoadSummary::default());
            }
            Err(e) => return Err(e),
        };

        let mut summary = LoadSummary::default();
        for cluster in clusters.into_iter().filter(|n| n.is_dir) {
            let children = match store.list(&cluster.key).await {
                Ok(children) => children,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            summary.clusters += 1;

            for child in children {
                let Some(value) = child.value else { continue };
                match self.layout.classify(&child.key) {
                    KeyKind::ClusterOptions { cluster_id } => {
                        if let Err(e) = ClusterOption::decode(&value) {
                            tracing::error!(cluster_id = %cluster_id, error = %e, "Failed to decode cluster option");
                        }
                    }
                    KeyKind::Instance { .. } => {
                        summary.instances += 1;
                        match ServerInstance::decode(&value) {
                            Ok(instance) if instance.need_check_health => {
                                self.registry.insert(&child.key, &instance.health_check_url);
                                summary.jobs += 1;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                summary.undecodable += 1;
                                tracing::error!(key = %child.key, error = %e, "Failed to decode server instance");
                            }
                        }
                    }
                    KeyKind::Root | KeyKind::Cluster { .. } | KeyKind::Other => {}
                }
            }
        }

        tracing::info!(
            clusters = summary.clusters,
            instances = summary.instances,
            jobs = summary.jobs,
            "Loaded health jobs from store"
        );
        Ok(summary)
    }

    /// Apply one change notification to the registry.
    pub fn handle_event(&self, event: &WatchEvent) -> Applied {
        let applied = match (self.layout.classify(&event.key), event.op) {
            (KeyKind::Instance { .. }, WatchOp::Set) => match ServerInstance::decode(&event.value) {
                Ok(instance) => Applied::Reconciled(self.registry.reconcile(&event.key, &instance)),
                Err(e) => {
                    tracing::error!(key = %event.key, error = %e, "Failed to decode watched instance");
                    Applied::Undecodable
                }
            },
            (KeyKind::Instance { .. }, WatchOp::Delete) => Applied::Deleted(self.registry.remove(&event.key)),
            (KeyKind::Root | KeyKind::Cluster { .. }, WatchOp::Delete) => {
                let dropped = self.registry.remove_prefix(&format!("{}/", event.key));
                if dropped > 0 {
                    tracing::info!(key = %event.key, jobs = dropped, "Directory deleted, dropped its health jobs");
                }
                Applied::Purged(dropped)
            }
            _ => Applied::Ignored,
        };

        match applied {
            Applied::Ignored | Applied::Reconciled(Reconciled::Unchanged) => {}
            _ => tracing::debug!(
                op = event.op.as_str(),
                instance = %last_segment(&event.key),
                outcome = applied.outcome(),
                "Applied watch event"
            ),
        }
        metrics::record_watch_event(event.op.as_str(), applied.outcome());
        applied
    }

    /// Apply events until the stream ends or shutdown is signalled.
    pub async fn run(self, mut events: WatchStream, mut shutdown: ShutdownSignal) {
        tracing::info!(root = %self.layout.clusters_root(), "Config watch starting");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(&event);
                    }
                    None => {
                        tracing::warn!("Config watch stream closed");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Config watch received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::clock::ManualClock;
    use crate::store::MemoryStore;
    use std::time::Duration;

    const KEY: &str = "/clusters/c1/i1";

    fn adapter() -> (Arc<InstanceTaskRegistry>, ConfigWatchAdapter) {
        let registry = Arc::new(InstanceTaskRegistry::new(
            Duration::from_secs(10),
            Arc::new(ManualClock::new()),
        ));
        let adapter = ConfigWatchAdapter::new(registry.clone(), KeyLayout::default());
        (registry, adapter)
    }

    fn record(check: bool, url: &str) -> String {
        ServerInstance {
            idx: "i1".to_string(),
            cluster_id: "c1".to_string(),
            need_check_health: check,
            health_check_url: url.to_string(),
            ..Default::default()
        }
        .encode()
        .unwrap()
    }

    #[tokio::test]
    async fn test_bulk_load_missing_root_is_empty() {
        let (registry, adapter) = adapter();
        let store = MemoryStore::new();
        assert_eq!(adapter.bulk_load(&store).await.unwrap(), LoadSummary::default());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_load_registers_checked_instances() {
        let (registry, adapter) = adapter();
        let store = MemoryStore::new();
        store.set("/clusters/c1/option", r#"{"idx":"c1","name":"web"}"#, None).await.unwrap();
        store.set(KEY, &record(true, "http://a/h"), None).await.unwrap();
        store.set("/clusters/c1/i2", &record(false, ""), None).await.unwrap();
        store.set("/clusters/c2/i3", "garbage", None).await.unwrap();

        let summary = adapter.bulk_load(&store).await.unwrap();
        assert_eq!(summary.clusters, 2);
        assert_eq!(summary.instances, 3);
        assert_eq!(summary.jobs, 1);
        assert_eq!(summary.undecodable, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(KEY).unwrap().target_url(), "http://a/h");
    }

    #[tokio::test]
    async fn test_bulk_load_root_not_directory_fails() {
        let (_, adapter) = adapter();
        let store = MemoryStore::new();
        store.set("/clusters", "oops", None).await.unwrap();
        assert!(adapter.bulk_load(&store).await.is_err());
    }

    #[test]
    fn test_events_drive_registry() {
        let (registry, adapter) = adapter();

        let applied = adapter.handle_event(&WatchEvent::set(KEY, record(true, "http://a/h")));
        assert_eq!(applied, Applied::Reconciled(Reconciled::Inserted));

        let applied = adapter.handle_event(&WatchEvent::set(KEY, record(true, "http://a/h")));
        assert_eq!(applied, Applied::Reconciled(Reconciled::Unchanged));

        let applied = adapter.handle_event(&WatchEvent::set(KEY, record(false, "http://a/h")));
        assert_eq!(applied, Applied::Reconciled(Reconciled::Removed));
        assert!(registry.is_empty());

        adapter.handle_event(&WatchEvent::set(KEY, record(true, "http://a/h")));
        assert_eq!(adapter.handle_event(&WatchEvent::delete(KEY)), Applied::Deleted(true));
        assert_eq!(adapter.handle_event(&WatchEvent::delete(KEY)), Applied::Deleted(false));
    }

    #[test]
    fn test_non_instance_and_undecodable_events() {
        let (registry, adapter) = adapter();
        adapter.handle_event(&WatchEvent::set(KEY, record(true, "http://a/h")));

        assert_eq!(
            adapter.handle_event(&WatchEvent::set("/clusters/c1/option", "{}")),
            Applied::Ignored
        );
        assert_eq!(adapter.handle_event(&WatchEvent::set("/clusters/c1", "")), Applied::Ignored);
        assert_eq!(adapter.handle_event(&WatchEvent::set("/other/c1/i1", "{}")), Applied::Ignored);
        assert_eq!(adapter.handle_event(&WatchEvent::set(KEY, "not json")), Applied::Undecodable);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_directory_delete_drops_jobs_below_it() {
        let (registry, adapter) = adapter();
        for key in [KEY, "/clusters/c1/i2", "/clusters/c10/i1", "/clusters/c2/i1"] {
            adapter.handle_event(&WatchEvent::set(key, record(true, "http://a/h")));
        }

        assert_eq!(adapter.handle_event(&WatchEvent::delete("/clusters/c1")), Applied::Purged(2));
        assert!(registry.contains("/clusters/c10/i1"));
        assert_eq!(adapter.handle_event(&WatchEvent::delete("/clusters/c1")), Applied::Purged(0));

        assert_eq!(adapter.handle_event(&WatchEvent::delete("/clusters")), Applied::Purged(2));
        assert!(registry.is_empty());
    }
}
