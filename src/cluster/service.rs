//! Cluster and instance CRUD on top of the configuration store.

use std::sync::Arc;

use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::cluster::types::{Cluster, ClusterOption, DecodeError, InstanceSpec, ServerInstance};
use crate::store::keys::last_segment;
use crate::store::{ConfigStore, KeyKind, KeyLayout, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid request: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct ClusterService {
    store: Arc<dyn ConfigStore>,
    layout: KeyLayout,
}

impl ClusterService {
    pub fn new(store: Arc<dyn ConfigStore>, layout: KeyLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// All clusters that have at least one instance.
    pub async fn list_clusters(&self) -> Result<Vec<Cluster>, ServiceError> {
        let nodes = match self.store.list(self.layout.clusters_root()).await {
            Ok(nodes) => nodes,
            Err(StoreError::NotFound(_)) | Err(StoreError::NotDirectory(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut clusters = Vec::new();
        for node in nodes.into_iter().filter(|n| n.is_dir) {
            let cluster_id = last_segment(&node.key).to_string();
            match self.load_cluster(&cluster_id).await {
                Ok(cluster) if !cluster.instances.is_empty() => clusters.push(cluster),
                Ok(_) => {}
                Err(e) => tracing::warn!(cluster_id = %cluster_id, error = %e, "Skipping unreadable cluster"),
            }
        }
        Ok(clusters)
    }

    pub async fn cluster_ids(&self) -> Result<Vec<String>, ServiceError> {
        match self.store.list(self.layout.clusters_root()).await {
            Ok(nodes) => Ok(nodes
                .iter()
                .filter(|n| n.is_dir)
                .map(|n| last_segment(&n.key).to_string())
                .collect()),
            Err(StoreError::NotFound(_)) | Err(StoreError::NotDirectory(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster, ServiceError> {
        self.load_cluster(cluster_id).await
    }

    async fn load_cluster(&self, cluster_id: &str) -> Result<Cluster, ServiceError> {
        let nodes = self.store.list(&self.layout.cluster_key(cluster_id)).await?;

        let mut option = ClusterOption::default();
        let mut instances = Vec::new();
        for node in nodes {
            let Some(value) = node.value else { continue };
            match self.layout.classify(&node.key) {
                KeyKind::ClusterOptions { .. } => match ClusterOption::decode(&value) {
                    Ok(decoded) => option = decoded,
                    Err(e) => tracing::error!(key = %node.key, error = %e, "Failed to decode cluster option"),
                },
                KeyKind::Instance { .. } => match ServerInstance::decode(&value) {
                    Ok(instance) => instances.push(instance),
                    Err(e) => tracing::error!(key = %node.key, error = %e, "Failed to decode server instance"),
                },
                KeyKind::Root | KeyKind::Cluster { .. } | KeyKind::Other => {}
            }
        }

        Ok(Cluster {
            idx: cluster_id.to_string(),
            name: option.name,
            instances,
        })
    }

    /// Create a cluster and its instances, returning the new cluster id.
    pub async fn create_cluster(
        &self,
        name: &str,
        instances: Vec<InstanceSpec>,
    ) -> Result<String, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Invalid("cluster name must not be empty".to_string()));
        }
        for spec in &instances {
            validate_spec(spec)?;
        }

        let cluster_id = Uuid::new_v4().simple().to_string();
        let option = ClusterOption { idx: cluster_id.clone(), name: name.to_string() };
        self.store
            .set(&self.layout.options_key(&cluster_id), &option.encode()?, None)
            .await?;

        for spec in instances {
            let instance_id = Uuid::new_v4().simple().to_string();
            let instance = build_instance(&cluster_id, &instance_id, spec, false);
            let key = self.layout.instance_key(&cluster_id, &instance_id);
            if let Err(e) = self.store.set(&key, &instance.encode()?, None).await {
                tracing::error!(key = %key, error = %e, "Failed to store cluster instance");
            }
        }

        tracing::info!(cluster_id = %cluster_id, name = %name, "Cluster created");
        Ok(cluster_id)
    }

    pub async fn rename_cluster(&self, cluster_id: &str, name: &str) -> Result<(), ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Invalid("cluster name must not be empty".to_string()));
        }
        let option = ClusterOption { idx: cluster_id.to_string(), name: name.to_string() };
        self.store
            .set(&self.layout.options_key(cluster_id), &option.encode()?, None)
            .await?;
        Ok(())
    }

    pub async fn delete_cluster(&self, cluster_id: &str) -> Result<(), ServiceError> {
        self.store.delete(&self.layout.cluster_key(cluster_id), true).await?;
        tracing::info!(cluster_id = %cluster_id, "Cluster deleted");
        Ok(())
    }

    pub async fn add_instance(
        &self,
        cluster_id: &str,
        spec: InstanceSpec,
    ) -> Result<String, ServiceError> {
        validate_spec(&spec)?;
        let instance_id = Uuid::new_v4().simple().to_string();
        let instance = build_instance(cluster_id, &instance_id, spec, false);
        self.store
            .set(&self.layout.instance_key(cluster_id, &instance_id), &instance.encode()?, None)
            .await?;
        Ok(instance_id)
    }

    pub async fn get_instance(
        &self,
        cluster_id: &str,
        instance_id: &str,
    ) -> Result<ServerInstance, ServiceError> {
        let raw = self.store.get(&self.layout.instance_key(cluster_id, instance_id)).await?;
        Ok(ServerInstance::decode(&raw)?)
    }

    /// Replace the caller-owned fields of an instance. Liveness and unknown
    /// fields of the stored record are kept.
    pub async fn update_instance(
        &self,
        cluster_id: &str,
        instance_id: &str,
        spec: InstanceSpec,
    ) -> Result<(), ServiceError> {
        validate_spec(&spec)?;
        let key = self.layout.instance_key(cluster_id, instance_id);
        let current = ServerInstance::decode(&self.store.get(&key).await?)?;

        let mut updated = build_instance(cluster_id, instance_id, spec, current.is_alive);
        updated.extra = current.extra;
        self.store.set(&key, &updated.encode()?, None).await?;
        Ok(())
    }

    pub async fn delete_instance(&self, cluster_id: &str, instance_id: &str) -> Result<(), ServiceError> {
        self.store
            .delete(&self.layout.instance_key(cluster_id, instance_id), false)
            .await?;
        Ok(())
    }
}

fn build_instance(cluster_id: &str, instance_id: &str, spec: InstanceSpec, is_alive: bool) -> ServerInstance {
    ServerInstance {
        idx: instance_id.to_string(),
        name: spec.name,
        addr: spec.addr,
        weight: spec.weight,
        cluster_id: cluster_id.to_string(),
        need_check_health: spec.need_check_health,
        health_check_url: spec.health_check_url,
        is_alive,
        extra: Default::default(),
    }
}

fn validate_spec(spec: &InstanceSpec) -> Result<(), ServiceError> {
    if spec.addr.trim().is_empty() {
        return Err(ServiceError::Invalid("instance addr must not be empty".to_string()));
    }
    if spec.need_check_health {
        match Url::parse(&spec.health_check_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ServiceError::Invalid(format!(
                    "health_check_url '{}' must be an http(s) URL when need_check_health is set",
                    spec.health_check_url
                )))
            }
        }
    }
    Ok(())
}
