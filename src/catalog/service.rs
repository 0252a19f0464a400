//! Paged CRUD over one catalog root.

use std::marker::PhantomData;
use std::sync::Arc;

use uuid::Uuid;

use crate::catalog::types::{ApiDefinition, CatalogRecord, RoutingRule};
use crate::cluster::{DecodeError, ServiceError};
use crate::store::{ConfigStore, StoreError};

pub type ApiService = CatalogService<ApiDefinition>;
pub type RoutingService = CatalogService<RoutingRule>;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    pub items: Vec<R>,
    /// Number of stored records, independent of the page bounds.
    pub total: usize,
}

pub struct CatalogService<R> {
    store: Arc<dyn ConfigStore>,
    root: String,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for CatalogService<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            root: self.root.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: CatalogRecord> CatalogService<R> {
    pub fn new(store: Arc<dyn ConfigStore>, root: &str) -> Self {
        Self {
            store,
            root: root.trim_end_matches('/').to_string(),
            _record: PhantomData,
        }
    }

    fn key(&self, id: &str) -> String {
        format!("{}/{}", self.root, id)
    }

    /// Up to `limit` records starting at `offset`, in key order.
    ///
    /// A missing root is an empty catalog. Records that fail to decode are
    /// logged and left out of the page.
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Page<R>, ServiceError> {
        let nodes = match self.store.list(&self.root).await {
            Ok(nodes) => nodes,
            Err(StoreError::NotFound(_)) => return Ok(Page { items: Vec::new(), total: 0 }),
            Err(e) => return Err(e.into()),
        };

        let records: Vec<_> = nodes.into_iter().filter(|n| !n.is_dir).collect();
        let total = records.len();
        let mut items = Vec::new();
        for node in records.into_iter().skip(offset).take(limit) {
            let Some(value) = node.value else { continue };
            match serde_json::from_str::<R>(&value) {
                Ok(record) => items.push(record),
                Err(e) => tracing::error!(kind = R::KIND, key = %node.key, error = %e, "Failed to decode catalog record"),
            }
        }
        tracing::debug!(kind = R::KIND, limit, offset, total, "Listed catalog records");
        Ok(Page { items, total })
    }

    pub async fn get(&self, id: &str) -> Result<R, ServiceError> {
        let raw = self.store.get(&self.key(id)).await?;
        decode(&raw)
    }

    /// Store a new record under a fresh id and return the id.
    pub async fn create(&self, mut record: R) -> Result<String, ServiceError> {
        record.validate().map_err(ServiceError::Invalid)?;
        let id = Uuid::new_v4().simple().to_string();
        record.set_idx(id.clone());
        self.store.set(&self.key(&id), &encode(&record)?, None).await?;
        tracing::info!(kind = R::KIND, id = %id, "Catalog record created");
        Ok(id)
    }

    /// Replace an existing record. The stored id wins over any id in `record`.
    pub async fn update(&self, id: &str, mut record: R) -> Result<(), ServiceError> {
        record.validate().map_err(ServiceError::Invalid)?;
        let key = self.key(id);
        self.store.get(&key).await?;
        record.set_idx(id.to_string());
        self.store.set(&key, &encode(&record)?, None).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.store.delete(&self.key(id), false).await?;
        tracing::info!(kind = R::KIND, id = %id, "Catalog record deleted");
        Ok(())
    }
}

fn decode<R: CatalogRecord>(raw: &str) -> Result<R, ServiceError> {
    serde_json::from_str(raw).map_err(|e| ServiceError::Decode(DecodeError::from(e)))
}

fn encode<R: CatalogRecord>(record: &R) -> Result<String, ServiceError> {
    serde_json::to_string(record).map_err(|e| ServiceError::Decode(DecodeError::from(e)))
}
