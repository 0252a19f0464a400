//! Configuration store access.
//!
//! # Data Flow
//! ```text
//! etcd cluster (v2 keys API)           in-process map (tests, local runs)
//!     → etcd.rs (HTTP, failover)           → memory.rs
//!             \                               /
//!              → ConfigStore trait (get/set/delete/list/watch)
//!                   → cluster service (management API)
//!                   → health engine (bulk load, watch, liveness writes)
//! ```
//!
//! # Design Decisions
//! - The store is the single source of truth; nothing here caches values
//! - Watch streams deliver events in store order over a bounded channel
//! - A watch stream ends when its receiver is dropped

pub mod etcd;
pub mod keys;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::schema::{StoreBackend, StoreConfig};

pub use etcd::EtcdStore;
pub use keys::{KeyKind, KeyLayout};
pub use memory::MemoryStore;

/// Receiving half of a watch subscription.
pub type WatchStream = mpsc::Receiver<WatchEvent>;

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("key is a directory: {0}")]
    IsDirectory(String),

    #[error("key is not a directory: {0}")]
    NotDirectory(String),

    #[error("invalid store endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("no store endpoints configured")]
    NoEndpoints,

    #[error("store request timed out")]
    Timeout,

    #[error("watch index cleared, store is at index {current}")]
    IndexCleared { current: u64 },

    #[error("store transport error: {0}")]
    Transport(String),

    #[error("store error {code}: {message}")]
    Server { code: u64, message: String },

    #[error("malformed store response: {0}")]
    Malformed(String),
}

/// One child entry returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: String,
    pub value: Option<String>,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOp {
    Set,
    Delete,
}

impl WatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchOp::Set => "set",
            WatchOp::Delete => "delete",
        }
    }
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub op: WatchOp,
    pub key: String,
    /// New value for `Set`, empty for `Delete`.
    pub value: String,
}

impl WatchEvent {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { op: WatchOp::Set, key: key.into(), value: value.into() }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self { op: WatchOp::Delete, key: key.into(), value: String::new() }
    }
}

/// Hierarchical key/value store with change notifications.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the value stored at `key`.
    async fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Write `value` at `key`, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Remove `key`; directories require `recursive`.
    async fn delete(&self, key: &str, recursive: bool) -> Result<(), StoreError>;

    /// List the direct children of the directory at `key`, ordered by key.
    async fn list(&self, key: &str) -> Result<Vec<Node>, StoreError>;

    /// Subscribe to changes at or below `root`.
    async fn watch(&self, root: &str) -> Result<WatchStream, StoreError>;
}

/// Build the store selected by configuration.
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn ConfigStore>, StoreError> {
    match config.backend {
        StoreBackend::Etcd => Ok(Arc::new(EtcdStore::new(config)?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
