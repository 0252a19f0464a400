//! In-process store.
//!
//! Directories are implicit: a key is a directory when other keys live below it.
//! TTLs are accepted and ignored. Recursive deletes emit one `Delete` event per
//! removed leaf so watchers see every instance disappear.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::store::{ConfigStore, Node, StoreError, WatchEvent, WatchStream};

const EVENT_CAPACITY: usize = 1024;
const WATCH_BUFFER: usize = 256;

pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Number of leaf values held.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(key: &str) -> String {
    let trimmed = key.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn dir_prefix(key: &str) -> String {
    if key == "/" {
        key.to_string()
    } else {
        format!("{}/", key)
    }
}

fn has_children(entries: &BTreeMap<String, String>, key: &str) -> bool {
    let prefix = dir_prefix(key);
    entries
        .range(prefix.clone()..)
        .next()
        .is_some_and(|(k, _)| k.starts_with(&prefix))
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let key = normalize(key);
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = entries.get(&key) {
            return Ok(value.clone());
        }
        if has_children(&entries, &key) {
            return Err(StoreError::IsDirectory(key));
        }
        Err(StoreError::NotFound(key))
    }

    async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
        let key = normalize(key);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if has_children(&entries, &key) {
            return Err(StoreError::IsDirectory(key));
        }
        let mut ancestor = key.as_str();
        while let Some(idx) = ancestor.rfind('/') {
            ancestor = &ancestor[..idx];
            if !ancestor.is_empty() && entries.contains_key(ancestor) {
                return Err(StoreError::NotDirectory(ancestor.to_string()));
            }
        }

        entries.insert(key.clone(), value.to_string());
        // Sent under the write lock so event order matches mutation order.
        let _ = self.events.send(WatchEvent::set(key, value));
        Ok(())
    }

    async fn delete(&self, key: &str, recursive: bool) -> Result<(), StoreError> {
        let key = normalize(key);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(&key).is_some() {
            let _ = self.events.send(WatchEvent::delete(key));
            return Ok(());
        }
        if !has_children(&entries, &key) {
            return Err(StoreError::NotFound(key));
        }
        if !recursive {
            return Err(StoreError::IsDirectory(key));
        }

        let prefix = dir_prefix(&key);
        let doomed: Vec<String> = entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for k in doomed {
            entries.remove(&k);
            let _ = self.events.send(WatchEvent::delete(k));
        }
        Ok(())
    }

    async fn list(&self, key: &str) -> Result<Vec<Node>, StoreError> {
        let key = normalize(key);
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&key) {
            return Err(StoreError::NotDirectory(key));
        }

        let prefix = dir_prefix(&key);
        let mut nodes: Vec<Node> = Vec::new();
        for (k, v) in entries.range(prefix.clone()..).take_while(|(k, _)| k.starts_with(&prefix)) {
            let rest = &k[prefix.len()..];
            let (segment, is_dir) = match rest.split_once('/') {
                Some((segment, _)) => (segment, true),
                None => (rest, false),
            };
            let child_key = format!("{}{}", prefix, segment);
            if nodes.last().is_some_and(|n| n.key == child_key) {
                continue;
            }
            nodes.push(Node {
                key: child_key,
                value: if is_dir { None } else { Some(v.clone()) },
                is_dir,
            });
        }

        if nodes.is_empty() && key != "/" {
            return Err(StoreError::NotFound(key));
        }
        Ok(nodes)
    }

    async fn watch(&self, root: &str) -> Result<WatchStream, StoreError> {
        let root = normalize(root);
        let prefix = dir_prefix(&root);
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    received = events.recv() => match received {
                        Ok(event) => {
                            if event.key != root && !event.key.starts_with(&prefix) {
                                continue;
                            }
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(root = %root, skipped, "Memory store watcher lagged, events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!(root = %root, "Memory store watch ended");
        });

        Ok(rx)
    }
}
