//! Writes probe outcomes back to the instance records.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::cluster::{DecodeError, ServerInstance};
use crate::health::job::CheckResult;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::store::{ConfigStore, StoreError};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

pub struct ResultWriter {
    store: Arc<dyn ConfigStore>,
}

impl ResultWriter {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Read the current record, set its liveness and write it back.
    ///
    /// The write is unconditional: a concurrent edit landing between the
    /// read and the write is overwritten.
    pub async fn write_result(&self, result: &CheckResult) -> Result<(), WriteError> {
        let raw = self.store.get(&result.instance_key).await?;
        let mut instance = ServerInstance::decode(&raw)?;
        instance.is_alive = result.is_alive;
        self.store.set(&result.instance_key, &instance.encode()?, None).await?;
        Ok(())
    }

    /// Consume results until the channel closes or shutdown is signalled.
    pub async fn run(self, mut results: mpsc::Receiver<CheckResult>, mut shutdown: ShutdownSignal) {
        tracing::info!("Health result writer starting");
        loop {
            tokio::select! {
                result = results.recv() => match result {
                    Some(result) => self.apply(result).await,
                    None => {
                        tracing::debug!("Health result channel closed");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Health result writer received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn apply(&self, result: CheckResult) {
        match self.write_result(&result).await {
            Ok(()) => {
                metrics::record_liveness_write(true);
                tracing::debug!(key = %result.instance_key, is_alive = result.is_alive, "Liveness updated");
            }
            Err(e) => {
                metrics::record_liveness_write(false);
                tracing::error!(key = %result.instance_key, error = %e, "Failed to write liveness");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const KEY: &str = "/clusters/c1/i1";

    #[tokio::test]
    async fn test_write_sets_liveness_and_keeps_fields() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(KEY, r#"{"idx":"i1","name":"web","need_check_health":true,"zone":"eu"}"#, None)
            .await
            .unwrap();
        let writer = ResultWriter::new(store.clone());

        writer
            .write_result(&CheckResult { instance_key: KEY.to_string(), is_alive: true })
            .await
            .unwrap();

        let stored = ServerInstance::decode(&store.get(KEY).await.unwrap()).unwrap();
        assert!(stored.is_alive);
        assert_eq!(stored.name, "web");
        assert_eq!(stored.extra["zone"], "eu");
    }

    #[tokio::test]
    async fn test_write_missing_or_garbage_record_fails() {
        let store = Arc::new(MemoryStore::new());
        let writer = ResultWriter::new(store.clone());
        let result = CheckResult { instance_key: KEY.to_string(), is_alive: false };

        assert!(matches!(
            writer.write_result(&result).await,
            Err(WriteError::Store(StoreError::NotFound(_)))
        ));

        store.set(KEY, "garbage", None).await.unwrap();
        assert!(matches!(writer.write_result(&result).await, Err(WriteError::Decode(_))));
        assert_eq!(store.get(KEY).await.unwrap(), "garbage");
    }
}
