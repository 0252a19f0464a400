//! etcd v2 keys API client.
//!
//! # Responsibilities
//! - Get/set/delete/list over `/v2/keys`
//! - Fail over across endpoints on connection errors
//! - Long-poll watch with `waitIndex`, resyncing when the index is cleared
//!
//! # Design Decisions
//! - Timeouts do not fail over; a slow member is not a dead member
//! - HTTP-level errors (missing key, not a directory) return immediately
//! - Watch errors back off exponentially with jitter and never end the stream

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio::sync::mpsc;
use url::Url;

use crate::config::StoreConfig;
use crate::resilience::BackoffPolicy;
use crate::store::{ConfigStore, Node, StoreError, WatchEvent, WatchOp, WatchStream};

const WATCH_BUFFER: usize = 256;
const WATCH_BACKOFF: BackoffPolicy =
    BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(5));

// etcd v2 error codes.
const ERR_KEY_NOT_FOUND: u64 = 100;
const ERR_NOT_FILE: u64 = 102;
const ERR_NOT_DIR: u64 = 104;
const ERR_INDEX_CLEARED: u64 = 401;

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    action: String,
    node: Option<EtcdNode>,
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    #[serde(default)]
    key: String,
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
    #[serde(rename = "modifiedIndex", default)]
    modified_index: u64,
}

#[derive(Debug, Deserialize)]
struct EtcdErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    cause: String,
    #[serde(default)]
    index: u64,
}

#[derive(Debug)]
struct EtcdReply {
    index: Option<u64>,
    body: EtcdResponse,
}

/// Map an etcd action onto a watch operation.
fn watch_op(action: &str) -> Option<WatchOp> {
    match action {
        "set" | "create" | "update" | "compareAndSwap" => Some(WatchOp::Set),
        "delete" | "expire" | "compareAndDelete" => Some(WatchOp::Delete),
        _ => None,
    }
}

/// Decode a raw keys-API response.
fn decode_reply(status: u16, index: Option<u64>, body: &str) -> Result<EtcdReply, StoreError> {
    if (200..300).contains(&status) {
        let body: EtcdResponse =
            serde_json::from_str(body).map_err(|e| StoreError::Malformed(e.to_string()))?;
        return Ok(EtcdReply { index, body });
    }

    let err: EtcdErrorBody = serde_json::from_str(body).map_err(|_| StoreError::Server {
        code: u64::from(status),
        message: body.trim().to_string(),
    })?;
    Err(match err.error_code {
        ERR_KEY_NOT_FOUND => StoreError::NotFound(err.cause),
        ERR_NOT_FILE => StoreError::IsDirectory(err.cause),
        ERR_NOT_DIR => StoreError::NotDirectory(err.cause),
        ERR_INDEX_CLEARED => StoreError::IndexCleared { current: err.index },
        code => StoreError::Server { code, message: err.message },
    })
}

fn children(node: EtcdNode) -> Vec<Node> {
    let mut nodes: Vec<Node> = node
        .nodes
        .into_iter()
        .map(|child| Node {
            key: child.key,
            value: if child.dir { None } else { child.value },
            is_dir: child.dir,
        })
        .collect();
    nodes.sort_by(|a, b| a.key.cmp(&b.key));
    nodes
}

/// etcd v2 store with endpoint failover.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
    endpoints: Vec<Url>,
    request_timeout: Duration,
    watch_poll: Duration,
}

impl EtcdStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        if config.endpoints.is_empty() {
            return Err(StoreError::NoEndpoints);
        }
        let endpoints = config
            .endpoints
            .iter()
            .map(|raw| Url::parse(raw).map_err(|_| StoreError::InvalidEndpoint(raw.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let client = Client::builder()
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        tracing::info!(endpoints = ?config.endpoints, "etcd store configured");
        Ok(Self {
            client,
            endpoints,
            request_timeout: config.request_timeout(),
            watch_poll: config.watch_poll(),
        })
    }

    fn keys_url(endpoint: &Url, key: &str) -> String {
        let key = if key.starts_with('/') { key.to_string() } else { format!("/{}", key) };
        format!("{}/v2/keys{}", endpoint.as_str().trim_end_matches('/'), key)
    }

    /// Send a request built per endpoint, failing over on connection errors.
    async fn execute<F>(&self, key: &str, build: F) -> Result<EtcdReply, StoreError>
    where
        F: Fn(&Client, String) -> RequestBuilder,
    {
        let mut last_err = StoreError::NoEndpoints;
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            let url = Self::keys_url(endpoint, key);
            match build(&self.client, url).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let index = resp
                        .headers()
                        .get("x-etcd-index")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok());
                    let body = resp.text().await.map_err(|e| {
                        if e.is_timeout() {
                            StoreError::Timeout
                        } else {
                            StoreError::Transport(e.to_string())
                        }
                    })?;
                    return decode_reply(status, index, &body);
                }
                Err(e) if e.is_timeout() => return Err(StoreError::Timeout),
                Err(e) => {
                    tracing::warn!(endpoint_idx = i, endpoint = %endpoint, error = %e, "etcd request failed, trying next endpoint");
                    last_err = StoreError::Transport(e.to_string());
                }
            }
        }
        Err(last_err)
    }

    /// Current store index, used as the starting point of a watch.
    async fn current_index(&self) -> Result<u64, StoreError> {
        let timeout = self.request_timeout;
        let reply = self.execute("/", |c, url| c.get(url).timeout(timeout)).await?;
        reply
            .index
            .ok_or_else(|| StoreError::Malformed("missing X-Etcd-Index header".to_string()))
    }

    /// One long-poll request for changes at or after `index`.
    async fn poll_once(&self, root: &str, index: u64) -> Result<EtcdReply, StoreError> {
        let poll = self.watch_poll;
        let query = [
            ("wait", "true".to_string()),
            ("recursive", "true".to_string()),
            ("waitIndex", index.to_string()),
        ];
        self.execute(root, |c, url| c.get(url).query(&query).timeout(poll)).await
    }

    /// Follow changes under `root` starting at `wait_index`.
    async fn watch_loop(self, root: String, mut wait_index: u64, tx: mpsc::Sender<WatchEvent>) {
        let mut attempt: u32 = 0;

        loop {
            if tx.is_closed() {
                break;
            }

            match self.poll_once(&root, wait_index).await {
                Ok(reply) => {
                    attempt = 0;
                    let Some(node) = reply.body.node else {
                        continue;
                    };
                    wait_index = node.modified_index + 1;
                    let Some(op) = watch_op(&reply.body.action) else {
                        tracing::debug!(action = %reply.body.action, key = %node.key, "Ignoring etcd action");
                        continue;
                    };
                    let event = WatchEvent {
                        op,
                        key: node.key,
                        value: node.value.unwrap_or_default(),
                    };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                // Long poll expired without changes.
                Err(StoreError::Timeout) => {}
                Err(StoreError::IndexCleared { current }) => {
                    tracing::warn!(root = %root, current, "etcd watch index cleared, resuming from current index");
                    wait_index = current + 1;
                }
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    let delay = WATCH_BACKOFF.delay(attempt);
                    tracing::warn!(root = %root, error = %e, attempt, delay = ?delay, "etcd watch failed, backing off");
                    tokio::select! {
                        _ = tx.closed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
        tracing::debug!(root = %root, "etcd watch ended");
    }
}

#[async_trait]
impl ConfigStore for EtcdStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let timeout = self.request_timeout;
        let reply = self.execute(key, |c, url| c.get(url).timeout(timeout)).await?;
        let node = reply
            .body
            .node
            .ok_or_else(|| StoreError::Malformed("response without node".to_string()))?;
        if node.dir {
            return Err(StoreError::IsDirectory(key.to_string()));
        }
        node.value
            .ok_or_else(|| StoreError::Malformed(format!("node {} has no value", key)))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let timeout = self.request_timeout;
        let mut form = vec![("value", value.to_string())];
        if let Some(ttl) = ttl {
            form.push(("ttl", ttl.as_secs().max(1).to_string()));
        }
        self.execute(key, |c, url| c.put(url).form(&form).timeout(timeout)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str, recursive: bool) -> Result<(), StoreError> {
        let timeout = self.request_timeout;
        let query = [("recursive", recursive.to_string())];
        self.execute(key, |c, url| c.delete(url).query(&query).timeout(timeout)).await?;
        Ok(())
    }

    async fn list(&self, key: &str) -> Result<Vec<Node>, StoreError> {
        let timeout = self.request_timeout;
        let reply = self
            .execute(key, |c, url| c.get(url).query(&[("sorted", "true")]).timeout(timeout))
            .await?;
        let node = reply
            .body
            .node
            .ok_or_else(|| StoreError::Malformed("response without node".to_string()))?;
        if !node.dir {
            return Err(StoreError::NotDirectory(key.to_string()));
        }
        Ok(children(node))
    }

    /// The start index is read before returning, so every change committed
    /// after this call is delivered.
    async fn watch(&self, root: &str) -> Result<WatchStream, StoreError> {
        let start = self.current_index().await? + 1;
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        tokio::spawn(self.clone().watch_loop(root.to_string(), start, tx));
        tracing::info!(root = %root, wait_index = start, poll = ?self.watch_poll, "etcd watch started");
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_op_mapping() {
        assert_eq!(watch_op("set"), Some(WatchOp::Set));
        assert_eq!(watch_op("compareAndSwap"), Some(WatchOp::Set));
        assert_eq!(watch_op("expire"), Some(WatchOp::Delete));
        assert_eq!(watch_op("get"), None);
    }

    #[test]
    fn test_decode_directory_listing() {
        let body = r#"{
            "action": "get",
            "node": {
                "key": "/clusters/c1", "dir": true,
                "nodes": [
                    {"key": "/clusters/c1/option", "value": "{\"idx\":\"c1\"}", "modifiedIndex": 7},
                    {"key": "/clusters/c1/i1", "value": "{}", "modifiedIndex": 9}
                ],
                "modifiedIndex": 5
            }
        }"#;
        let reply = decode_reply(200, Some(12), body).unwrap();
        assert_eq!(reply.index, Some(12));
        let nodes = children(reply.body.node.unwrap());
        assert_eq!(nodes[0].key, "/clusters/c1/i1");
        assert_eq!(nodes[1].value.as_deref(), Some("{\"idx\":\"c1\"}"));
        assert!(!nodes[1].is_dir);
    }

    #[test]
    fn test_decode_error_codes() {
        let not_found = r#"{"errorCode":100,"message":"Key not found","cause":"/clusters/c9","index":31}"#;
        assert!(matches!(
            decode_reply(404, Some(31), not_found),
            Err(StoreError::NotFound(cause)) if cause == "/clusters/c9"
        ));

        let cleared = r#"{"errorCode":401,"message":"The event in requested index is outdated and cleared","cause":"the requested history has been cleared [1008/4]","index":2007}"#;
        assert!(matches!(
            decode_reply(400, None, cleared),
            Err(StoreError::IndexCleared { current: 2007 })
        ));

        assert!(matches!(
            decode_reply(502, None, "bad gateway"),
            Err(StoreError::Server { code: 502, .. })
        ));
    }

    #[test]
    fn test_keys_url() {
        let endpoint = Url::parse("http://127.0.0.1:2379/").unwrap();
        assert_eq!(
            EtcdStore::keys_url(&endpoint, "/clusters/c1"),
            "http://127.0.0.1:2379/v2/keys/clusters/c1"
        );
        assert_eq!(EtcdStore::keys_url(&endpoint, "x"), "http://127.0.0.1:2379/v2/keys/x");
    }

    #[test]
    fn test_new_requires_endpoints() {
        let config = StoreConfig::default();
        assert!(matches!(EtcdStore::new(&config), Err(StoreError::NoEndpoints)));

        let mut config = StoreConfig::default();
        config.endpoints = vec!["::not a url::".to_string()];
        assert!(matches!(EtcdStore::new(&config), Err(StoreError::InvalidEndpoint(_))));
    }
}
