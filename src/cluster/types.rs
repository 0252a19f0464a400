//! Stored record types.
//!
//! Records are JSON documents written at the keys described in
//! [`crate::store::keys`]. Fields this crate does not know about are kept
//! on rewrite so other writers' data survives a liveness update.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored record could not be decoded or encoded.
#[derive(Debug, Error)]
#[error("malformed record: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// One backend server of a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerInstance {
    pub idx: String,
    pub name: String,
    pub addr: String,
    pub weight: i64,
    pub cluster_id: String,
    pub need_check_health: bool,
    pub health_check_url: String,
    pub is_alive: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerInstance {
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> Result<String, DecodeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Cluster-level metadata stored under the options marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClusterOption {
    pub idx: String,
    pub name: String,
}

impl ClusterOption {
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> Result<String, DecodeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A cluster with its instances, as served by the management API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub idx: String,
    pub name: String,
    pub instances: Vec<ServerInstance>,
}

/// Caller-supplied fields of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,
    pub addr: String,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default)]
    pub need_check_health: bool,
    #[serde(default)]
    pub health_check_url: String,
}

fn default_weight() -> i64 {
    1
}
