//! Catalog record types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record stored flat under one catalog root.
pub trait CatalogRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Singular name used in log lines and error messages.
    const KIND: &'static str;

    fn idx(&self) -> &str;

    fn set_idx(&mut self, idx: String);

    /// Check caller-supplied fields.
    fn validate(&self) -> Result<(), String>;
}

/// One upstream request of a combined API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApiCombination {
    pub path: String,
    /// Response field the upstream result is placed under.
    pub field: String,
    pub method: String,
    pub target_cluster_id: String,
}

/// How the gateway maps a public path and method onto a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApiDefinition {
    pub idx: String,
    pub path: String,
    pub method: String,
    pub target_cluster_id: String,
    pub rewrite_path: String,
    pub need_combine: bool,
    #[serde(rename = "api_combination")]
    pub combinations: Vec<ApiCombination>,
}

impl CatalogRecord for ApiDefinition {
    const KIND: &'static str = "api";

    fn idx(&self) -> &str {
        &self.idx
    }

    fn set_idx(&mut self, idx: String) {
        self.idx = idx;
    }

    fn validate(&self) -> Result<(), String> {
        require_path("path", &self.path)?;
        require("method", &self.method)?;
        require("target_cluster_id", &self.target_cluster_id)?;
        require_path("rewrite_path", &self.rewrite_path)?;
        if self.need_combine && self.combinations.is_empty() {
            return Err("api_combination must not be empty when need_combine is set".to_string());
        }
        for combination in &self.combinations {
            require_path("api_combination.path", &combination.path)?;
            require("api_combination.field", &combination.field)?;
            require("api_combination.method", &combination.method)?;
            require("api_combination.target_cluster_id", &combination.target_cluster_id)?;
        }
        Ok(())
    }
}

/// Prefix routing: requests under `prefix` go to `cluster_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RoutingRule {
    pub idx: String,
    pub prefix: String,
    pub cluster_id: String,
    pub need_strip_prefix: bool,
}

impl CatalogRecord for RoutingRule {
    const KIND: &'static str = "routing";

    fn idx(&self) -> &str {
        &self.idx
    }

    fn set_idx(&mut self, idx: String) {
        self.idx = idx;
    }

    fn validate(&self) -> Result<(), String> {
        require_path("prefix", &self.prefix)?;
        require("cluster_id", &self.cluster_id)
    }
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    Ok(())
}

fn require_path(field: &str, value: &str) -> Result<(), String> {
    require(field, value)?;
    if !value.starts_with('/') {
        return Err(format!("{} '{}' must start with '/'", field, value));
    }
    Ok(())
}
