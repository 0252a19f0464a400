//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the manager.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// Configuration store connection and key layout.
    pub store: StoreConfig,

    /// Health check engine settings.
    pub health: HealthCheckConfig,

    /// Management API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Which store implementation backs the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Etcd,
    Memory,
}

/// Configuration store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store implementation.
    pub backend: StoreBackend,

    /// etcd endpoints, tried in order (e.g., "http://127.0.0.1:2379").
    pub endpoints: Vec<String>,

    /// Root directory holding all clusters.
    pub clusters_root: String,

    /// Reserved child name carrying cluster metadata.
    pub options_marker: String,

    /// Directory holding API definitions.
    pub apis_root: String,

    /// Directory holding routing rules.
    pub routings_root: String,

    /// Long-poll duration of a single watch request in milliseconds.
    pub watch_poll_ms: u64,

    /// Timeout for plain get/set/delete requests in seconds.
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Etcd,
            endpoints: Vec::new(),
            clusters_root: "/clusters".to_string(),
            options_marker: "option".to_string(),
            apis_root: "/apis".to_string(),
            routings_root: "/routings".to_string(),
            watch_poll_ms: 1000,
            request_timeout_secs: 5,
        }
    }
}

impl StoreConfig {
    pub fn watch_poll(&self) -> Duration {
        Duration::from_millis(self.watch_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the health check engine.
    pub enabled: bool,

    /// Minimum interval between two probes of one instance, in seconds.
    /// At most one day.
    pub cadence_secs: u64,

    /// Probe timeout in seconds.
    pub probe_timeout_secs: u64,

    /// Scheduler poll interval in milliseconds. Must be finer than the cadence.
    pub poll_interval_ms: u64,

    /// Checkers created up front.
    pub pool_initial: usize,

    /// Maximum idle checkers kept by the pool.
    pub pool_max: usize,

    /// Capacity of the probe result channel.
    pub result_buffer: usize,

    /// User-Agent header sent with probes.
    pub user_agent: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cadence_secs: 10,
            probe_timeout_secs: 5,
            poll_interval_ms: 100,
            pool_initial: 10,
            pool_max: 100,
            result_buffer: 100,
            user_agent: "gateway-manager-health-check".to_string(),
        }
    }
}

impl HealthCheckConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Management API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the management API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Bind address.
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "0.0.0.0:8999".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl AdminConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_cadences() {
        let config = ManagerConfig::default();
        assert_eq!(config.health.cadence(), Duration::from_secs(10));
        assert_eq!(config.health.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.health.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.store.clusters_root, "/clusters");
        assert_eq!(config.store.apis_root, "/apis");
        assert_eq!(config.store.routings_root, "/routings");
        assert_eq!(config.store.backend, StoreBackend::Etcd);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ManagerConfig = toml::from_str(
            r#"
            [store]
            backend = "memory"

            [health]
            cadence_secs = 3

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.options_marker, "option");
        assert_eq!(config.health.cadence_secs, 3);
        assert_eq!(config.health.pool_max, 100);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
