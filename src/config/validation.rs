//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. All violations are reported, not just the first.

use thiserror::Error;
use url::Url;

use crate::config::schema::{ManagerConfig, StoreBackend};

/// Upper bound for `health.cadence_secs`.
pub const MAX_CADENCE_SECS: u64 = 24 * 60 * 60;

/// Upper bound for `health.probe_timeout_secs`.
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 60 * 60;

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("store.endpoints must list at least one endpoint for the etcd backend")]
    MissingEndpoints,

    #[error("store endpoint '{0}' is not a valid http(s) URL")]
    InvalidEndpoint(String),

    #[error("{field} '{value}' must start with '/' and not end with '/'")]
    InvalidRoot { field: &'static str, value: String },

    #[error("store.options_marker must be a single non-empty path segment")]
    InvalidOptionsMarker,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} ({value}) exceeds the maximum of {max}")]
    TooLarge { field: &'static str, value: u64, max: u64 },

    #[error("health.pool_initial ({initial}) exceeds health.pool_max ({max})")]
    PoolCapacity { initial: usize, max: usize },

    #[error("health.poll_interval_ms ({poll_ms}) must be finer than the cadence ({cadence_ms} ms)")]
    PollSlowerThanCadence { poll_ms: u64, cadence_ms: u64 },

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let store = &config.store;
    if store.backend == StoreBackend::Etcd && store.endpoints.is_empty() {
        errors.push(ValidationError::MissingEndpoints);
    }
    for endpoint in &store.endpoints {
        match Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidEndpoint(endpoint.clone())),
        }
    }
    for (field, root) in [
        ("store.clusters_root", &store.clusters_root),
        ("store.apis_root", &store.apis_root),
        ("store.routings_root", &store.routings_root),
    ] {
        if !root.starts_with('/') || root.ends_with('/') || root.len() < 2 {
            errors.push(ValidationError::InvalidRoot { field, value: root.clone() });
        }
    }
    if store.options_marker.is_empty() || store.options_marker.contains('/') {
        errors.push(ValidationError::InvalidOptionsMarker);
    }
    if store.watch_poll_ms == 0 {
        errors.push(ValidationError::Zero { field: "store.watch_poll_ms" });
    }

    let health = &config.health;
    if health.cadence_secs == 0 {
        errors.push(ValidationError::Zero { field: "health.cadence_secs" });
    } else if health.cadence_secs > MAX_CADENCE_SECS {
        errors.push(ValidationError::TooLarge {
            field: "health.cadence_secs",
            value: health.cadence_secs,
            max: MAX_CADENCE_SECS,
        });
    }
    if health.probe_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "health.probe_timeout_secs" });
    } else if health.probe_timeout_secs > MAX_PROBE_TIMEOUT_SECS {
        errors.push(ValidationError::TooLarge {
            field: "health.probe_timeout_secs",
            value: health.probe_timeout_secs,
            max: MAX_PROBE_TIMEOUT_SECS,
        });
    }
    if health.poll_interval_ms == 0 {
        errors.push(ValidationError::Zero { field: "health.poll_interval_ms" });
    }
    if health.pool_max == 0 {
        errors.push(ValidationError::Zero { field: "health.pool_max" });
    } else if health.pool_initial > health.pool_max {
        errors.push(ValidationError::PoolCapacity {
            initial: health.pool_initial,
            max: health.pool_max,
        });
    }
    if health.result_buffer == 0 {
        errors.push(ValidationError::Zero { field: "health.result_buffer" });
    }
    let cadence_ms = health.cadence_secs.saturating_mul(1000);
    if health.cadence_secs > 0 && health.poll_interval_ms >= cadence_ms {
        errors.push(ValidationError::PollSlowerThanCadence {
            poll_ms: health.poll_interval_ms,
            cadence_ms,
        });
    }

    if config.admin.enabled && config.admin.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
