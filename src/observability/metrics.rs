//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_health_probes_total` (counter): probes by result (alive, dead)
//! - `gateway_health_registry_jobs` (gauge): jobs currently registered
//! - `gateway_health_watch_events_total` (counter): watch events by op, outcome
//! - `gateway_health_liveness_writes_total` (counter): write-backs by result
//! - `gateway_health_pool_idle_checkers` (gauge): idle checkers in the pool
//! - `gateway_admin_requests_total` (counter): management API calls by route, status
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_probe(is_alive: bool) {
    let result = if is_alive { "alive" } else { "dead" };
    counter!("gateway_health_probes_total", "result" => result).increment(1);
}

pub fn record_registry_jobs(count: usize) {
    gauge!("gateway_health_registry_jobs").set(count as f64);
}

pub fn record_watch_event(op: &'static str, outcome: &'static str) {
    counter!("gateway_health_watch_events_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_liveness_write(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("gateway_health_liveness_writes_total", "result" => result).increment(1);
}

pub fn record_pool_idle(idle: usize) {
    gauge!("gateway_health_pool_idle_checkers").set(idle as f64);
}

pub fn record_admin_request(route: &str, status: u16) {
    counter!(
        "gateway_admin_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
