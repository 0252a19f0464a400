//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! health engine, store, management API
//!     → logging.rs (tracing events, pretty or JSON)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event, never interpolated keys
//! - Metrics cost nothing until the exporter is installed

pub mod logging;
pub mod metrics;
