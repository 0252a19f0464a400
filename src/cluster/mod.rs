//! Cluster registry records.
//!
//! # Data Flow
//! ```text
//! management API request
//!     → service.rs (validate, assign ids, read-modify-write)
//!     → ConfigStore (JSON records under the clusters root)
//!     → watch events feed the health engine
//! ```
//!
//! # Design Decisions
//! - The store owns every record; nothing is cached here
//! - Instance updates keep liveness, which is owned by the health engine

pub mod service;
pub mod types;

pub use service::{ClusterService, ServiceError};
pub use types::{Cluster, ClusterOption, DecodeError, InstanceSpec, ServerInstance};
