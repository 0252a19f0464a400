//! API definitions and routing rules read by the gateway.
//!
//! # Data Flow
//! ```text
//! management API request
//!     → service.rs (validate, assign id, page listings)
//!     → ConfigStore (one JSON record per id under its root)
//!     → gateway process watches the same roots
//! ```
//!
//! # Design Decisions
//! - Records are flat: `{root}/{id}`, nothing nested below an id
//! - Listings page over the stored order; `total` counts every child, even
//!   ones that fail to decode

pub mod service;
pub mod types;

pub use service::{ApiService, CatalogService, Page, RoutingService};
pub use types::{ApiCombination, ApiDefinition, CatalogRecord, RoutingRule};
