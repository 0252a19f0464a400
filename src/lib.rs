//! Gateway control plane: cluster registry and instance health monitoring.

pub mod admin;
pub mod catalog;
pub mod cluster;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::schema::ManagerConfig;
pub use health::engine::{EngineHandle, HealthEngine};
pub use lifecycle::Shutdown;
pub use store::{ConfigStore, MemoryStore};
