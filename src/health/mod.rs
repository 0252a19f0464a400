//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigStore
//!     → watch.rs (bulk load at start, then watch events)
//!     → registry.rs (one job per instance that needs checking)
//!     → scheduler.rs (polls for due jobs)
//!     → pool.rs / checker.rs (HTTP GET, 200 means alive)
//!     → writer.rs (is_alive written back to the instance record)
//! ```
//!
//! # Design Decisions
//! - Each job carries its own schedule; the registry lock is never held
//!   across a probe
//! - A job claims its cadence slot before probing, so one slot yields at
//!   most one result
//! - The watch is subscribed before the bulk load

pub mod checker;
pub mod clock;
pub mod engine;
pub mod job;
pub mod pool;
pub mod registry;
pub mod scheduler;
pub mod watch;
pub mod writer;

pub use checker::Checker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineError, EngineHandle, HealthEngine};
pub use job::{CheckResult, HealthJob};
pub use pool::{CheckerPool, PoolError, PooledChecker, Reusable};
pub use registry::{InstanceTaskRegistry, JobSnapshot, Reconciled};
pub use watch::{Applied, ConfigWatchAdapter, LoadSummary};
pub use writer::ResultWriter;
