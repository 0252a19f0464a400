//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Store watch failure:
//!     → backoff.rs (exponential delay with jitter)
//!     → retry the long poll
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline (see store and probe timeouts)
//! - Retries never give up for long-running loops; they slow down instead

pub mod backoff;

pub use backoff::BackoffPolicy;
