//! Health jobs and probe results.
//!
//! # Cadence
//! ```text
//! origin ──cadence──▶ due ──cadence──▶ due ──cadence──▶ due
//!                      │ claimed late? next due stays on the grid
//! ```
//! A job is due once `now >= next_due`. Claiming it records the check time
//! and moves `next_due` to the first grid point after `now`; missed slots are
//! skipped, never replayed.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Outcome of one probe, consumed once by the result writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub instance_key: String,
    pub is_alive: bool,
}

#[derive(Debug, Clone, Copy)]
struct Schedule {
    next_due: Instant,
    last_check: Option<Instant>,
}

/// Scheduling state for one instance that needs health checking.
#[derive(Debug)]
pub struct HealthJob {
    instance_key: String,
    target_url: String,
    cadence: Duration,
    schedule: Mutex<Schedule>,
}

impl HealthJob {
    /// Create a job whose first probe is due one cadence after `now`.
    pub fn new(instance_key: impl Into<String>, target_url: impl Into<String>, cadence: Duration, now: Instant) -> Self {
        Self {
            instance_key: instance_key.into(),
            target_url: target_url.into(),
            cadence,
            schedule: Mutex::new(Schedule { next_due: now + cadence, last_check: None }),
        }
    }

    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn next_due(&self) -> Instant {
        self.schedule().next_due
    }

    pub fn last_check(&self) -> Option<Instant> {
        self.schedule().last_check
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.schedule().next_due
    }

    /// Claim the current slot if the cadence has elapsed at `now`.
    ///
    /// Returns `false` without side effects when the job is not due yet, so
    /// two concurrent claims for the same slot cannot both succeed.
    pub fn try_claim(&self, now: Instant) -> bool {
        let mut schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
        if now < schedule.next_due {
            return false;
        }

        schedule.last_check = Some(now);
        schedule.next_due = if self.cadence.is_zero() {
            now
        } else {
            let behind = now - schedule.next_due;
            let into_slot = (behind.as_nanos() % self.cadence.as_nanos()) as u64;
            now + (self.cadence - Duration::from_nanos(into_slot))
        };
        true
    }

    fn schedule(&self) -> Schedule {
        *self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CADENCE: Duration = Duration::from_secs(10);

    #[test]
    fn test_not_due_before_cadence() {
        let t0 = Instant::now();
        let job = HealthJob::new("/clusters/c1/i1", "http://h/health", CADENCE, t0);

        assert!(!job.is_due(t0));
        assert!(!job.try_claim(t0 + Duration::from_secs(9)));
        assert_eq!(job.last_check(), None);
        assert_eq!(job.next_due(), t0 + CADENCE);
    }

    #[test]
    fn test_claim_once_per_slot() {
        let t0 = Instant::now();
        let job = HealthJob::new("/clusters/c1/i1", "http://h/health", CADENCE, t0);
        let at = t0 + CADENCE;

        assert!(job.try_claim(at));
        assert!(!job.try_claim(at));
        assert_eq!(job.last_check(), Some(at));
        assert_eq!(job.next_due(), t0 + CADENCE * 2);
    }

    #[test]
    fn test_late_claim_stays_on_grid() {
        let t0 = Instant::now();
        let job = HealthJob::new("/clusters/c1/i1", "http://h/health", CADENCE, t0);

        // 35s in: slots at 10, 20 and 30 were missed; next is 40.
        assert!(job.try_claim(t0 + Duration::from_secs(35)));
        assert_eq!(job.next_due(), t0 + Duration::from_secs(40));
        assert!(!job.try_claim(t0 + Duration::from_secs(39)));
        assert!(job.try_claim(t0 + Duration::from_secs(40)));
    }

    #[test]
    fn test_zero_cadence_is_always_due() {
        let t0 = Instant::now();
        let job = HealthJob::new("k", "u", Duration::ZERO, t0);
        assert!(job.try_claim(t0));
        assert!(job.try_claim(t0));
    }
}
