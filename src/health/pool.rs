//! Bounded pool of reusable health checkers.
//!
//! The pool hands out idle checkers first and falls back to the factory when
//! none are idle. Released checkers go back to the idle queue until it holds
//! `max_capacity` entries; anything beyond that is closed and dropped. Once
//! the pool is closed every idle checker is closed and later calls fail with
//! [`PoolError::PoolClosed`].

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Something the pool can recycle.
pub trait Reusable: Send + 'static {
    /// Release the underlying resources. The value must not be used again.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

type Factory<C> = Box<dyn Fn() -> Result<C, BoxError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool capacity: initial {initial}, max {max}")]
    InvalidConfiguration { initial: usize, max: usize },

    #[error("checker factory failed: {0}")]
    Factory(#[source] BoxError),

    #[error("checker pool is closed")]
    PoolClosed,

    #[error("cannot release a closed checker")]
    InvalidArgument,
}

pub struct CheckerPool<C: Reusable> {
    /// `None` once the pool is closed.
    idle: Mutex<Option<VecDeque<C>>>,
    factory: Factory<C>,
    max_capacity: usize,
}

impl<C: Reusable> std::fmt::Debug for CheckerPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckerPool")
            .field("idle", &self.len())
            .field("max_capacity", &self.max_capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<C: Reusable> CheckerPool<C> {
    /// Build a pool pre-filled with `initial` checkers.
    ///
    /// If the factory fails partway, the checkers created so far are closed
    /// and the factory error is returned.
    pub fn new<F>(initial: usize, max_capacity: usize, factory: F) -> Result<Self, PoolError>
    where
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
    {
        if max_capacity == 0 || initial > max_capacity {
            return Err(PoolError::InvalidConfiguration { initial, max: max_capacity });
        }

        let mut idle = VecDeque::with_capacity(max_capacity);
        for _ in 0..initial {
            match factory() {
                Ok(checker) => idle.push_back(checker),
                Err(e) => {
                    for mut checker in idle.drain(..) {
                        checker.close();
                    }
                    return Err(PoolError::Factory(e));
                }
            }
        }

        Ok(Self {
            idle: Mutex::new(Some(idle)),
            factory: Box::new(factory),
            max_capacity,
        })
    }

    /// Take an idle checker, or create one if none is idle.
    pub fn acquire(&self) -> Result<C, PoolError> {
        {
            let mut idle = self.lock();
            match idle.as_mut() {
                None => return Err(PoolError::PoolClosed),
                Some(queue) => {
                    if let Some(checker) = queue.pop_front() {
                        return Ok(checker);
                    }
                }
            }
        }
        (self.factory)().map_err(PoolError::Factory)
    }

    /// Acquire a checker that returns itself to the pool when dropped.
    pub fn acquire_scoped(self: &Arc<Self>) -> Result<PooledChecker<C>, PoolError> {
        let checker = self.acquire()?;
        Ok(PooledChecker {
            checker: Some(checker),
            pool: Arc::clone(self),
        })
    }

    /// Return a checker to the pool.
    ///
    /// Once the pool is closed every release fails with
    /// [`PoolError::PoolClosed`] and the checker is closed if it was still
    /// open. On an open pool a closed checker is rejected with
    /// [`PoolError::InvalidArgument`].
    pub fn release(&self, mut checker: C) -> Result<(), PoolError> {
        let mut idle = self.lock();
        let Some(queue) = idle.as_mut() else {
            if !checker.is_closed() {
                checker.close();
            }
            return Err(PoolError::PoolClosed);
        };

        if checker.is_closed() {
            return Err(PoolError::InvalidArgument);
        }
        if queue.len() < self.max_capacity {
            queue.push_back(checker);
        } else {
            checker.close();
        }
        Ok(())
    }

    /// Close every idle checker. Safe to call more than once.
    pub fn close(&self) {
        let drained = self.lock().take();
        if let Some(queue) = drained {
            let count = queue.len();
            for mut checker in queue {
                checker.close();
            }
            tracing::debug!(closed = count, "Checker pool closed");
        }
    }

    /// Number of idle checkers; 0 once closed.
    pub fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<VecDeque<C>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A checker on loan from a [`CheckerPool`].
pub struct PooledChecker<C: Reusable> {
    checker: Option<C>,
    pool: Arc<CheckerPool<C>>,
}

impl<C: Reusable> Deref for PooledChecker<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.checker.as_ref().unwrap_or_else(|| unreachable!("checker taken before drop"))
    }
}

impl<C: Reusable> DerefMut for PooledChecker<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.checker.as_mut().unwrap_or_else(|| unreachable!("checker taken before drop"))
    }
}

impl<C: Reusable> Drop for PooledChecker<C> {
    fn drop(&mut self) {
        if let Some(checker) = self.checker.take() {
            if let Err(e) = self.pool.release(checker) {
                tracing::trace!(error = %e, "Checker not returned to pool");
            }
        }
    }
}
