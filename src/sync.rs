//! Blocking synchronization primitives shared by the executors.
//!
//! - [`Semaphore`]: a counting permit pool. `acquire` blocks while every permit is
//!   held; permits are RAII guards, so release happens on drop whether the job
//!   succeeded, failed or panicked.
//! - [`WaitGroup`]: a join barrier counting in-flight jobs.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("permit pool is closed")]
    Closed,
}

// Nothing runs user code while holding these locks, so a poisoned lock still
// guards consistent state.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct PoolState {
    available: usize,
    closed: bool,
}

/// Counting semaphore with a fixed number of permits.
#[derive(Debug)]
pub struct Semaphore {
    capacity: usize,
    state: Mutex<PoolState>,
    released: Condvar,
}

impl Semaphore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PoolState {
                available: capacity,
                closed: false,
            }),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        lock(&self.state).available
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Block until a permit is free, then take it.
    ///
    /// Returns [`AcquireError::Closed`] if the pool is closed before or while
    /// waiting.
    pub fn acquire(&self) -> Result<Permit<'_>, AcquireError> {
        self.take_one()?;
        Ok(Permit { pool: self })
    }

    /// Like [`Semaphore::acquire`], but the permit keeps the pool alive so it can
    /// be moved onto a `'static` thread.
    pub fn acquire_owned(self: &Arc<Self>) -> Result<OwnedPermit, AcquireError> {
        self.take_one()?;
        Ok(OwnedPermit {
            pool: Arc::clone(self),
        })
    }

    /// Refuse further acquisitions and wake every blocked acquirer.
    ///
    /// Outstanding permits stay valid and are still returned on drop.
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.released.notify_all();
    }

    fn take_one(&self) -> Result<(), AcquireError> {
        let mut state = lock(&self.state);
        loop {
            if state.closed {
                return Err(AcquireError::Closed);
            }
            if state.available > 0 {
                state.available -= 1;
                return Ok(());
            }
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn give_back(&self) {
        let mut state = lock(&self.state);
        state.available += 1;
        debug_assert!(state.available <= self.capacity);
        drop(state);
        self.released.notify_one();
    }
}

/// A permit borrowed from a [`Semaphore`]; returned on drop.
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct Permit<'a> {
    pool: &'a Semaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.pool.give_back();
    }
}

/// A permit that owns a handle to its [`Semaphore`]; returned on drop.
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct OwnedPermit {
    pool: Arc<Semaphore>,
}

impl Drop for OwnedPermit {
    fn drop(&mut self) {
        self.pool.give_back();
    }
}

#[derive(Debug, Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

/// Join barrier over a dynamic number of jobs.
///
/// Each job holds a [`WaitGuard`] from [`WaitGroup::enter`]; [`WaitGroup::wait`]
/// blocks until every guard has been dropped.
#[derive(Debug, Clone, Default)]
pub struct WaitGroup {
    inner: Arc<Pending>,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> WaitGuard {
        *lock(&self.inner.count) += 1;
        WaitGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn pending(&self) -> usize {
        *lock(&self.inner.count)
    }

    pub fn wait(&self) {
        let mut count = lock(&self.inner.count);
        while *count > 0 {
            count = self
                .inner
                .drained
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[must_use = "dropping a wait guard marks the job as done"]
#[derive(Debug)]
pub struct WaitGuard {
    inner: Arc<Pending>,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        let mut count = lock(&self.inner.count);
        *count -= 1;
        if *count == 0 {
            self.inner.drained.notify_all();
        }
    }
}
