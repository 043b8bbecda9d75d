//! Incremental runner: jobs are submitted one at a time, with no total known up
//! front, and at most `width` of them execute concurrently.

use std::any::Any;
use std::convert::Infallible;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, trace};

use crate::config::normalize_width;
use crate::sync::{lock, AcquireError, Semaphore, WaitGroup};

type PanicPayload = Box<dyn Any + Send + 'static>;

struct Tally<E> {
    successes: AtomicUsize,
    failures: AtomicUsize,
    errors: Mutex<Vec<E>>,
    panic: Mutex<Option<PanicPayload>>,
}

impl<E> Tally<E> {
    fn record(&self, outcome: Result<(), E>) {
        match outcome {
            Ok(()) => {
                self.successes.fetch_add(1, Ordering::AcqRel);
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::AcqRel);
                lock(&self.errors).push(err);
            }
        }
    }

    fn record_panic(&self, payload: PanicPayload) {
        let mut slot = lock(&self.panic);
        if slot.is_none() {
            *slot = Some(payload);
        }
    }
}

/// Runs jobs with at most `width` executing at any one time, counting successes
/// and collecting errors.
///
/// With a width of 1 every job runs in-line on the submitting thread. Otherwise
/// [`Runner::run_err`] blocks until one of `width` permits is free and then runs
/// the job on its own thread.
///
/// Call [`Runner::finish`] to wait for outstanding jobs. Dropping a runner without
/// finishing it leaves running jobs detached.
///
/// ```
/// use concurrent::Runner;
///
/// let runner = Runner::new(4);
/// for i in 0..10u32 {
///     if runner.failures() > 0 {
///         break;
///     }
///     runner.run_err(move || if i == 7 { Err(format!("job {i}")) } else { Ok(()) });
/// }
/// let succeeded = runner.finish();
/// assert_eq!(succeeded + runner.failures(), 10);
/// ```
pub struct Runner<E = Infallible> {
    permits: Arc<Semaphore>,
    in_flight: WaitGroup,
    tally: Arc<Tally<E>>,
}

impl<E> std::fmt::Debug for Runner<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("width", &self.permits.capacity())
            .field("in_flight", &self.in_flight.pending())
            .field("successes", &self.tally.successes.load(Ordering::Acquire))
            .field("failures", &self.tally.failures.load(Ordering::Acquire))
            .finish()
    }
}

impl<E: Send + 'static> Runner<E> {
    /// Create a runner allowing `width` concurrent jobs; `0` uses the host
    /// parallelism.
    pub fn new(width: usize) -> Self {
        let width = normalize_width(width);
        debug!(width, "runner created");
        Self {
            permits: Arc::new(Semaphore::new(width)),
            in_flight: WaitGroup::new(),
            tally: Arc::new(Tally {
                successes: AtomicUsize::new(0),
                failures: AtomicUsize::new(0),
                errors: Mutex::new(Vec::new()),
                panic: Mutex::new(None),
            }),
        }
    }

    pub fn width(&self) -> usize {
        self.permits.capacity()
    }

    /// Submit a job that reports failure through its `Err`.
    ///
    /// # Panics
    ///
    /// Panics if called after [`Runner::finish`]. With a width of 1, a panic in
    /// `job` propagates to the caller directly.
    pub fn run_err<F>(&self, job: F)
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
    {
        if self.width() == 1 {
            assert!(
                !self.permits.is_closed(),
                "job submitted to a Runner after finish()"
            );
            self.tally.record(job());
            return;
        }

        let permit = match self.permits.acquire_owned() {
            Ok(permit) => permit,
            Err(AcquireError::Closed) => panic!("job submitted to a Runner after finish()"),
        };
        let done = self.in_flight.enter();
        let tally = Arc::clone(&self.tally);
        thread::spawn(move || {
            // Dropped in reverse: the permit goes back before the job counts as done.
            let _done = done;
            let _permit = permit;
            match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(outcome) => tally.record(outcome),
                Err(payload) => tally.record_panic(payload),
            }
        });
    }

    /// Submit a job that cannot fail.
    pub fn run<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.run_err(move || {
            job();
            Ok(())
        });
    }

    /// Failures reported so far. Does not block, so submission loops can poll it
    /// to stop early.
    pub fn failures(&self) -> usize {
        self.tally.failures.load(Ordering::Acquire)
    }

    /// Successes reported so far.
    pub fn successes(&self) -> usize {
        self.tally.successes.load(Ordering::Acquire)
    }

    /// A copy of the errors reported so far, in completion order.
    pub fn errors(&self) -> Vec<E>
    where
        E: Clone,
    {
        lock(&self.tally.errors).clone()
    }

    /// Wait for every submitted job to complete, close the runner to further
    /// submissions and return the number of jobs that succeeded.
    ///
    /// # Panics
    ///
    /// Re-raises the first panic from a job that ran on its own thread. Such jobs
    /// count as neither success nor failure.
    pub fn finish(&self) -> usize {
        trace!(in_flight = self.in_flight.pending(), "waiting for jobs");
        self.in_flight.wait();
        self.permits.close();

        if let Some(payload) = lock(&self.tally.panic).take() {
            panic::resume_unwind(payload);
        }

        let successes = self.successes();
        debug!(successes, failures = self.failures(), "runner finished");
        successes
    }

    /// Finish the runner and take every collected error, in completion order.
    ///
    /// # Panics
    ///
    /// Re-raises the first panic from a job that ran on its own thread, as
    /// [`Runner::finish`] does.
    pub fn into_errors(self) -> Vec<E> {
        self.finish();
        mem::take(&mut *lock(&self.tally.errors))
    }
}
