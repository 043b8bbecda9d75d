use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, trace};

use crate::sync::{lock, Semaphore};

/// Run `worker` over every unit with at most `width` units executing at once,
/// then join.
///
/// `width` must already be normalized. With `width <= 1` units run in-line, in
/// order, and the first error returns immediately. Otherwise each unit gets its
/// own scoped thread gated by a permit; once any unit fails no further units are
/// submitted, but units already running are left to finish. The error returned is
/// whichever failure claimed the first slot, which depends on completion order.
///
/// A panicking worker is re-raised on the calling thread after the join.
pub(crate) fn dispatch<U, I, W, E>(width: usize, units: I, worker: &W) -> Result<(), E>
where
    I: IntoIterator<Item = U>,
    U: Send,
    W: Fn(U) -> Result<(), E> + Sync,
    E: Send,
{
    if width <= 1 {
        trace!("running units in-line");
        for unit in units {
            worker(unit)?;
        }
        return Ok(());
    }

    let permits = Semaphore::new(width);
    let failures = AtomicUsize::new(0);
    let first_err: Mutex<Option<E>> = Mutex::new(None);

    thread::scope(|scope| {
        let mut submitted = 0usize;
        for unit in units {
            let Ok(permit) = permits.acquire() else {
                break;
            };
            let failed = failures.load(Ordering::Acquire);
            if failed > 0 {
                debug!(submitted, failed, "unit failed; no further units will be submitted");
                break;
            }
            submitted += 1;

            let failures = &failures;
            let first_err = &first_err;
            scope.spawn(move || {
                let _permit = permit;
                if let Err(err) = worker(unit) {
                    if failures.fetch_add(1, Ordering::AcqRel) == 0 {
                        *lock(first_err) = Some(err);
                    }
                }
            });
        }
        trace!(submitted, "waiting for submitted units");
    });

    match first_err
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
    {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
