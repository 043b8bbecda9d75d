//! Sweep executor: one task per index in `0..count`.

use std::convert::Infallible;

use tracing::debug;

use crate::config::clamp_width;
use crate::dispatch::dispatch;

/// Run `worker(index)` for every index in `0..count`, with at most `width` calls
/// executing at once, returning the first error observed.
///
/// A `width` of `0` uses the host parallelism; widths above `count` are clamped to
/// `count`.
///
/// The two execution modes stop differently on failure:
/// - width 1: indices run in-line in ascending order and the first error returns
///   immediately, so no later index is attempted.
/// - width > 1: once a failure is observed no further indices are submitted, but
///   indices already running complete before this returns. With several failures,
///   which error is returned depends on completion order.
///
/// # Panics
///
/// Panics on the calling thread if a worker panicked, after every submitted index
/// has finished.
pub fn try_for_each_index<F, E>(count: usize, width: usize, worker: F) -> Result<(), E>
where
    F: Fn(usize) -> Result<(), E> + Sync,
    E: Send,
{
    if count == 0 {
        return Ok(());
    }

    let width = clamp_width(width, count);
    debug!(count, width, "sweeping indices");
    dispatch(width, 0..count, &worker)
}

/// Like [`try_for_each_index`], for workers that cannot fail.
pub fn for_each_index<F>(count: usize, width: usize, worker: F)
where
    F: Fn(usize) + Sync,
{
    let outcome = try_for_each_index(count, width, |index| {
        worker(index);
        Ok::<(), Infallible>(())
    });
    match outcome {
        Ok(()) => {}
        Err(never) => match never {},
    }
}
