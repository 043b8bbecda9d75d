//! Range executor: split `count` units into contiguous `[start, end)` ranges and
//! hand each range to the worker as one concurrent task.

use std::convert::Infallible;

use tracing::debug;

use crate::config::clamp_width;
use crate::dispatch::dispatch;

/// The contiguous ranges a range dispatch hands to its worker, in submission
/// order.
///
/// Every range spans `count / width` units except the last, which is truncated to
/// end at `count`. The number of ranges is `ceil(count / (count / width))`, which
/// can exceed `width` when `count` is not a multiple of it; the permit pool still
/// caps how many run at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    next: usize,
    count: usize,
    step: usize,
}

impl Iterator for Partition {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.step).min(self.count);
        self.next = end;
        Some((start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next.min(self.count);
        let n = remaining.div_ceil(self.step);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Partition {}

/// Partition `[0, count)` the way [`try_for_each_range`] does for `width`.
///
/// `width` is normalized and clamped first, so `0` uses the host parallelism.
pub fn partition(count: usize, width: usize) -> Partition {
    split(count, clamp_width(width, count))
}

fn split(count: usize, width: usize) -> Partition {
    Partition {
        next: 0,
        count,
        step: (count / width).max(1),
    }
}

/// Run `worker(start, end)` over contiguous ranges covering `[0, count)`, with at
/// most `width` ranges executing at once, and return after every submitted range
/// has finished.
///
/// A `width` of `0` uses the host parallelism; widths above `count` are clamped to
/// `count`. When the resulting width is 1 the worker is called once, in-line, as
/// `worker(0, count)`.
///
/// Once any range fails no further ranges are submitted, though ranges already
/// running complete. If several ranges fail, which error is returned depends on
/// completion order and can differ between runs.
///
/// # Panics
///
/// Panics on the calling thread if a worker panicked, after every submitted range
/// has finished.
pub fn try_for_each_range<F, E>(count: usize, width: usize, worker: F) -> Result<(), E>
where
    F: Fn(usize, usize) -> Result<(), E> + Sync,
    E: Send,
{
    if count == 0 {
        return Ok(());
    }

    let width = clamp_width(width, count);
    if width == 1 {
        debug!(count, "running single range in-line");
        return worker(0, count);
    }

    let ranges = split(count, width);
    debug!(count, width, ranges = ranges.len(), "dispatching ranges");
    dispatch(width, ranges, &|(start, end): (usize, usize)| {
        worker(start, end)
    })
}

/// Like [`try_for_each_range`], for workers that cannot fail.
pub fn for_each_range<F>(count: usize, width: usize, worker: F)
where
    F: Fn(usize, usize) + Sync,
{
    let outcome = try_for_each_range(count, width, |start, end| {
        worker(start, end);
        Ok::<(), Infallible>(())
    });
    match outcome {
        Ok(()) => {}
        Err(never) => match never {},
    }
}
