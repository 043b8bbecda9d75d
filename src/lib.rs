//! Bounded-concurrency job execution.
//!
//! Three entry points share one pattern (a counting semaphore bounds how many
//! jobs run at once, workers fan out, the caller blocks until they join):
//!
//! - [`ranges`]: split `count` units into contiguous `[start, end)` ranges, one
//!   task per range.
//! - [`sweep`]: one task per index in `0..count`.
//! - [`runner`]: a long-lived [`Runner`] fed one job at a time, tallying
//!   successes and failures.
//!
//! Invariants:
//! - at most `width` jobs execute at any instant
//! - a width of `0` means the host's available parallelism (see [`config`])
//! - failures only stop future submissions; running jobs are never cancelled
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let total = AtomicUsize::new(0);
//! concurrent::for_each_range(100, 4, |start, end| {
//!     total.fetch_add(end - start, Ordering::Relaxed);
//! });
//! assert_eq!(total.into_inner(), 100);
//! ```

pub mod config;
mod dispatch;
pub mod ranges;
pub mod runner;
pub mod sweep;
pub mod sync;

pub use config::{ConfigError, ExecutorConfig};
pub use ranges::{for_each_range, try_for_each_range};
pub use runner::Runner;
pub use sweep::{for_each_index, try_for_each_index};
