//! Width resolution.
//!
//! A width of `0` means "use the host's available parallelism". The host value is
//! the positive integer in `CONCURRENT_NUM_THREADS` when set, otherwise the
//! logical CPU count reported by `num_cpus` (detected once per process).

use std::env;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable overriding the detected host parallelism.
pub const NUM_THREADS_ENV: &str = "CONCURRENT_NUM_THREADS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumThreads { var: &'static str, value: String },
}

static DETECTED_PARALLELISM: Lazy<usize> = Lazy::new(|| num_cpus::get().max(1));

fn parse_num_threads(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumThreads {
            var: NUM_THREADS_ENV,
            value: raw.to_string(),
        }),
    }
}

/// The thread-count override from the environment, if one is set.
pub fn num_threads_override() -> Result<Option<usize>, ConfigError> {
    match env::var(NUM_THREADS_ENV) {
        Ok(raw) => parse_num_threads(&raw).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(raw)) => Err(ConfigError::InvalidNumThreads {
            var: NUM_THREADS_ENV,
            value: raw.to_string_lossy().into_owned(),
        }),
    }
}

/// Parallelism used when a caller passes a width of `0`. Always at least 1.
///
/// A malformed override is logged and ignored.
pub fn host_parallelism() -> usize {
    match num_threads_override() {
        Ok(Some(n)) => n,
        Ok(None) => *DETECTED_PARALLELISM,
        Err(err) => {
            warn!(%err, "ignoring thread-count override");
            *DETECTED_PARALLELISM
        }
    }
}

/// Replace the `0` sentinel with the host parallelism.
pub fn normalize_width(width: usize) -> usize {
    if width == 0 {
        host_parallelism()
    } else {
        width
    }
}

/// Normalize `width`, then clamp it to `count` so no worker sits idle.
///
/// Never returns less than 1, even for `count == 0`.
pub fn clamp_width(width: usize, count: usize) -> usize {
    normalize_width(width).min(count).max(1)
}

/// Executor settings that callers can embed in their own configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Maximum concurrently executing jobs; `0` selects the host parallelism.
    pub width: usize,
}

impl ExecutorConfig {
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Build from `CONCURRENT_NUM_THREADS`, rejecting malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            width: num_threads_override()?.unwrap_or(0),
        })
    }

    pub fn resolved_width(&self) -> usize {
        normalize_width(self.width)
    }
}
