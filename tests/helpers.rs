use std::env;
use std::ffi::{OsStr, OsString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, Once, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
static TRACING: Once = Once::new();

fn env_lock() -> MutexGuard<'static, ()> {
    match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(g) => g,
        // If a previous test panicked while holding the lock, recover so subsequent
        // tests can still run (these tests serialize env var changes).
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Install a test-writer subscriber once per test binary. `RUST_LOG` controls
/// verbosity; the default stays quiet.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

/// RAII guard for test-only env var mutation.
///
/// All mutations using this guard are serialized with a global lock; tests that
/// read the variable should hold a guard too.
#[must_use]
#[allow(dead_code)]
pub struct EnvVarGuard {
    key: String,
    old: Option<OsString>,
    _lock: MutexGuard<'static, ()>,
}

#[allow(dead_code)]
impl EnvVarGuard {
    pub fn set<K: Into<String>, V: AsRef<OsStr>>(key: K, value: V) -> Self {
        let key = key.into();
        let lock = env_lock();
        let old = env::var_os(&key);
        env::set_var(&key, value);
        Self {
            key,
            old,
            _lock: lock,
        }
    }

    pub fn unset<K: Into<String>>(key: K) -> Self {
        let key = key.into();
        let lock = env_lock();
        let old = env::var_os(&key);
        env::remove_var(&key);
        Self {
            key,
            old,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.old {
            Some(v) => env::set_var(&self.key, v),
            None => env::remove_var(&self.key),
        }
    }
}

/// Tracks how many jobs are inside a section at once and the highest value seen.
#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct PeakGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[allow(dead_code)]
impl PeakGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[allow(dead_code)]
pub struct GaugeGuard<'a> {
    gauge: &'a PeakGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
    }
}
