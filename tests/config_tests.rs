use std::sync::atomic::{AtomicUsize, Ordering};

use concurrent::config::{
    host_parallelism, normalize_width, num_threads_override, ConfigError, ExecutorConfig,
    NUM_THREADS_ENV,
};
use concurrent::Runner;

mod helpers;
use helpers::{init_tracing, EnvVarGuard};

#[test]
fn override_replaces_detected_parallelism() {
    let _env = EnvVarGuard::set(NUM_THREADS_ENV, "3");
    assert_eq!(num_threads_override(), Ok(Some(3)));
    assert_eq!(host_parallelism(), 3);
    assert_eq!(normalize_width(0), 3);
    assert_eq!(normalize_width(5), 5);

    let runner: Runner = Runner::new(0);
    assert_eq!(runner.width(), 3);
    runner.finish();
}

#[test]
fn malformed_override_is_ignored_with_a_warning() {
    init_tracing();
    let detected = {
        let _env = EnvVarGuard::unset(NUM_THREADS_ENV);
        host_parallelism()
    };

    let _env = EnvVarGuard::set(NUM_THREADS_ENV, "lots");
    assert_eq!(host_parallelism(), detected);
    assert!(matches!(
        num_threads_override(),
        Err(ConfigError::InvalidNumThreads { .. })
    ));
}

#[test]
fn zero_override_is_rejected() {
    let _env = EnvVarGuard::set(NUM_THREADS_ENV, "0");
    let err = ExecutorConfig::from_env().unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("{NUM_THREADS_ENV} must be a positive integer, got \"0\"")
    );
}

#[test]
fn from_env_without_override_defaults_to_auto() {
    let _env = EnvVarGuard::unset(NUM_THREADS_ENV);
    assert_eq!(num_threads_override(), Ok(None));
    let cfg = ExecutorConfig::from_env().unwrap();
    assert_eq!(cfg, ExecutorConfig::new(0));
    assert_eq!(cfg.resolved_width(), host_parallelism());
}

#[test]
fn from_env_reads_override() {
    let _env = EnvVarGuard::set(NUM_THREADS_ENV, "6");
    let cfg = ExecutorConfig::from_env().unwrap();
    assert_eq!(cfg.width, 6);
    assert_eq!(cfg.resolved_width(), 6);
}

#[test]
fn auto_width_sweep_uses_override() {
    let _env = EnvVarGuard::set(NUM_THREADS_ENV, "2");
    let visits: Vec<AtomicUsize> = (0..20).map(|_| AtomicUsize::new(0)).collect();
    concurrent::for_each_index(20, 0, |i| {
        visits[i].fetch_add(1, Ordering::SeqCst);
    });
    assert!(visits.iter().all(|v| v.load(Ordering::SeqCst) == 1));
    assert_eq!(concurrent::ranges::partition(20, 0).len(), 2);
}

#[test]
fn executor_config_deserializes_with_defaults() {
    let cfg: ExecutorConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg.width, 0);

    let cfg: ExecutorConfig = serde_json::from_str(r#"{"width": 8}"#).unwrap();
    assert_eq!(cfg, ExecutorConfig::new(8));
    assert_eq!(cfg.resolved_width(), 8);

    let err = serde_json::from_str::<ExecutorConfig>(r#"{"threads": 8}"#).unwrap_err();
    assert!(err.to_string().contains("unknown field"), "{err}");
}

#[test]
fn executor_config_round_trips_through_json() {
    let json = serde_json::to_string(&ExecutorConfig::new(4)).unwrap();
    assert_eq!(json, r#"{"width":4}"#);
}
