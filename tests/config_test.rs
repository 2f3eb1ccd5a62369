use std::time::Duration;

use jobq::WorkerOptions;
use jobq::config::{Config, WorkerSettings};

#[test]
fn config_from_env() {
    // Both cases share one test: env vars are process-global and tests run
    // in parallel.
    unsafe {
        std::env::remove_var("REDIS_URL");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("REDIS_URL", "redis://:secret@localhost:6379/0");
    }
    let config = Config::from_env().unwrap();
    assert!(!config.log_level.is_empty());
    assert!(!format!("{config:?}").contains("secret"));

    unsafe {
        std::env::remove_var("REDIS_URL");
    }
}

#[test]
fn worker_settings_load_from_file() {
    let path = std::env::temp_dir().join(format!("jobq-worker-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "[worker]\nmax_retry = 5\nparallel = 4\nidle_secs = 60\nrecover_secs = 10\n",
    )
    .unwrap();

    let options = WorkerSettings::load(&path)
        .unwrap()
        .apply(WorkerOptions::default());
    std::fs::remove_file(&path).ok();

    assert_eq!(options.max_retry, 5);
    assert_eq!(options.parallel, 4);
    assert_eq!(options.idle, Duration::from_secs(60));
    assert_eq!(options.recover, Duration::from_secs(10));
    assert!(options.validate().is_ok());
}

#[test]
fn missing_worker_file_is_a_config_error() {
    let err = WorkerSettings::load(std::path::Path::new("/nonexistent/jobq.toml")).unwrap_err();
    assert!(matches!(err, jobq::Error::Config(_)), "got {err:?}");
}
