//! 설정 파일 로딩 통합 테스트

use std::io::Write;

use logloom_core::config::LogloomConfig;
use logloom_core::error::ConfigError;

#[test]
fn load_full_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[general]
log_level = "debug"
log_format = "json"

[drain]
max_depth = 5
sim_threshold = 0.6
max_children = 50
max_clusters = 10
max_sample_logs = 3

[pool]
workers = 4
buffer_size = 512

[detector]
window_secs = 120
error_threshold = 2.5
volume_threshold = 4.0
min_points = 5
alert_capacity = 50
volume_flush_secs = 5

[redactor]
redact_ipv4 = true
"#
    )
    .unwrap();

    let config = LogloomConfig::load(file.path()).unwrap();
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.drain.max_depth, 5);
    assert!((config.drain.sim_threshold - 0.6).abs() < f64::EPSILON);
    assert_eq!(config.pool.workers, 4);
    assert_eq!(config.detector.window_secs, 120);
    assert!(config.redactor.redact_ipv4);
    // 생략된 필드는 기본값 유지
    assert!(config.redactor.redact_emails);
}

#[test]
fn load_missing_file_fails() {
    let result = LogloomConfig::load(std::path::Path::new("/nonexistent/logloom.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

#[test]
fn load_or_default_returns_defaults_for_missing_file() {
    let config =
        LogloomConfig::load_or_default(std::path::Path::new("/nonexistent/logloom.toml")).unwrap();
    assert_eq!(config.pool.workers, 100);
}

#[test]
fn load_rejects_invalid_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not [valid toml").unwrap();

    let result = LogloomConfig::load(file.path());
    assert!(matches!(result, Err(ConfigError::ParseFailed { .. })));
}

#[test]
fn load_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[pool]
workers = 0
"#
    )
    .unwrap();

    let result = LogloomConfig::load(file.path());
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}
