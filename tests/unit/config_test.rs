//! Tests for configuration validation

use std::collections::HashMap;
use std::path::PathBuf;

use job_governor::config::{GovernorConfig, JobsConfig, ServiceConfig, StoreBackendConfig};

#[test]
fn test_defaults_are_valid() {
    assert!(ServiceConfig::default().validate().is_ok());
    let gov = GovernorConfig::default();
    assert_eq!(gov.max_consecutive_errors, 5);
    assert_eq!(gov.backoff_base_ms, 1_000);
    assert_eq!(gov.backoff_max_ms, 30_000);
}

#[test]
fn test_governor_config_invalid_window() {
    let invalid = GovernorConfig {
        rate_window_ms: 0,
        ..GovernorConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_governor_config_invalid_limit() {
    let invalid = GovernorConfig {
        max_requests_per_window: 0,
        ..GovernorConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_governor_config_backoff_cap_below_base() {
    let invalid = GovernorConfig {
        backoff_base_ms: 5_000,
        backoff_max_ms: 1_000,
        ..GovernorConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_jobs_config_invalid_deadline() {
    let invalid = JobsConfig {
        default_deadline_secs: 0,
        ..JobsConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_jobs_config_blank_owner() {
    let invalid = JobsConfig {
        system_owner: "  ".into(),
        ..JobsConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_service_config_from_json() {
    let json = r#"{
        "governor": {
            "rate_window_ms": 2000,
            "max_requests_per_window": 20
        },
        "jobs": {
            "default_deadline_secs": 60
        },
        "store": { "kind": "file", "path": "/var/lib/jobs" }
    }"#;

    let config = ServiceConfig::from_json_str(json).unwrap();
    assert_eq!(config.governor.rate_window_ms, 2000);
    assert_eq!(config.governor.max_requests_per_window, 20);
    // unspecified fields keep their defaults
    assert_eq!(config.governor.breaker_timeout_ms, 30_000);
    assert_eq!(config.jobs.default_deadline_secs, 60);
    assert_eq!(config.jobs.max_attempts, 3);
    assert_eq!(
        config.store,
        StoreBackendConfig::File {
            path: PathBuf::from("/var/lib/jobs")
        }
    );
}

#[test]
fn test_service_config_from_empty_json() {
    let config = ServiceConfig::from_json_str("{}").unwrap();
    assert_eq!(config, ServiceConfig::default());
}

#[test]
fn test_service_config_rejects_invalid_json_values() {
    let json = r#"{ "governor": { "max_consecutive_errors": 0 } }"#;
    let err = ServiceConfig::from_json_str(json).unwrap_err();
    assert!(err.contains("governor invalid"));
}

#[test]
fn test_service_config_from_lookup() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("JOB_GOVERNOR_MAX_REQUESTS_PER_WINDOW", "3"),
        ("JOB_GOVERNOR_BREAKER_TIMEOUT_MS", "5000"),
        ("JOB_GOVERNOR_SYSTEM_OWNER", "scheduler"),
        ("JOB_GOVERNOR_STORE_PATH", "/tmp/jobs"),
    ]);
    let config = ServiceConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

    assert_eq!(config.governor.max_requests_per_window, 3);
    assert_eq!(config.governor.breaker_timeout_ms, 5000);
    assert_eq!(config.jobs.system_owner, "scheduler");
    assert!(matches!(config.store, StoreBackendConfig::File { .. }));
}

#[test]
fn test_service_config_from_lookup_bad_number() {
    let err = ServiceConfig::from_lookup(|k| {
        (k == "JOB_GOVERNOR_RATE_WINDOW_MS").then(|| "soon".to_string())
    })
    .unwrap_err();
    assert!(err.contains("JOB_GOVERNOR_RATE_WINDOW_MS"));
}
