// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Parley configuration system.

use parley_config::diagnostic::ConfigError;
use parley_config::model::{ParleyConfig, PickupStrategy};
use parley_config::{load_and_validate_str, load_config_from_path, load_config_from_str};
use serial_test::serial;

#[test]
fn valid_toml_deserializes_into_parley_config() {
    let toml = r#"
[agent]
label = "issuer"
endpoints = ["https://issuer.example/didcomm", "wss://issuer.example/ws"]
log_level = "debug"
auto_accept_connections = false
auto_accept_credentials = true

[transport]
priority = ["wss", "https"]
restrictive = true

[storage]
database_path = "/tmp/parley.db"
wal_mode = false

[mediation]
pickup_strategy = "implicit"
polling_interval_ms = 1000
batch_size = 25

[out_of_band]
reuse_timeout_ms = 5000
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.label, "issuer");
    assert_eq!(config.agent.endpoints.len(), 2);
    assert!(!config.agent.auto_accept_connections);
    assert!(config.agent.auto_accept_credentials);
    assert_eq!(config.transport.priority, vec!["wss", "https"]);
    assert!(config.transport.restrictive);
    assert_eq!(config.storage.database_path, "/tmp/parley.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.mediation.pickup_strategy, PickupStrategy::Implicit);
    assert_eq!(config.mediation.batch_size, 25);
    assert_eq!(config.out_of_band.reuse_timeout_ms, 5000);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.agent.label, "parley");
    assert!(config.agent.endpoints.is_empty());
    assert!(config.agent.auto_accept_connections);
    assert!(config.transport.priority.is_empty());
    assert!(!config.transport.restrictive);
    assert!(config.storage.database_path.ends_with("parley.db"));
    assert_eq!(config.mediation.pickup_strategy, PickupStrategy::PickupV1);
    assert_eq!(config.mediation.batch_size, 10);
    assert_eq!(config.out_of_band.reuse_timeout_ms, 20_000);
}

#[test]
fn unknown_field_in_transport_produces_error() {
    let toml = r#"
[transport]
prority = ["ws"]
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = err.to_string();
    assert!(
        err_str.contains("unknown field") || err_str.contains("prority"),
        "error should mention the bad key, got: {err_str}"
    );
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[ledger]\nurl = \"x\"\n").expect_err("unknown section");
    assert!(err.to_string().contains("ledger"));
}

#[test]
fn dotted_override_sets_nested_key() {
    use figment::{Figment, providers::Serialized};

    let config: ParleyConfig = Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(("mediation.polling_interval_ms", 250))
        .extract()
        .expect("should set polling interval via dot notation");

    assert_eq!(config.mediation.polling_interval_ms, 250);
}

#[test]
fn load_and_validate_reports_suggestion_with_span() {
    let errors = load_and_validate_str("[mediation]\nbatch_sise = 3\n").unwrap_err();
    let unknown = errors
        .iter()
        .find(|e| matches!(e, ConfigError::UnknownKey { .. }))
        .expect("unknown key error");
    match unknown {
        ConfigError::UnknownKey { suggestion, .. } => {
            assert_eq!(suggestion.as_deref(), Some("batch_size"));
        }
        _ => unreachable!(),
    }
}

#[test]
fn load_and_validate_runs_semantic_checks() {
    let errors = load_and_validate_str("[mediation]\nbatch_size = 0\n").unwrap_err();
    assert!(errors.iter().any(|e| e.to_string().contains("batch_size")));
}

#[test]
#[serial]
fn env_vars_override_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parley.toml");
    std::fs::write(&path, "[mediation]\nbatch_size = 3\n\n[agent]\nlabel = \"file\"\n").unwrap();

    // SAFETY: serialized with every other env-touching test.
    unsafe {
        std::env::set_var("PARLEY_MEDIATION_BATCH_SIZE", "7");
        std::env::set_var("PARLEY_OUT_OF_BAND_REUSE_TIMEOUT_MS", "1500");
    }
    let config = load_config_from_path(&path);
    unsafe {
        std::env::remove_var("PARLEY_MEDIATION_BATCH_SIZE");
        std::env::remove_var("PARLEY_OUT_OF_BAND_REUSE_TIMEOUT_MS");
    }

    let config = config.unwrap();
    assert_eq!(config.mediation.batch_size, 7);
    assert_eq!(config.out_of_band.reuse_timeout_ms, 1500);
    assert_eq!(config.agent.label, "file");
}
