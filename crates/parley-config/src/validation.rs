// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde attributes cannot express: non-empty paths,
//! well-formed endpoint URIs, and non-zero intervals.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{ParleyConfig, PickupStrategy};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.agent.label.trim().is_empty() {
        fail("agent.label must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        fail(format!(
            "agent.log_level `{}` is not one of {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    for endpoint in &config.agent.endpoints {
        match endpoint.split_once(':') {
            Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => {}
            _ => fail(format!(
                "agent.endpoints entry `{endpoint}` must be a URI with a scheme"
            )),
        }
    }

    let mut seen = HashSet::new();
    for scheme in &config.transport.priority {
        if scheme.contains(':') || scheme.trim().is_empty() {
            fail(format!(
                "transport.priority entry `{scheme}` must be a bare scheme such as `ws`"
            ));
        }
        if !seen.insert(scheme) {
            fail(format!("transport.priority lists `{scheme}` more than once"));
        }
    }

    if config.transport.restrictive && config.transport.priority.is_empty() {
        fail("transport.restrictive requires at least one scheme in transport.priority".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.mediation.pickup_strategy == PickupStrategy::PickupV1
        && config.mediation.polling_interval_ms == 0
    {
        fail("mediation.polling_interval_ms must be greater than 0".to_string());
    }

    if config.mediation.batch_size == 0 {
        fail("mediation.batch_size must be greater than 0".to_string());
    }

    if config.out_of_band.reuse_timeout_ms == 0 {
        fail("out_of_band.reuse_timeout_ms must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
