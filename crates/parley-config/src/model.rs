// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley DIDComm agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Agent identity and behavior settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Outbound transport selection.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Mediation and message pickup settings.
    #[serde(default)]
    pub mediation: MediationConfig,

    /// Out-of-band invitation settings.
    #[serde(default)]
    pub out_of_band: OutOfBandConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Label presented to peers in invitations and connection requests.
    #[serde(default = "default_label")]
    pub label: String,

    /// Inbound endpoints advertised in our DID documents. Empty means the agent
    /// is not reachable and peers must queue messages for it.
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Answer connection requests and responses without application input.
    #[serde(default = "default_true")]
    pub auto_accept_connections: bool,

    /// Holder side: request offered credentials and acknowledge issued ones.
    #[serde(default)]
    pub auto_accept_credentials: bool,

    /// Verifier side: acknowledge received presentations.
    #[serde(default)]
    pub auto_accept_proofs: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            endpoints: Vec::new(),
            log_level: default_log_level(),
            auto_accept_connections: true,
            auto_accept_credentials: false,
            auto_accept_proofs: false,
        }
    }
}

fn default_label() -> String {
    "parley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Outbound transport selection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Preferred endpoint schemes, most preferred first. Unlisted schemes sort last.
    #[serde(default)]
    pub priority: Vec<String>,

    /// Only use endpoints whose scheme appears in `priority`.
    #[serde(default)]
    pub restrictive: bool,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .into_owned()
}

/// How a recipient collects messages its mediator queued for it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum PickupStrategy {
    /// Poll with `batch-pickup` messages.
    #[default]
    PickupV1,
    /// Keep a return-routed session open and let the mediator push.
    Implicit,
    /// Never collect queued messages.
    None,
}

/// Mediation and message pickup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediationConfig {
    #[serde(default)]
    pub pickup_strategy: PickupStrategy,

    /// Interval between pickup polls.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// Maximum number of queued messages handed over per pickup.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Mediator side: grant mediation requests automatically.
    #[serde(default = "default_true")]
    pub auto_accept_requests: bool,

    /// Recipient side: how long to wait for a grant after requesting mediation.
    #[serde(default = "default_grant_timeout_ms")]
    pub grant_timeout_ms: u64,
}

impl Default for MediationConfig {
    fn default() -> Self {
        Self {
            pickup_strategy: PickupStrategy::default(),
            polling_interval_ms: default_polling_interval_ms(),
            batch_size: default_batch_size(),
            auto_accept_requests: true,
            grant_timeout_ms: default_grant_timeout_ms(),
        }
    }
}

fn default_polling_interval_ms() -> u64 {
    5_000
}

fn default_batch_size() -> usize {
    10
}

fn default_grant_timeout_ms() -> u64 {
    15_000
}

/// Out-of-band invitation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutOfBandConfig {
    /// How long to wait for `handshake-reuse-accepted` before creating a new connection.
    #[serde(default = "default_reuse_timeout_ms")]
    pub reuse_timeout_ms: u64,

    /// Try to reuse an existing connection when receiving an invitation from a known peer.
    #[serde(default = "default_true")]
    pub reuse_connections: bool,
}

impl Default for OutOfBandConfig {
    fn default() -> Self {
        Self {
            reuse_timeout_ms: default_reuse_timeout_ms(),
            reuse_connections: true,
        }
    }
}

fn default_reuse_timeout_ms() -> u64 {
    20_000
}
