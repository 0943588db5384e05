// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley DIDComm agent.

use thiserror::Error;

/// The primary error type used across all Parley adapter traits and protocol services.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A message or API call was attempted against a record in the wrong state.
    ///
    /// The record is left unmodified.
    #[error(
        "{record_type} record is in invalid state {actual}. Valid states are: {}",
        .expected.join(", ")
    )]
    InvalidState {
        record_type: String,
        actual: String,
        expected: Vec<String>,
    },

    /// A record lookup resolved to zero candidates.
    #[error("{record_type} record not found for {query}")]
    RecordNotFound { record_type: String, query: String },

    /// A record lookup resolved to more than one candidate.
    #[error("multiple {record_type} records found for {query}")]
    RecordDuplicate { record_type: String, query: String },

    /// Every delivery strategy was exhausted and no queue fallback was available.
    #[error("message {message_type} is undeliverable to connection {connection_id}")]
    Undeliverable {
        connection_id: String,
        message_type: String,
    },

    /// A local validation failure the peer should be told about with a problem report.
    #[error("problem report ({code}): {message}")]
    ProblemReport { code: String, message: String },

    /// No handler is registered for the inbound message type.
    #[error("no handler registered for message type {message_type}")]
    UnsupportedProtocol { message_type: String },

    /// Envelope unpack failed.
    #[error("unable to decrypt message: {0}")]
    Decryption(String),

    /// The message body could not be parsed or is missing required content.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The message does not belong to the thread, connection, or keys it claims.
    #[error("thread binding violation: {0}")]
    ThreadBinding(String),

    /// Two handlers claimed the same message type at registration time.
    #[error("a handler is already registered for message type {message_type}")]
    HandlerConflict { message_type: String },

    /// Transport errors (connection failure, unsupported scheme, closed session).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Builds an [`InvalidState`](ParleyError::InvalidState) error from displayable states.
    pub fn invalid_state<A, E>(record_type: &str, actual: A, expected: &[E]) -> Self
    where
        A: std::fmt::Display,
        E: std::fmt::Display,
    {
        ParleyError::InvalidState {
            record_type: record_type.to_string(),
            actual: actual.to_string(),
            expected: expected.iter().map(ToString::to_string).collect(),
        }
    }

    /// Builds a [`ProblemReport`](ParleyError::ProblemReport) error.
    pub fn problem_report(code: impl Into<String>, message: impl Into<String>) -> Self {
        ParleyError::ProblemReport {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Builds a [`Transport`](ParleyError::Transport) error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        ParleyError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for lookup misses.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ParleyError::RecordNotFound { .. })
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(err: serde_json::Error) -> Self {
        ParleyError::InvalidMessage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_lists_expected_states() {
        let err = ParleyError::invalid_state("CredentialRecord", "declined", &["offer-received"]);
        assert_eq!(
            err.to_string(),
            "CredentialRecord record is in invalid state declined. Valid states are: offer-received"
        );
    }

    #[test]
    fn invalid_state_joins_multiple_expected_states() {
        let err = ParleyError::invalid_state("ProofRecord", "done", &["request-sent", "proposal-received"]);
        assert!(err.to_string().ends_with("request-sent, proposal-received"));
    }

    #[test]
    fn not_found_predicate() {
        let err = ParleyError::RecordNotFound {
            record_type: "ConnectionRecord".into(),
            query: "id=abc".into(),
        };
        assert!(err.is_not_found());
        assert!(!ParleyError::Internal("x".into()).is_not_found());
    }
}
