// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelope service boundary: encrypt outbound messages, decrypt inbound bytes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ParleyError;
use crate::message::AgentMessage;

/// Key material for packing one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeKeys {
    pub recipient_keys: Vec<String>,
    #[serde(default)]
    pub routing_keys: Vec<String>,
    #[serde(default)]
    pub sender_key: Option<String>,
}

/// Result of unpacking inbound wire bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedMessage {
    pub message: AgentMessage,
    /// Absent for anonymously packed messages.
    pub sender_key: Option<String>,
    pub recipient_key: Option<String>,
}

/// Encrypts and decrypts wire messages. Stateless from the agent's point of view.
///
/// Implementations must fail with [`ParleyError::Decryption`] on malformed input
/// and never return a partially decoded message.
#[async_trait]
pub trait EnvelopeService: Send + Sync {
    async fn pack(&self, message: &AgentMessage, keys: &EnvelopeKeys)
    -> Result<Vec<u8>, ParleyError>;

    async fn unpack(&self, wire: &[u8]) -> Result<DecryptedMessage, ParleyError>;
}
