// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol messages exchanged for a record, one per message class.
//!
//! Saving a second message of the same class for a record overwrites the
//! first, so re-running a step never accumulates stale copies.

use std::sync::Arc;

use chrono::Utc;
use parley_core::types::{MessageRole, StoredMessage};
use parley_core::{AgentMessage, MessageType, ParleyError, StorageAdapter};

use crate::record::timestamp;

const RECORD_TYPE: &str = "DidCommMessageRecord";

/// A stored message together with the direction it travelled.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAgentMessage {
    pub role: MessageRole,
    pub message: AgentMessage,
}

#[derive(Clone)]
pub struct DidCommMessageRepository {
    storage: Arc<dyn StorageAdapter>,
}

impl DidCommMessageRepository {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Upserts `message` for the record under its message class.
    pub async fn save_agent_message(
        &self,
        role: MessageRole,
        message: &AgentMessage,
        associated_record_id: &str,
    ) -> Result<(), ParleyError> {
        let message_class = message.parsed_type()?.message_class();
        let now = timestamp(Utc::now());
        let json = serde_json::to_string(message)?;
        self.storage
            .save_protocol_message(&StoredMessage {
                id: uuid::Uuid::new_v4().to_string(),
                associated_record_id: associated_record_id.to_string(),
                message_class,
                role,
                message: json,
                created_at: now.clone(),
                updated_at: now,
            })
            .await
    }

    pub async fn get_agent_message(
        &self,
        associated_record_id: &str,
        message_type: &MessageType,
    ) -> Result<AgentMessage, ParleyError> {
        self.find_agent_message(associated_record_id, message_type)
            .await?
            .ok_or_else(|| ParleyError::RecordNotFound {
                record_type: RECORD_TYPE.to_string(),
                query: format!(
                    "associatedRecordId={associated_record_id}, messageClass={message_type}"
                ),
            })
    }

    pub async fn find_agent_message(
        &self,
        associated_record_id: &str,
        message_type: &MessageType,
    ) -> Result<Option<AgentMessage>, ParleyError> {
        self.storage
            .find_protocol_message(associated_record_id, &message_type.message_class())
            .await?
            .map(|stored| decode(&stored).map(|m| m.message))
            .transpose()
    }

    /// Every message stored for the record, oldest first.
    pub async fn find_agent_messages(
        &self,
        associated_record_id: &str,
    ) -> Result<Vec<StoredAgentMessage>, ParleyError> {
        self.storage
            .find_protocol_messages(associated_record_id)
            .await?
            .iter()
            .map(decode)
            .collect()
    }

    /// Latest received and latest sent message carrying a `~service` decorator.
    ///
    /// These bind a connection-less exchange to the keys both sides advertised.
    pub async fn service_bound_messages(
        &self,
        associated_record_id: &str,
    ) -> Result<(Option<AgentMessage>, Option<AgentMessage>), ParleyError> {
        let mut received = None;
        let mut sent = None;
        for stored in self.find_agent_messages(associated_record_id).await? {
            if stored.message.service.is_none() {
                continue;
            }
            match stored.role {
                MessageRole::Receiver => received = Some(stored.message),
                MessageRole::Sender => sent = Some(stored.message),
            }
        }
        Ok((received, sent))
    }
}

fn decode(stored: &StoredMessage) -> Result<StoredAgentMessage, ParleyError> {
    let message = serde_json::from_str(&stored.message).map_err(|e| ParleyError::Storage {
        source: Box::new(e),
    })?;
    Ok(StoredAgentMessage {
        role: stored.role,
        message,
    })
}
