// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message context handed to handlers and protocol services.

use parley_core::{AgentMessage, MessageType, ParleyError};

use crate::connections::ConnectionRecord;

/// A decrypted inbound message plus what is known about where it came from.
#[derive(Debug, Clone)]
pub struct InboundMessageContext {
    pub message: AgentMessage,
    /// The connection the sender and recipient keys resolved to, if any.
    pub connection: Option<ConnectionRecord>,
    /// Transport session the message arrived on, when one was kept open.
    pub session_id: Option<String>,
    pub sender_key: Option<String>,
    pub recipient_key: Option<String>,
}

impl InboundMessageContext {
    pub fn new(message: AgentMessage) -> Self {
        Self {
            message,
            connection: None,
            session_id: None,
            sender_key: None,
            recipient_key: None,
        }
    }

    pub fn with_connection(mut self, connection: ConnectionRecord) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_keys(mut self, sender_key: Option<String>, recipient_key: Option<String>) -> Self {
        self.sender_key = sender_key;
        self.recipient_key = recipient_key;
        self
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.id.as_str())
    }

    pub fn thread_id(&self) -> &str {
        self.message.thread_id()
    }

    pub fn message_type(&self) -> Result<MessageType, ParleyError> {
        self.message.parsed_type()
    }

    /// The connection, which must have finished its handshake.
    pub fn ready_connection(&self) -> Result<&ConnectionRecord, ParleyError> {
        let connection = self.connection.as_ref().ok_or_else(|| {
            ParleyError::ThreadBinding(format!(
                "no connection associated with incoming message {}",
                self.message.message_type
            ))
        })?;
        if !connection.is_ready() {
            return Err(ParleyError::ThreadBinding(format!(
                "connection {} is not ready (state {})",
                connection.id, connection.state
            )));
        }
        Ok(connection)
    }
}
