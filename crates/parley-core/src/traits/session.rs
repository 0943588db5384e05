// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live bidirectional transport sessions used for return-routed replies.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::message::AgentMessage;
use crate::traits::envelope::EnvelopeKeys;

/// Write half of an inbound transport connection.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn send(&self, payload: Vec<u8>) -> Result<(), ParleyError>;

    async fn close(&self) -> Result<(), ParleyError>;
}

/// An open inbound connection that can carry replies. Never persisted.
#[derive(Clone)]
pub struct TransportSession {
    pub id: String,
    /// Transport scheme the session was accepted on.
    pub session_type: String,
    /// Keys for replying without resolving the peer's services again.
    pub keys: Option<EnvelopeKeys>,
    /// The inbound message that opened the session; decides return routing.
    pub inbound_message: Option<AgentMessage>,
    pub connection_id: Option<String>,
    pub out_of_band_id: Option<String>,
    sink: Arc<dyn SessionSink>,
}

impl TransportSession {
    pub fn new(session_type: impl Into<String>, sink: Arc<dyn SessionSink>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_type: session_type.into(),
            keys: None,
            inbound_message: None,
            connection_id: None,
            out_of_band_id: None,
            sink,
        }
    }

    pub async fn send(&self, payload: Vec<u8>) -> Result<(), ParleyError> {
        self.sink.send(payload).await
    }

    pub async fn close(&self) -> Result<(), ParleyError> {
        self.sink.close().await
    }
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("id", &self.id)
            .field("session_type", &self.session_type)
            .field("connection_id", &self.connection_id)
            .field("out_of_band_id", &self.out_of_band_id)
            .field("has_keys", &self.keys.is_some())
            .finish()
    }
}
