// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use parley_core::{AgentMessage, DidCommService};

use crate::connections::ConnectionRecord;

/// Where an outbound message should go.
#[derive(Debug, Clone)]
pub enum OutboundTarget {
    Connection(Box<ConnectionRecord>),
    /// Connection-less delivery to a `~service` or out-of-band service.
    Service {
        service: DidCommService,
        sender_key: String,
    },
    /// Reply on the inbound transport session the request arrived on.
    Session(String),
}

/// A message ready to be packed and delivered.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub message: AgentMessage,
    pub target: OutboundTarget,
    /// Exchange record the message belongs to, for logging.
    pub associated_record_id: Option<String>,
}

impl OutboundMessage {
    pub fn to_connection(message: AgentMessage, connection: &ConnectionRecord) -> Self {
        Self {
            message,
            target: OutboundTarget::Connection(Box::new(connection.clone())),
            associated_record_id: None,
        }
    }

    pub fn to_service(message: AgentMessage, service: DidCommService, sender_key: String) -> Self {
        Self {
            message,
            target: OutboundTarget::Service {
                service,
                sender_key,
            },
            associated_record_id: None,
        }
    }

    pub fn over_session(message: AgentMessage, session_id: impl Into<String>) -> Self {
        Self {
            message,
            target: OutboundTarget::Session(session_id.into()),
            associated_record_id: None,
        }
    }

    pub fn for_record(mut self, record_id: impl Into<String>) -> Self {
        self.associated_record_id = Some(record_id.into());
        self
    }

    pub fn connection(&self) -> Option<&ConnectionRecord> {
        match &self.target {
            OutboundTarget::Connection(connection) => Some(connection),
            _ => None,
        }
    }
}
