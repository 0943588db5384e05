// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payloads published on the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event with its envelope metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl BusEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// The state-changed payload, if this is one.
    pub fn as_state_changed(&self) -> Option<&StateChanged> {
        match &self.kind {
            EventKind::StateChanged(changed) => Some(changed),
            _ => None,
        }
    }
}

/// Typed event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// An exchange record was created or transitioned.
    StateChanged(StateChanged),

    /// The peer accepted reuse of an existing connection for an out-of-band invitation.
    ReuseAccepted {
        out_of_band_id: String,
        connection_id: String,
        reuse_thread_id: String,
    },

    /// A mediator confirmed keylist changes; `recipient_keys` is the updated set.
    KeylistUpdated {
        mediation_id: String,
        recipient_keys: Vec<String>,
    },

    /// A packed message was parked in the store-and-forward queue.
    MessageQueued {
        connection_id: String,
        message_type: String,
    },

    /// A message was handed to a session or transport.
    MessageSent {
        connection_id: Option<String>,
        message_type: String,
        endpoint: String,
    },
}

/// Payload of [`EventKind::StateChanged`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChanged {
    pub record_type: String,
    pub record_id: String,
    /// `None` when the record was just created.
    pub previous_state: Option<String>,
    pub state: String,
    pub thread_id: Option<String>,
    pub connection_id: Option<String>,
    /// Snapshot of the record after the transition.
    pub record: serde_json::Value,
}
