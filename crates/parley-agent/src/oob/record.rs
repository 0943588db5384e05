// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use parley_core::{DidDoc, Tags};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::messages::OutOfBandInvitation;
use crate::record::{ExchangeRecord, ProtocolState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum OutOfBandState {
    AwaitResponse,
    PrepareResponse,
    Done,
}

impl ProtocolState for OutOfBandState {
    fn is_terminal(&self) -> bool {
        matches!(self, OutOfBandState::Done)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum OutOfBandRole {
    Sender,
    Receiver,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutOfBandRecord {
    pub id: String,
    pub state: OutOfBandState,
    pub role: OutOfBandRole,
    pub invitation: OutOfBandInvitation,
    /// A reusable invitation may open any number of connections.
    pub reusable: bool,
    pub auto_accept_connection: bool,
    /// Connection reused for this invitation, once accepted.
    pub reuse_connection_id: Option<String>,
    /// Identity advertised in our own invitation.
    pub our_did: Option<String>,
    pub our_verkey: Option<String>,
    pub our_did_doc: Option<DidDoc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRecord for OutOfBandRecord {
    const RECORD_TYPE: &'static str = "OutOfBandRecord";
    type State = OutOfBandState;

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> OutOfBandState {
        self.state
    }

    fn set_state(&mut self, state: OutOfBandState) {
        self.state = state;
    }

    fn thread_id(&self) -> Option<&str> {
        Some(&self.invitation.id)
    }

    fn connection_id(&self) -> Option<&str> {
        self.reuse_connection_id.as_deref()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn custom_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert("role".into(), self.role.to_string());
        tags.insert("invitationId".into(), self.invitation.id.clone());
        let recipient_key = match self.role {
            OutOfBandRole::Sender => self.our_verkey.clone(),
            OutOfBandRole::Receiver => self.invitation.inline_recipient_keys().into_iter().next(),
        };
        if let Some(key) = recipient_key {
            tags.insert("recipientKey".into(), key);
        }
        tags
    }
}
