// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use parley_core::{DidDoc, Tags};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::messages::ConnectionInvitation;
use crate::record::{ExchangeRecord, ProtocolState};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Invited,
    Requested,
    Responded,
    Complete,
    Abandoned,
}

impl ProtocolState for ConnectionState {
    fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionRole {
    Inviter,
    Invitee,
}

/// Which handshake protocol established the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum HandshakeProtocol {
    Connections,
    DidExchange,
}

/// A pairwise relationship with one peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: String,
    pub state: ConnectionState,
    pub role: ConnectionRole,
    pub protocol: HandshakeProtocol,

    /// Our pairwise DID, key and document.
    pub did: String,
    pub verkey: String,
    pub did_doc: DidDoc,

    pub their_did: Option<String>,
    pub their_key: Option<String>,
    pub their_did_doc: Option<DidDoc>,
    pub their_label: Option<String>,

    /// Legacy invitation: ours as inviter, the peer's as invitee.
    pub invitation: Option<ConnectionInvitation>,
    /// Public DID of the out-of-band invitation this connection came from.
    pub invitation_did: Option<String>,
    pub out_of_band_id: Option<String>,

    /// Thread of the handshake, the request's id.
    pub thread_id: Option<String>,
    pub auto_accept: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectionRecord {
    /// A connection can carry protocol messages once the peer has answered.
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Responded | ConnectionState::Complete
        )
    }

    /// Recipient key the peer addresses the handshake request to.
    pub fn invitation_key(&self) -> Option<&str> {
        self.invitation
            .as_ref()
            .and_then(|i| i.recipient_keys.first())
            .map(String::as_str)
    }
}

impl ExchangeRecord for ConnectionRecord {
    const RECORD_TYPE: &'static str = "ConnectionRecord";
    type State = ConnectionState;

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    fn connection_id(&self) -> Option<&str> {
        None
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
        tags.insert("did".into(), self.did.clone());
        tags.insert("verkey".into(), self.verkey.clone());
        let optional = [
            ("theirDid", self.their_did.as_deref()),
            ("theirKey", self.their_key.as_deref()),
            ("invitationKey", self.invitation_key()),
            ("invitationDid", self.invitation_did.as_deref()),
            ("outOfBandId", self.out_of_band_id.as_deref()),
        ];
        for (tag, value) in optional {
            if let Some(value) = value {
                tags.insert(tag.into(), value.to_string());
            }
        }
        tags
    }
}
