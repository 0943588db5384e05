// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handshake messages: connections 1.0, DID exchange 1.0 and trust ping.

use parley_core::{AgentMessage, Attachment, DidDoc, MessageType, ParleyError};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use super::record::HandshakeProtocol;

pub const CONNECTIONS_PROTOCOL: &str = "connections";
pub const DIDEXCHANGE_PROTOCOL: &str = "didexchange";

impl HandshakeProtocol {
    /// Protocol URI advertised in out-of-band `handshake_protocols`.
    pub fn protocol_uri(&self) -> String {
        self.message_type("request").protocol_uri()
    }

    fn message_type(&self, name: &str) -> MessageType {
        match self {
            HandshakeProtocol::Connections => {
                MessageType::didcomm(CONNECTIONS_PROTOCOL, 1, 0, name)
            }
            HandshakeProtocol::DidExchange => {
                MessageType::didcomm(DIDEXCHANGE_PROTOCOL, 1, 0, name)
            }
        }
    }

    /// Matches a handshake protocol URI of any minor version.
    pub fn from_protocol_uri(uri: &str) -> Option<Self> {
        let probe = MessageType::parse(&format!("{uri}/request")).ok()?;
        [HandshakeProtocol::DidExchange, HandshakeProtocol::Connections]
            .into_iter()
            .find(|p| p.message_type("request").is_compatible_with(&probe))
    }
}

/// Every message the connection handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ConnectionMessageKind {
    Request(HandshakeProtocol),
    Response(HandshakeProtocol),
    ProblemReport(HandshakeProtocol),
    /// DID exchange `complete`.
    Complete,
    /// Notification ack completing a connections 1.0 handshake.
    Ack,
    Ping,
    PingResponse,
}

impl Default for HandshakeProtocol {
    fn default() -> Self {
        HandshakeProtocol::Connections
    }
}

impl ConnectionMessageKind {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Request(p) => p.message_type("request"),
            Self::Response(p) => p.message_type("response"),
            Self::ProblemReport(p) => p.message_type("problem_report"),
            Self::Complete => HandshakeProtocol::DidExchange.message_type("complete"),
            Self::Ack => MessageType::didcomm("notification", 1, 0, "ack"),
            Self::Ping => MessageType::didcomm("trust_ping", 1, 0, "ping"),
            Self::PingResponse => MessageType::didcomm("trust_ping", 1, 0, "ping_response"),
        }
    }

    /// All kinds, with both handshake protocols expanded.
    pub fn all() -> Vec<Self> {
        let mut kinds = Vec::new();
        for kind in Self::iter() {
            match kind {
                Self::Request(_) | Self::Response(_) | Self::ProblemReport(_) => {
                    for protocol in [HandshakeProtocol::Connections, HandshakeProtocol::DidExchange] {
                        kinds.push(match kind {
                            Self::Request(_) => Self::Request(protocol),
                            Self::Response(_) => Self::Response(protocol),
                            _ => Self::ProblemReport(protocol),
                        });
                    }
                }
                other => kinds.push(other),
            }
        }
        kinds
    }

    pub fn from_type(message_type: &MessageType) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|kind| kind.message_type().is_compatible_with(message_type))
    }
}

/// Legacy connections 1.0 invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInvitation {
    pub label: String,
    pub recipient_keys: Vec<String>,
    pub service_endpoint: String,
    #[serde(default)]
    pub routing_keys: Vec<String>,
}

impl ConnectionInvitation {
    pub fn message_type() -> MessageType {
        HandshakeProtocol::Connections.message_type("invitation")
    }

    pub fn to_message(&self) -> Result<AgentMessage, ParleyError> {
        AgentMessage::new(&Self::message_type(), self)
    }

    pub fn from_message(message: &AgentMessage) -> Result<Self, ParleyError> {
        let declared = message.parsed_type()?;
        if !Self::message_type().is_compatible_with(&declared) {
            return Err(ParleyError::InvalidMessage(format!(
                "expected a connection invitation, got {}",
                message.message_type
            )));
        }
        message.body()
    }
}

/// DID and document block of a connections 1.0 request/response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(rename = "DID")]
    pub did: String,
    #[serde(rename = "DIDDoc")]
    pub did_doc: DidDoc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequestBody {
    pub label: String,
    pub connection: Connection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionResponseBody {
    pub connection: Connection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidExchangeBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub did: String,
    #[serde(rename = "did_doc~attach")]
    pub did_doc_attach: Attachment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPingBody {
    #[serde(default)]
    pub response_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Builds a request or response carrying our DID and document.
pub fn handshake_message(
    protocol: HandshakeProtocol,
    name: &str,
    label: Option<&str>,
    did: &str,
    did_doc: &DidDoc,
) -> Result<AgentMessage, ParleyError> {
    let message_type = protocol.message_type(name);
    let connection = Connection {
        did: did.to_string(),
        did_doc: did_doc.clone(),
    };
    match (protocol, label) {
        (HandshakeProtocol::Connections, Some(label)) => AgentMessage::new(
            &message_type,
            &ConnectionRequestBody {
                label: label.to_string(),
                connection,
            },
        ),
        (HandshakeProtocol::Connections, None) => {
            AgentMessage::new(&message_type, &ConnectionResponseBody { connection })
        }
        (HandshakeProtocol::DidExchange, label) => {
            let did_doc_value = serde_json::to_value(did_doc)?;
            AgentMessage::new(
                &message_type,
                &DidExchangeBody {
                    label: label.map(str::to_string),
                    did: did.to_string(),
                    did_doc_attach: Attachment::json(did_doc_value),
                },
            )
        }
    }
}

/// Extracts the peer's label, DID and document from a request or response.
pub fn peer_did_doc(
    protocol: HandshakeProtocol,
    message: &AgentMessage,
) -> Result<(Option<String>, String, DidDoc), ParleyError> {
    match protocol {
        HandshakeProtocol::Connections => {
            let connection = message
                .body
                .get("connection")
                .cloned()
                .ok_or_else(|| {
                    ParleyError::InvalidMessage(format!(
                        "{} is missing the connection block",
                        message.message_type
                    ))
                })?;
            let connection: Connection = serde_json::from_value(connection)?;
            let label = message
                .body
                .get("label")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Ok((label, connection.did, connection.did_doc))
        }
        HandshakeProtocol::DidExchange => {
            let body: DidExchangeBody = message.body()?;
            let doc = body.did_doc_attach.data.json.ok_or_else(|| {
                ParleyError::InvalidMessage("did_doc~attach carries no JSON document".into())
            })?;
            Ok((body.label, body.did, serde_json::from_value(doc)?))
        }
    }
}
