// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Out-of-band 1.0/1.1 invitation and handshake-reuse messages.

use parley_core::{AgentMessage, Attachment, DidCommService, MessageType, ParleyError};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

pub const OUT_OF_BAND_PROTOCOL: &str = "out-of-band";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum OutOfBandMessageKind {
    Invitation,
    HandshakeReuse,
    HandshakeReuseAccepted,
    ProblemReport,
}

impl OutOfBandMessageKind {
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::HandshakeReuse => "handshake-reuse",
            Self::HandshakeReuseAccepted => "handshake-reuse-accepted",
            Self::ProblemReport => "problem-report",
        }
    }

    pub fn message_type(&self, minor: u32) -> MessageType {
        MessageType::didcomm(OUT_OF_BAND_PROTOCOL, 1, minor, self.message_name())
    }

    pub fn from_type(message_type: &MessageType) -> Option<Self> {
        Self::iter().find(|kind| kind.message_type(1).is_compatible_with(message_type))
    }

    /// Types the out-of-band handler answers, in both minor versions.
    pub fn handled_types() -> Vec<MessageType> {
        [Self::HandshakeReuse, Self::HandshakeReuseAccepted, Self::ProblemReport]
            .into_iter()
            .flat_map(|kind| [kind.message_type(1), kind.message_type(0)])
            .collect()
    }
}

/// A service entry: either a resolvable DID or an inline service block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntry {
    Did(String),
    Inline(DidCommService),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfBandInvitation {
    #[serde(rename = "@id")]
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handshake_protocols: Vec<String>,
    pub services: Vec<ServiceEntry>,
    #[serde(rename = "requests~attach", default, skip_serializing_if = "Vec::is_empty")]
    pub requests_attach: Vec<Attachment>,
}

impl OutOfBandInvitation {
    pub fn to_message(&self) -> Result<AgentMessage, ParleyError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "@type".into(),
                OutOfBandMessageKind::Invitation.message_type(1).canonical_uri().into(),
            );
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_message(message: &AgentMessage) -> Result<Self, ParleyError> {
        let declared = message.parsed_type()?;
        if OutOfBandMessageKind::from_type(&declared) != Some(OutOfBandMessageKind::Invitation) {
            return Err(ParleyError::InvalidMessage(format!(
                "expected an out-of-band invitation, got {}",
                message.message_type
            )));
        }
        Ok(serde_json::from_value(serde_json::to_value(message)?)?)
    }

    /// Recipient keys of the inline services.
    pub fn inline_recipient_keys(&self) -> Vec<String> {
        self.services
            .iter()
            .filter_map(|s| match s {
                ServiceEntry::Inline(service) => Some(service.recipient_keys.clone()),
                ServiceEntry::Did(_) => None,
            })
            .flatten()
            .collect()
    }

    /// DIDs listed as services.
    pub fn dids(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter_map(|s| match s {
                ServiceEntry::Did(did) => Some(did.as_str()),
                ServiceEntry::Inline(_) => None,
            })
            .collect()
    }
}

/// `handshake-reuse` or `handshake-reuse-accepted` on the invitation's parent thread.
pub fn reuse_message(
    kind: OutOfBandMessageKind,
    minor: u32,
    thread_id: Option<&str>,
    invitation_id: &str,
) -> Result<AgentMessage, ParleyError> {
    let mut message = AgentMessage::new(&kind.message_type(minor), &serde_json::json!({}))?;
    let thread_id = thread_id.map_or_else(|| message.id.clone(), str::to_string);
    message.set_thread_id(thread_id);
    message.set_parent_thread_id(invitation_id);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation() -> OutOfBandInvitation {
        OutOfBandInvitation {
            id: "inv-1".into(),
            label: "Faber".into(),
            goal_code: None,
            handshake_protocols: vec!["https://didcomm.org/didexchange/1.0".into()],
            services: vec![
                ServiceEntry::Did("did:sov:faber".into()),
                ServiceEntry::Inline(DidCommService {
                    id: "#inline-0".into(),
                    service_endpoint: "http://faber".into(),
                    recipient_keys: vec!["faber-key".into()],
                    routing_keys: vec![],
                    priority: 0,
                }),
            ],
            requests_attach: vec![],
        }
    }

    #[test]
    fn invitation_round_trips_with_mixed_services() {
        let message = invitation().to_message().unwrap();
        assert_eq!(message.id, "inv-1");
        assert_eq!(message.message_type, "https://didcomm.org/out-of-band/1.1/invitation");
        let parsed = OutOfBandInvitation::from_message(&message).unwrap();
        assert_eq!(parsed, invitation());
        assert_eq!(parsed.dids(), vec!["did:sov:faber"]);
        assert_eq!(parsed.inline_recipient_keys(), vec!["faber-key".to_string()]);
    }

    #[test]
    fn reuse_messages_carry_the_invitation_as_parent_thread() {
        let reuse = reuse_message(OutOfBandMessageKind::HandshakeReuse, 1, None, "inv-1").unwrap();
        assert_eq!(reuse.thread_id(), reuse.id);
        assert_eq!(reuse.parent_thread_id(), Some("inv-1"));

        let accepted = reuse_message(
            OutOfBandMessageKind::HandshakeReuseAccepted,
            0,
            Some(&reuse.id),
            "inv-1",
        )
        .unwrap();
        assert_eq!(accepted.thread_id(), reuse.id);
        assert!(accepted.message_type.contains("/out-of-band/1.0/"));
    }

    #[test]
    fn both_minor_versions_are_recognized() {
        for minor in [0, 1] {
            let t = OutOfBandMessageKind::HandshakeReuse.message_type(minor);
            assert_eq!(
                OutOfBandMessageKind::from_type(&t),
                Some(OutOfBandMessageKind::HandshakeReuse)
            );
        }
        assert_eq!(OutOfBandMessageKind::handled_types().len(), 6);
    }
}
