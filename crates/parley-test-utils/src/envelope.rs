// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-JSON envelope service.
//!
//! `PlainEnvelope` implements `EnvelopeService` without any cryptography: the
//! "packed" form is the message plus the key material in clear JSON. Routing
//! keys are honored the way a real envelope does, by wrapping the message in
//! one `forward` per routing key, so mediation can be exercised end to end.

use async_trait::async_trait;
use parley_agent::mediation::MediationMessageKind;
use parley_agent::mediation::messages::ForwardBody;
use parley_core::{AgentMessage, DecryptedMessage, EnvelopeKeys, EnvelopeService, ParleyError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlainWire {
    recipient_keys: Vec<String>,
    #[serde(default)]
    sender_key: Option<String>,
    message: AgentMessage,
}

/// Envelope service that writes messages as readable JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainEnvelope;

impl PlainEnvelope {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EnvelopeService for PlainEnvelope {
    async fn pack(
        &self,
        message: &AgentMessage,
        keys: &EnvelopeKeys,
    ) -> Result<Vec<u8>, ParleyError> {
        let mut to = keys.recipient_keys.first().cloned().ok_or_else(|| {
            ParleyError::Internal(format!("no recipient keys to pack {}", message.message_type))
        })?;
        let mut wire = PlainWire {
            recipient_keys: keys.recipient_keys.clone(),
            sender_key: keys.sender_key.clone(),
            message: message.clone(),
        };

        for routing_key in &keys.routing_keys {
            let forward = AgentMessage::new(
                &MediationMessageKind::Forward.message_type(),
                &ForwardBody {
                    to,
                    msg: serde_json::to_value(&wire)?,
                },
            )?;
            wire = PlainWire {
                recipient_keys: vec![routing_key.clone()],
                sender_key: None,
                message: forward,
            };
            to = routing_key.clone();
        }

        Ok(serde_json::to_vec(&wire)?)
    }

    async fn unpack(&self, wire: &[u8]) -> Result<DecryptedMessage, ParleyError> {
        let wire: PlainWire =
            serde_json::from_slice(wire).map_err(|e| ParleyError::Decryption(e.to_string()))?;
        Ok(DecryptedMessage {
            recipient_key: wire.recipient_keys.into_iter().next(),
            sender_key: wire.sender_key,
            message: wire.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::MessageType;
    use serde_json::json;

    fn ping() -> AgentMessage {
        AgentMessage::new(
            &MessageType::didcomm("trust_ping", 1, 0, "ping"),
            &json!({"response_requested": false}),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn direct_pack_keeps_keys() {
        let envelope = PlainEnvelope::new();
        let keys = EnvelopeKeys {
            recipient_keys: vec!["bob-key".into()],
            routing_keys: vec![],
            sender_key: Some("alice-key".into()),
        };
        let message = ping();
        let packed = envelope.pack(&message, &keys).await.unwrap();
        let unpacked = envelope.unpack(&packed).await.unwrap();
        assert_eq!(unpacked.recipient_key.as_deref(), Some("bob-key"));
        assert_eq!(unpacked.sender_key.as_deref(), Some("alice-key"));
        assert_eq!(unpacked.message, message);
    }

    #[tokio::test]
    async fn routing_keys_wrap_the_message_in_forwards() {
        let envelope = PlainEnvelope::new();
        let keys = EnvelopeKeys {
            recipient_keys: vec!["bob-key".into()],
            routing_keys: vec!["mediator-key".into()],
            sender_key: Some("alice-key".into()),
        };
        let packed = envelope.pack(&ping(), &keys).await.unwrap();
        let outer = envelope.unpack(&packed).await.unwrap();
        assert_eq!(outer.recipient_key.as_deref(), Some("mediator-key"));
        assert!(outer.sender_key.is_none());

        let forward: ForwardBody = outer.message.body().unwrap();
        assert_eq!(forward.to, "bob-key");
        let inner = envelope
            .unpack(&serde_json::to_vec(&forward.msg).unwrap())
            .await
            .unwrap();
        assert_eq!(inner.recipient_key.as_deref(), Some("bob-key"));
        assert_eq!(inner.sender_key.as_deref(), Some("alice-key"));
    }

    #[tokio::test]
    async fn garbage_is_a_decryption_error() {
        let err = PlainEnvelope::new().unpack(b"not json").await.unwrap_err();
        assert!(matches!(err, ParleyError::Decryption(_)));
    }
}
