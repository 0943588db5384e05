// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coordinate-mediation 1.0, message pickup 1.0 and routing 1.0 messages.

use parley_core::MessageType;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub const COORDINATE_MEDIATION_PROTOCOL: &str = "coordinate-mediation";
pub const MESSAGE_PICKUP_PROTOCOL: &str = "messagepickup";
pub const ROUTING_PROTOCOL: &str = "routing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum MediationMessageKind {
    Request,
    Grant,
    Deny,
    KeylistUpdate,
    KeylistUpdateResponse,
    BatchPickup,
    Batch,
    Forward,
}

impl MediationMessageKind {
    pub fn message_type(&self) -> MessageType {
        let (protocol, name) = match self {
            Self::Request => (COORDINATE_MEDIATION_PROTOCOL, "mediate-request"),
            Self::Grant => (COORDINATE_MEDIATION_PROTOCOL, "mediate-grant"),
            Self::Deny => (COORDINATE_MEDIATION_PROTOCOL, "mediate-deny"),
            Self::KeylistUpdate => (COORDINATE_MEDIATION_PROTOCOL, "keylist-update"),
            Self::KeylistUpdateResponse => (COORDINATE_MEDIATION_PROTOCOL, "keylist-update-response"),
            Self::BatchPickup => (MESSAGE_PICKUP_PROTOCOL, "batch-pickup"),
            Self::Batch => (MESSAGE_PICKUP_PROTOCOL, "batch"),
            Self::Forward => (ROUTING_PROTOCOL, "forward"),
        };
        MessageType::didcomm(protocol, 1, 0, name)
    }

    pub fn from_type(message_type: &MessageType) -> Option<Self> {
        Self::iter().find(|kind| kind.message_type().is_compatible_with(message_type))
    }

    pub fn handled_types() -> Vec<MessageType> {
        Self::iter().map(|kind| kind.message_type()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediationGrantBody {
    pub endpoint: String,
    #[serde(default)]
    pub routing_keys: Vec<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum KeylistAction {
    Add,
    Remove,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum KeylistResult {
    ClientError,
    ServerError,
    NoChange,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdate {
    pub recipient_key: String,
    pub action: KeylistAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdateBody {
    pub updates: Vec<KeylistUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdated {
    pub recipient_key: String,
    pub action: KeylistAction,
    pub result: KeylistResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdateResponseBody {
    pub updated: Vec<KeylistUpdated>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPickupBody {
    pub batch_size: usize,
}

/// A queued packed message. JSON envelopes travel as-is, anything else as base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchBody {
    #[serde(rename = "messages~attach", default)]
    pub messages_attach: Vec<BatchItem>,
}

/// Envelope for a mediator: `msg` is the packed message for the key `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardBody {
    pub to: String,
    pub msg: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_span_three_protocols() {
        let families: Vec<String> = MediationMessageKind::handled_types()
            .iter()
            .map(MessageType::protocol_uri)
            .collect();
        assert!(families.contains(&"https://didcomm.org/coordinate-mediation/1.0".to_string()));
        assert!(families.contains(&"https://didcomm.org/messagepickup/1.0".to_string()));
        assert!(families.contains(&"https://didcomm.org/routing/1.0".to_string()));
    }

    #[test]
    fn keylist_update_wire_shape() {
        let body: KeylistUpdateBody = serde_json::from_value(serde_json::json!({
            "updates": [{ "recipient_key": "k1", "action": "add" }]
        }))
        .unwrap();
        assert_eq!(body.updates[0].action, KeylistAction::Add);

        let response = KeylistUpdateResponseBody {
            updated: vec![KeylistUpdated {
                recipient_key: "k1".into(),
                action: KeylistAction::Remove,
                result: KeylistResult::NoChange,
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["updated"][0]["result"], "no_change");
    }
}
