// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DIDComm wire message shape and the decorators the core inspects.
//!
//! Only `@id`, `@type`, `~thread`, `~transport` and `~service` are interpreted
//! here. Every other field is protocol payload, kept as an opaque JSON map and
//! decoded into typed bodies by the protocol services.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ParleyError;
use crate::message_type::MessageType;

/// A decrypted DIDComm message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@type")]
    pub message_type: String,

    #[serde(rename = "~thread", default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadDecorator>,

    #[serde(rename = "~transport", default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportDecorator>,

    #[serde(rename = "~service", default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceDecorator>,

    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl AgentMessage {
    /// Creates a message with a fresh id and the given typed body.
    ///
    /// The body must serialize to a JSON object.
    pub fn new<B: Serialize>(message_type: &MessageType, body: &B) -> Result<Self, ParleyError> {
        let body = match serde_json::to_value(body)? {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(ParleyError::InvalidMessage(format!(
                    "message body must be a JSON object, got {other}"
                )));
            }
        };
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_type: message_type.canonical_uri(),
            thread: None,
            transport: None,
            service: None,
            body,
        })
    }

    /// Parses the declared `@type`.
    pub fn parsed_type(&self) -> Result<MessageType, ParleyError> {
        MessageType::parse(&self.message_type)
    }

    /// Decodes the protocol payload into a typed body.
    pub fn body<B: DeserializeOwned>(&self) -> Result<B, ParleyError> {
        let value = serde_json::Value::Object(self.body.clone());
        serde_json::from_value(value).map_err(|e| {
            ParleyError::InvalidMessage(format!("{} has an invalid body: {e}", self.message_type))
        })
    }

    /// Thread id of this message. A message without `~thread.thid` starts its own thread.
    pub fn thread_id(&self) -> &str {
        self.thread
            .as_ref()
            .and_then(|t| t.thid.as_deref())
            .unwrap_or(self.id.as_str())
    }

    /// Parent thread id, used by out-of-band flows.
    pub fn parent_thread_id(&self) -> Option<&str> {
        self.thread.as_ref().and_then(|t| t.pthid.as_deref())
    }

    /// Sets `~thread.thid`, keeping any parent thread id.
    pub fn set_thread_id(&mut self, thread_id: impl Into<String>) {
        self.thread.get_or_insert_with(ThreadDecorator::default).thid = Some(thread_id.into());
    }

    /// Sets `~thread.pthid`.
    pub fn set_parent_thread_id(&mut self, parent_thread_id: impl Into<String>) {
        self.thread.get_or_insert_with(ThreadDecorator::default).pthid =
            Some(parent_thread_id.into());
    }

    /// Builder variant of [`set_thread_id`](Self::set_thread_id).
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.set_thread_id(thread_id);
        self
    }

    /// True when the sender asked for replies on the inbound transport connection.
    pub fn has_return_routing(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|t| t.return_route != ReturnRoute::None)
    }

    /// True when the sender asked for replies on this thread over the inbound connection.
    pub fn has_return_routing_for_thread(&self, thread_id: &str) -> bool {
        match self.transport.as_ref() {
            Some(t) => match t.return_route {
                ReturnRoute::All => true,
                ReturnRoute::Thread => t.return_route_thread.as_deref() == Some(thread_id),
                ReturnRoute::None => false,
            },
            None => false,
        }
    }

    /// Requests return routing on this message.
    pub fn set_return_routing(&mut self, route: ReturnRoute) {
        let thread = match route {
            ReturnRoute::Thread => Some(self.thread_id().to_string()),
            _ => None,
        };
        self.transport = Some(TransportDecorator {
            return_route: route,
            return_route_thread: thread,
        });
    }
}

/// The `~thread` decorator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDecorator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,
}

/// Return-route modes of the `~transport` decorator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnRoute {
    #[default]
    None,
    All,
    Thread,
}

/// The `~transport` decorator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportDecorator {
    #[serde(default)]
    pub return_route: ReturnRoute,

    #[serde(rename = "return_route_thread", default, skip_serializing_if = "Option::is_none")]
    pub return_route_thread: Option<String>,
}

/// The `~service` decorator used for connection-less exchanges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDecorator {
    pub recipient_keys: Vec<String>,
    #[serde(default)]
    pub routing_keys: Vec<String>,
    pub service_endpoint: String,
}

/// Supplemental data attached to credential messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplement {
    #[serde(rename = "type")]
    pub supplement_type: String,

    /// Id of the attachment this supplement describes.
    #[serde(rename = "ref")]
    pub reference: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<SupplementAttribute>,
}

/// A key/value attribute of a [`Supplement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementAttribute {
    pub key: String,
    pub value: String,
}

/// An `~attach` entry carrying an opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "mime-type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    pub data: AttachmentData,
}

impl Attachment {
    /// A JSON attachment with a fresh id.
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            mime_type: Some("application/json".to_string()),
            data: AttachmentData {
                json: Some(value),
                base64: None,
            },
        }
    }
}

/// Payload of an [`Attachment`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_round_trips_decorators_and_body() {
        let raw = json!({
            "@id": "m-1",
            "@type": "https://didcomm.org/issue-credential/1.0/ack",
            "~thread": { "thid": "t-1", "pthid": "p-1" },
            "~transport": { "return_route": "all" },
            "status": "OK"
        });
        let message: AgentMessage = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(message.thread_id(), "t-1");
        assert_eq!(message.parent_thread_id(), Some("p-1"));
        assert!(message.has_return_routing());
        assert_eq!(message.body.get("status"), Some(&json!("OK")));
        assert_eq!(serde_json::to_value(&message).unwrap(), raw);
    }

    #[test]
    fn thread_id_defaults_to_message_id() {
        let t = MessageType::didcomm("trust_ping", 1, 0, "ping");
        let message = AgentMessage::new(&t, &json!({})).unwrap();
        assert_eq!(message.thread_id(), message.id);
        assert!(!message.has_return_routing());
    }

    #[test]
    fn non_object_body_is_rejected() {
        let t = MessageType::didcomm("trust_ping", 1, 0, "ping");
        assert!(AgentMessage::new(&t, &json!([1, 2])).is_err());
    }

    #[test]
    fn thread_return_route_matches_only_its_thread() {
        let t = MessageType::didcomm("trust_ping", 1, 0, "ping");
        let mut message = AgentMessage::new(&t, &json!({})).unwrap();
        message.set_thread_id("abc");
        message.set_return_routing(ReturnRoute::Thread);
        assert!(message.has_return_routing_for_thread("abc"));
        assert!(!message.has_return_routing_for_thread("other"));
    }

    #[test]
    fn supplement_uses_wire_field_names() {
        let supplement = Supplement {
            supplement_type: "hashlink-data".into(),
            reference: "attach-1".into(),
            attrs: vec![SupplementAttribute {
                key: "field".into(),
                value: "photo".into(),
            }],
        };
        let value = serde_json::to_value(&supplement).unwrap();
        assert_eq!(value["type"], "hashlink-data");
        assert_eq!(value["ref"], "attach-1");
        assert_eq!(value["attrs"][0]["key"], "field");
    }
}
