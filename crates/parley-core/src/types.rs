// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Parley agent.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter plugged into the agent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Transport,
}

/// Derived lookup index of an exchange record.
pub type Tags = BTreeMap<String, String>;

/// A persisted exchange record in its storage form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: String,
    pub record_type: String,
    pub tags: Tags,
    /// The full record serialized as JSON.
    pub value: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Direction of a stored protocol message relative to this agent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Sender,
    Receiver,
}

/// The last protocol message of one class exchanged for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: String,
    pub associated_record_id: String,
    /// Canonical type URI of the message.
    pub message_class: String,
    pub role: MessageRole,
    /// The message serialized as JSON.
    pub message: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A packed message waiting for its recipient to poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub id: i64,
    pub connection_id: String,
    pub payload: Vec<u8>,
    pub created_at: String,
}

/// Equality filter over record tags. Every condition must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagQuery {
    conditions: BTreeMap<String, String>,
}

impl TagQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `tag == value` condition.
    pub fn with(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(tag.into(), value.into());
        self
    }

    /// Adds a condition only when a value is present.
    pub fn with_opt(self, tag: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with(tag, v),
            None => self,
        }
    }

    pub fn conditions(&self) -> &BTreeMap<String, String> {
        &self.conditions
    }

    /// True when every condition matches the given tags.
    pub fn matches(&self, tags: &Tags) -> bool {
        self.conditions
            .iter()
            .all(|(k, v)| tags.get(k).is_some_and(|t| t == v))
    }
}

impl fmt::Display for TagQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_query_matches_all_conditions() {
        let query = TagQuery::new().with("threadId", "t1").with("state", "done");
        let mut tags = Tags::new();
        tags.insert("threadId".into(), "t1".into());
        assert!(!query.matches(&tags));
        tags.insert("state".into(), "done".into());
        assert!(query.matches(&tags));
        assert_eq!(query.to_string(), "{state=done, threadId=t1}");
    }

    #[test]
    fn with_opt_skips_missing_values() {
        let query = TagQuery::new().with_opt("connectionId", None);
        assert!(query.conditions().is_empty());
    }

    #[test]
    fn message_role_display_is_lowercase() {
        assert_eq!(MessageRole::Sender.to_string(), "sender");
        assert_eq!("receiver".parse::<MessageRole>().unwrap(), MessageRole::Receiver);
    }
}
