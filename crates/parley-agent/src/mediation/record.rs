// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use parley_core::Tags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::record::{ExchangeRecord, ProtocolState};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MediationState {
    Requested,
    Granted,
    Denied,
}

impl ProtocolState for MediationState {
    /// Keylist changes after the grant update the record without a transition.
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Granted | Self::Denied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MediationRole {
    /// We asked the peer to mediate for us.
    Recipient,
    /// We mediate for the peer.
    Mediator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediationRecord {
    pub id: String,
    pub connection_id: String,
    pub thread_id: String,
    pub state: MediationState,
    pub role: MediationRole,
    /// Mediator's endpoint, from the grant.
    pub endpoint: Option<String>,
    #[serde(default)]
    pub routing_keys: Vec<String>,
    /// Keys the mediator accepts forwards for.
    #[serde(default)]
    pub recipient_keys: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediationRecord {
    pub fn new(
        connection_id: impl Into<String>,
        thread_id: impl Into<String>,
        state: MediationState,
        role: MediationRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            connection_id: connection_id.into(),
            thread_id: thread_id.into(),
            state,
            role,
            endpoint: None,
            routing_keys: Vec::new(),
            recipient_keys: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == MediationState::Granted
    }
}

/// Tag marking one recipient key; tags are single-valued.
pub fn recipient_key_tag(key: &str) -> String {
    format!("recipientKey:{key}")
}

impl ExchangeRecord for MediationRecord {
    const RECORD_TYPE: &'static str = "MediationRecord";
    type State = MediationState;

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> MediationState {
        self.state
    }

    fn set_state(&mut self, state: MediationState) {
        self.state = state;
    }

    fn thread_id(&self) -> Option<&str> {
        Some(&self.thread_id)
    }

    fn connection_id(&self) -> Option<&str> {
        Some(&self.connection_id)
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
        for key in &self.recipient_keys {
            tags.insert(recipient_key_tag(key), "true".into());
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_recipient_key_gets_its_own_tag() {
        let mut record = MediationRecord::new("c1", "t1", MediationState::Granted, MediationRole::Mediator);
        record.recipient_keys = vec!["k1".into(), "k2".into()];
        let tags = record.tags();
        assert_eq!(tags[&recipient_key_tag("k1")], "true");
        assert_eq!(tags[&recipient_key_tag("k2")], "true");
        assert_eq!(tags["connectionId"], "c1");
        assert_eq!(tags["role"], "mediator");
    }
}
