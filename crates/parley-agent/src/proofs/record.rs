// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use parley_core::Tags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::messages::ProofProtocolVersion;
use crate::record::{ExchangeRecord, ProtocolState};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProofState {
    ProposalSent,
    ProposalReceived,
    RequestSent,
    RequestReceived,
    PresentationSent,
    PresentationReceived,
    Done,
    Declined,
    Abandoned,
}

impl ProtocolState for ProofState {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Declined | Self::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProofRole {
    Prover,
    Verifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofExchangeRecord {
    pub id: String,
    pub thread_id: String,
    pub connection_id: Option<String>,
    pub state: ProofState,
    pub role: ProofRole,
    pub protocol_version: ProofProtocolVersion,
    /// Verifier only: set once a presentation has been received.
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub presentation: Option<serde_json::Value>,
    pub auto_accept: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProofExchangeRecord {
    pub fn new(
        thread_id: impl Into<String>,
        connection_id: Option<String>,
        state: ProofState,
        role: ProofRole,
        protocol_version: ProofProtocolVersion,
        auto_accept: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            connection_id,
            state,
            role,
            protocol_version,
            is_verified: None,
            presentation: None,
            auto_accept,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl ExchangeRecord for ProofExchangeRecord {
    const RECORD_TYPE: &'static str = "ProofRecord";
    type State = ProofState;

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> ProofState {
        self.state
    }

    fn set_state(&mut self, state: ProofState) {
        self.state = state;
    }

    fn thread_id(&self) -> Option<&str> {
        Some(&self.thread_id)
    }

    fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
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
        tags.insert("protocolVersion".into(), self.protocol_version.to_string());
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectionless_records_omit_the_connection_tag() {
        let record = ProofExchangeRecord::new(
            "t-1",
            None,
            ProofState::RequestSent,
            ProofRole::Verifier,
            ProofProtocolVersion::V1,
            false,
        );
        let tags = record.tags();
        assert!(!tags.contains_key("connectionId"));
        assert_eq!(tags["state"], "request-sent");
        assert_eq!(tags["role"], "verifier");
    }
}
