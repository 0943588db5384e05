// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use parley_core::Tags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants, EnumIter, EnumString};

use super::messages::{CredentialPreviewAttribute, CredentialProtocolVersion};
use crate::record::{ExchangeRecord, Metadata, MetadataEntry, ProtocolState};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CredentialState {
    ProposalSent,
    ProposalReceived,
    OfferSent,
    OfferReceived,
    RequestSent,
    RequestReceived,
    CredentialIssued,
    CredentialReceived,
    Done,
    Declined,
    Abandoned,
}

impl ProtocolState for CredentialState {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Declined | Self::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CredentialRole {
    Issuer,
    Holder,
}

/// Transient issuance data kept on the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(CredentialMetadataKey))]
#[strum_discriminants(derive(Hash))]
#[serde(tag = "key", content = "value", rename_all = "camelCase")]
pub enum CredentialMetadata {
    /// Holder secret produced with the request; needed to accept the credential.
    RequestMetadata(serde_json::Value),
    CredentialDefinitionId(String),
    SchemaId(String),
}

impl MetadataEntry for CredentialMetadata {
    type Key = CredentialMetadataKey;

    fn key(&self) -> CredentialMetadataKey {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialExchangeRecord {
    pub id: String,
    pub thread_id: String,
    /// Absent for connection-less exchanges.
    pub connection_id: Option<String>,
    pub state: CredentialState,
    pub role: CredentialRole,
    pub protocol_version: CredentialProtocolVersion,
    #[serde(default)]
    pub credential_attributes: Vec<CredentialPreviewAttribute>,
    /// Issued credential payload, once received.
    #[serde(default)]
    pub credential: Option<serde_json::Value>,
    pub auto_accept: bool,
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: Metadata<CredentialMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialExchangeRecord {
    pub fn new(
        thread_id: impl Into<String>,
        connection_id: Option<String>,
        state: CredentialState,
        role: CredentialRole,
        protocol_version: CredentialProtocolVersion,
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
            credential_attributes: Vec::new(),
            credential: None,
            auto_accept,
            error_message: None,
            metadata: Metadata::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl ExchangeRecord for CredentialExchangeRecord {
    const RECORD_TYPE: &'static str = "CredentialRecord";
    type State = CredentialState;

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> CredentialState {
        self.state
    }

    fn set_state(&mut self, state: CredentialState) {
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
