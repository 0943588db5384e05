// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Issue-credential 1.0 and 2.0 messages.
//!
//! Both versions share one set of bodies. Supplements travel on 2.0 messages
//! only; they are stripped when a 1.0 message is built.

use parley_core::{Attachment, MessageType, Supplement};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub const ISSUE_CREDENTIAL_PROTOCOL: &str = "issue-credential";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CredentialProtocolVersion {
    V1,
    V2,
}

impl CredentialProtocolVersion {
    pub fn major(&self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    pub fn supports_supplements(&self) -> bool {
        matches!(self, Self::V2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum CredentialMessageKind {
    Proposal,
    Offer,
    Request,
    Credential,
    Ack,
    ProblemReport,
}

impl CredentialMessageKind {
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Proposal => "propose-credential",
            Self::Offer => "offer-credential",
            Self::Request => "request-credential",
            Self::Credential => "issue-credential",
            Self::Ack => "ack",
            Self::ProblemReport => "problem-report",
        }
    }

    pub fn message_type(&self, version: CredentialProtocolVersion) -> MessageType {
        MessageType::didcomm(ISSUE_CREDENTIAL_PROTOCOL, version.major(), 0, self.message_name())
    }

    /// The kind and protocol version of an inbound type.
    pub fn from_type(message_type: &MessageType) -> Option<(Self, CredentialProtocolVersion)> {
        CredentialProtocolVersion::iter().find_map(|version| {
            Self::iter()
                .find(|kind| kind.message_type(version).is_compatible_with(message_type))
                .map(|kind| (kind, version))
        })
    }

    pub fn handled_types() -> Vec<MessageType> {
        CredentialProtocolVersion::iter()
            .flat_map(|version| Self::iter().map(move |kind| kind.message_type(version)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPreviewAttribute {
    pub name: String,
    #[serde(rename = "mime-type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub value: String,
}

impl CredentialPreviewAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPreview {
    pub attributes: Vec<CredentialPreviewAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposeCredentialBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_preview: Option<CredentialPreview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplements: Vec<Supplement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferCredentialBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_preview: Option<CredentialPreview>,
    #[serde(rename = "offers~attach", default)]
    pub offers_attach: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplements: Vec<Supplement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCredentialBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "requests~attach", default)]
    pub requests_attach: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueCredentialBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "credentials~attach", default)]
    pub credentials_attach: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplements: Vec<Supplement>,
}

/// JSON payload of the first attachment that carries one.
pub fn attachment_json(attachments: &[Attachment]) -> Option<&serde_json::Value> {
    attachments.iter().find_map(|a| a.data.json.as_ref())
}

/// True when some attachment carries JSON or base64 data.
pub fn has_attachment_data(attachments: &[Attachment]) -> bool {
    attachments
        .iter()
        .any(|a| a.data.json.is_some() || a.data.base64.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_versions_resolve_to_their_kind() {
        let v1 = MessageType::parse("https://didcomm.org/issue-credential/1.0/offer-credential").unwrap();
        let v2 = MessageType::parse("https://didcomm.org/issue-credential/2.0/offer-credential").unwrap();
        assert_eq!(
            CredentialMessageKind::from_type(&v1),
            Some((CredentialMessageKind::Offer, CredentialProtocolVersion::V1))
        );
        assert_eq!(
            CredentialMessageKind::from_type(&v2),
            Some((CredentialMessageKind::Offer, CredentialProtocolVersion::V2))
        );
        assert_eq!(CredentialMessageKind::handled_types().len(), 12);
    }

    #[test]
    fn empty_supplements_are_not_serialized() {
        let body = OfferCredentialBody::default();
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("supplements").is_none());
        assert_eq!(json["offers~attach"], serde_json::json!([]));
    }

    #[test]
    fn attachment_data_detection() {
        assert!(!has_attachment_data(&[]));
        let attachment = Attachment::json(serde_json::json!({"nonce": "1"}));
        assert!(has_attachment_data(std::slice::from_ref(&attachment)));
        assert_eq!(attachment_json(&[attachment]).unwrap()["nonce"], "1");
    }
}
