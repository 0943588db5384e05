// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Present-proof 1.0 and 2.0 messages.

use parley_core::{Attachment, MessageType};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub const PRESENT_PROOF_PROTOCOL: &str = "present-proof";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProofProtocolVersion {
    V1,
    V2,
}

impl ProofProtocolVersion {
    pub fn major(&self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ProofMessageKind {
    Proposal,
    Request,
    Presentation,
    Ack,
    ProblemReport,
}

impl ProofMessageKind {
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Proposal => "propose-presentation",
            Self::Request => "request-presentation",
            Self::Presentation => "presentation",
            Self::Ack => "ack",
            Self::ProblemReport => "problem-report",
        }
    }

    pub fn message_type(&self, version: ProofProtocolVersion) -> MessageType {
        MessageType::didcomm(PRESENT_PROOF_PROTOCOL, version.major(), 0, self.message_name())
    }

    pub fn from_type(message_type: &MessageType) -> Option<(Self, ProofProtocolVersion)> {
        ProofProtocolVersion::iter().find_map(|version| {
            Self::iter()
                .find(|kind| kind.message_type(version).is_compatible_with(message_type))
                .map(|kind| (kind, version))
        })
    }

    pub fn handled_types() -> Vec<MessageType> {
        ProofProtocolVersion::iter()
            .flat_map(|version| Self::iter().map(move |kind| kind.message_type(version)))
            .collect()
    }
}

/// Opaque presentation preview carried by a proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposePresentationBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_proposal: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPresentationBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "request_presentations~attach", default)]
    pub request_presentations_attach: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "presentations~attach", default)]
    pub presentations_attach: Vec<Attachment>,
}
