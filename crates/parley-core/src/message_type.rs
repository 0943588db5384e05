// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message type URIs: parsing, legacy prefix normalization, and protocol matching.
//!
//! A message type URI has the shape
//! `{document_uri}/{protocol_name}/{major}.{minor}/{message_name}`, for example
//! `https://didcomm.org/issue-credential/1.0/offer-credential`.

use std::fmt;
use std::str::FromStr;

use crate::error::ParleyError;

/// Canonical document URI for DIDComm protocol families.
pub const DIDCOMM_DOCUMENT_URI: &str = "https://didcomm.org";

/// Legacy document prefix still sent by older agents.
pub const LEGACY_DIDCOMM_PREFIX: &str = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/";

/// A parsed message type URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageType {
    pub document_uri: String,
    pub protocol_name: String,
    pub major: u32,
    pub minor: u32,
    pub message_name: String,
}

impl MessageType {
    /// Builds a message type in the `https://didcomm.org` document namespace.
    pub fn didcomm(protocol_name: &str, major: u32, minor: u32, message_name: &str) -> Self {
        Self {
            document_uri: DIDCOMM_DOCUMENT_URI.to_string(),
            protocol_name: protocol_name.to_string(),
            major,
            minor,
            message_name: message_name.to_string(),
        }
    }

    /// Parses a message type URI, rewriting the legacy `did:sov` prefix first.
    pub fn parse(uri: &str) -> Result<Self, ParleyError> {
        let normalized = normalize_type_uri(uri);
        let mut parts = normalized.rsplitn(4, '/');
        let (Some(message_name), Some(version), Some(protocol_name), Some(document_uri)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParleyError::InvalidMessage(format!(
                "malformed message type `{uri}`"
            )));
        };

        let (major, minor) = parse_version(version).ok_or_else(|| {
            ParleyError::InvalidMessage(format!("malformed protocol version in `{uri}`"))
        })?;

        if message_name.is_empty() || protocol_name.is_empty() || document_uri.is_empty() {
            return Err(ParleyError::InvalidMessage(format!(
                "malformed message type `{uri}`"
            )));
        }

        Ok(Self {
            document_uri: document_uri.to_string(),
            protocol_name: protocol_name.to_string(),
            major,
            minor,
            message_name: message_name.to_string(),
        })
    }

    /// Full canonical URI, e.g. `https://didcomm.org/issue-credential/1.0/offer-credential`.
    pub fn canonical_uri(&self) -> String {
        format!("{}/{}", self.protocol_uri(), self.message_name)
    }

    /// Protocol URI with version, e.g. `https://didcomm.org/issue-credential/1.0`.
    pub fn protocol_uri(&self) -> String {
        format!(
            "{}/{}/{}.{}",
            self.document_uri, self.protocol_name, self.major, self.minor
        )
    }

    /// Storage key for a message: document, protocol, major version and name.
    ///
    /// The minor version is left out, so every minor revision of a step shares
    /// one class, e.g. `https://didcomm.org/issue-credential/1/offer-credential`.
    pub fn message_class(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.document_uri, self.protocol_name, self.major, self.message_name
        )
    }

    /// Protocol family without version, e.g. `https://didcomm.org/issue-credential`.
    pub fn family(&self) -> String {
        format!("{}/{}", self.document_uri, self.protocol_name)
    }

    /// Another message of the same protocol version.
    pub fn sibling(&self, message_name: &str) -> Self {
        Self {
            message_name: message_name.to_string(),
            ..self.clone()
        }
    }

    /// Same document, protocol, major version, and message name; minor versions may differ.
    pub fn is_compatible_with(&self, other: &MessageType) -> bool {
        self.document_uri == other.document_uri
            && self.protocol_name == other.protocol_name
            && self.major == other.major
            && self.message_name == other.message_name
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_uri())
    }
}

impl FromStr for MessageType {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::parse(s)
    }
}

/// Rewrites the legacy `did:sov:...;spec/` prefix to `https://didcomm.org/`.
pub fn normalize_type_uri(uri: &str) -> String {
    match uri.strip_prefix(LEGACY_DIDCOMM_PREFIX) {
        Some(rest) => format!("{DIDCOMM_DOCUMENT_URI}/{rest}"),
        None => uri.to_string(),
    }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}
