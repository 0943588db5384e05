// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Issue-credential 1.0 and 2.0.

pub mod handler;
pub mod messages;
pub mod record;
pub mod service;

pub use handler::CredentialHandler;
pub use messages::{
    CredentialMessageKind, CredentialPreview, CredentialPreviewAttribute,
    CredentialProtocolVersion,
};
pub use record::{
    CredentialExchangeRecord, CredentialMetadata, CredentialMetadataKey, CredentialRole,
    CredentialState,
};
pub use service::{
    CredentialIssueOptions, CredentialOfferOptions, CredentialProposalOptions,
    CredentialRequestOptions, CredentialService,
};
