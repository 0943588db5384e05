// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DID resolution boundary.

use async_trait::async_trait;

use crate::did::DidDoc;
use crate::error::ParleyError;

/// Resolves a DID string to its document.
///
/// Used when an out-of-band invitation lists services by DID instead of inline.
#[async_trait]
pub trait DidResolver: Send + Sync {
    async fn resolve(&self, did: &str) -> Result<DidDoc, ParleyError>;
}
