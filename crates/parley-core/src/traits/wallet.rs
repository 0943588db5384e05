// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wallet boundary for key creation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ParleyError;

/// A DID with its verification key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidInfo {
    pub did: String,
    pub verkey: String,
}

/// Creates the DIDs and keys used for connections and invitations.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn create_did(&self) -> Result<DidInfo, ParleyError>;
}
