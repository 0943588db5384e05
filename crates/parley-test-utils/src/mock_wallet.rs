// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic wallet and in-memory DID resolver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parley_core::{DidDoc, DidInfo, DidResolver, ParleyError, Wallet};
use tokio::sync::RwLock;

/// Wallet that hands out readable, sequential DIDs and keys.
///
/// Keys look like `alice-key-3`, which keeps test assertions and log output
/// legible.
pub struct MockWallet {
    label: String,
    counter: AtomicUsize,
}

impl MockWallet {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            counter: AtomicUsize::new(0),
        }
    }

    /// Number of DIDs created so far.
    pub fn created(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn create_did(&self) -> Result<DidInfo, ParleyError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DidInfo {
            did: format!("did:peer:{}-{n}", self.label),
            verkey: format!("{}-key-{n}", self.label),
        })
    }
}

/// Resolver backed by a map of registered documents.
#[derive(Default)]
pub struct StaticResolver {
    docs: RwLock<HashMap<String, DidDoc>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, doc: DidDoc) {
        self.docs.write().await.insert(doc.id.clone(), doc);
    }
}

#[async_trait]
impl DidResolver for StaticResolver {
    async fn resolve(&self, did: &str) -> Result<DidDoc, ParleyError> {
        self.docs
            .read()
            .await
            .get(did)
            .cloned()
            .ok_or_else(|| ParleyError::RecordNotFound {
                record_type: "DidDoc".into(),
                query: did.to_string(),
            })
    }
}
