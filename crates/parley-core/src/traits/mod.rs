// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary traits for the collaborators the agent core consumes.
//!
//! Pluggable adapters extend the [`PluginAdapter`] base trait. All traits use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod envelope;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod transport;
pub mod wallet;

pub use adapter::PluginAdapter;
pub use envelope::{DecryptedMessage, EnvelopeKeys, EnvelopeService};
pub use resolver::DidResolver;
pub use session::{SessionSink, TransportSession};
pub use storage::StorageAdapter;
pub use transport::{OutboundPackage, OutboundTransport};
pub use wallet::{DidInfo, Wallet};
