// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides mock collaborators and an in-memory network for fast,
//! deterministic, CI-runnable tests without real transports or cryptography.
//!
//! # Components
//!
//! - [`PlainEnvelope`] - JSON "envelope" that wraps routed messages in forwards
//! - [`MockTransport`] - Outbound transport that records packages
//! - [`MockSessionSink`] - Session sink that records replies
//! - [`MockWallet`] / [`StaticResolver`] - Deterministic DIDs and DID documents
//! - [`TestNetwork`] - Agents wired to each other over `mem://` endpoints

pub mod envelope;
pub mod harness;
pub mod mock_transport;
pub mod mock_wallet;

pub use envelope::PlainEnvelope;
pub use harness::{TestAgent, TestNetwork, eventually};
pub use mock_transport::{MockSessionSink, MockTransport};
pub use mock_wallet::{MockWallet, StaticResolver};
