// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound transport adapter trait (HTTP, WebSocket, in-memory, ...).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;

/// Packed bytes addressed to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPackage {
    pub payload: Vec<u8>,
    pub endpoint: String,
    /// True when the message asked the peer to reply on this connection.
    pub response_requested: bool,
    pub connection_id: Option<String>,
}

/// Scheme-keyed send primitive.
///
/// A transport that keeps the connection open for return-routed replies feeds
/// those reply bytes back into the agent's inbound path itself.
#[async_trait]
pub trait OutboundTransport: PluginAdapter {
    /// URI schemes this transport can deliver to, e.g. `["http", "https"]`.
    fn supported_schemes(&self) -> Vec<String>;

    async fn send_message(&self, package: OutboundPackage) -> Result<(), ParleyError>;
}
