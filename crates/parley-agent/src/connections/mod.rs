// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pairwise connections: legacy connections 1.0, DID exchange 1.0 and trust ping.

pub mod handler;
pub mod messages;
pub mod record;
pub mod service;

pub use handler::ConnectionHandler;
pub use messages::{ConnectionInvitation, ConnectionMessageKind};
pub use record::{ConnectionRecord, ConnectionRole, ConnectionState, HandshakeProtocol};
pub use service::ConnectionService;
