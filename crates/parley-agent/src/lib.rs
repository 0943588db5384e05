// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message dispatch and exchange state machines for the Parley DIDComm agent.
//!
//! The [`Agent`] is the entry point that:
//! - Unpacks inbound wire messages and resolves the connection they belong to
//! - Routes them to the protocol handler registered for their type
//! - Advances persisted exchange records one checked transition at a time
//! - Delivers replies over a live session, a peer service, or the queue

pub mod agent;
pub mod binding;
pub mod connections;
pub mod context;
pub mod credentials;
pub mod dispatcher;
pub mod locks;
pub mod mediation;
pub mod message_repository;
pub mod message_sender;
pub mod notification;
pub mod oob;
pub mod outbound;
pub mod proofs;
pub mod record;
pub mod repository;
pub mod routing;
pub mod transport_service;

pub use agent::{Agent, AgentBuilder, ReceiveInvitationOptions};
pub use context::InboundMessageContext;
pub use dispatcher::{Dispatcher, Handler, HandlerOutput};
pub use locks::ExchangeLocks;
pub use message_repository::DidCommMessageRepository;
pub use message_sender::{Delivery, MessageSender, ResolvedServices, prioritize_services};
pub use outbound::{OutboundMessage, OutboundTarget};
pub use record::{ExchangeRecord, ProtocolState};
pub use repository::Repository;
pub use routing::Routing;
pub use transport_service::TransportService;
