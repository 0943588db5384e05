// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley DIDComm agent.
//!
//! This crate provides the error taxonomy, the wire message shape, message type
//! URIs, DID service types, and the boundary traits for every external
//! collaborator (storage, envelope, wallet, DID resolver, transports).

pub mod did;
pub mod error;
pub mod message;
pub mod message_type;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use did::{DID_COMM_TRANSPORT_QUEUE, DidCommService, DidDoc};
pub use error::ParleyError;
pub use message::{AgentMessage, Attachment, ReturnRoute, ServiceDecorator, Supplement};
pub use message_type::MessageType;
pub use types::{AdapterType, HealthStatus, MessageRole, TagQuery, Tags};

pub use traits::{
    DecryptedMessage, DidInfo, DidResolver, EnvelopeKeys, EnvelopeService, OutboundPackage,
    OutboundTransport, PluginAdapter, SessionSink, StorageAdapter, TransportSession, Wallet,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips_through_display() {
        use std::str::FromStr;

        for variant in [AdapterType::Storage, AdapterType::Transport] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(HealthStatus::Degraded("slow".into()), HealthStatus::Healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), HealthStatus::Healthy);
    }

    #[test]
    fn boundary_traits_are_object_safe() {
        fn _assert_storage(_: &dyn StorageAdapter) {}
        fn _assert_transport(_: &dyn OutboundTransport) {}
        fn _assert_envelope(_: &dyn EnvelopeService) {}
        fn _assert_wallet(_: &dyn Wallet) {}
        fn _assert_resolver(_: &dyn DidResolver) {}
        fn _assert_sink(_: &dyn SessionSink) {}
    }
}
