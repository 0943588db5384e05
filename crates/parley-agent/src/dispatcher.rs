// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes decrypted messages to the handler registered for their type.
//!
//! The handler table is built once at agent construction. A type URI claimed
//! by two handlers fails registration. Lookup tries the exact canonical URI
//! first, then any registered type of the same protocol major version, so a
//! `1.1` peer still reaches a `1.0` handler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{MessageType, ParleyError};
use tracing::debug;

use crate::context::InboundMessageContext;
use crate::outbound::OutboundMessage;

/// What a handler produced for one inbound message.
#[derive(Debug, Default)]
pub struct HandlerOutput {
    pub reply: Option<OutboundMessage>,
    /// Packed messages carried inside this one (pickup batches) to run
    /// through the inbound path next.
    pub redeliver: Vec<Vec<u8>>,
}

impl HandlerOutput {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn reply(message: OutboundMessage) -> Self {
        Self {
            reply: Some(message),
            redeliver: Vec::new(),
        }
    }

    pub fn maybe_reply(message: Option<OutboundMessage>) -> Self {
        Self {
            reply: message,
            redeliver: Vec::new(),
        }
    }

    pub fn redeliver(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            reply: None,
            redeliver: payloads,
        }
    }
}

/// Processes every message of the types it declares.
#[async_trait]
pub trait Handler: Send + Sync {
    fn supported_message_types(&self) -> Vec<MessageType>;

    async fn handle(&self, ctx: &InboundMessageContext) -> Result<HandlerOutput, ParleyError>;
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<Arc<dyn Handler>>,
    /// Canonical type URI to handler index, in registration order.
    routes: Vec<(MessageType, usize)>,
    exact: HashMap<String, usize>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler; fails without registering anything if one of its
    /// types is already claimed.
    pub fn register_handler(&mut self, handler: Arc<dyn Handler>) -> Result<(), ParleyError> {
        let types = handler.supported_message_types();
        let mut claimed = Vec::with_capacity(types.len());
        for message_type in &types {
            let uri = message_type.canonical_uri();
            if self.exact.contains_key(&uri) || claimed.contains(&uri) {
                return Err(ParleyError::HandlerConflict { message_type: uri });
            }
            claimed.push(uri);
        }

        let index = self.handlers.len();
        self.handlers.push(handler);
        for (message_type, uri) in types.into_iter().zip(claimed) {
            debug!(message_type = %uri, "handler registered");
            self.exact.insert(uri, index);
            self.routes.push((message_type, index));
        }
        Ok(())
    }

    /// Runs the handler for the message's type. Handler errors propagate.
    pub async fn dispatch(&self, ctx: &InboundMessageContext) -> Result<HandlerOutput, ParleyError> {
        let handler = self.handler_for(&ctx.message.message_type)?;
        debug!(
            message_type = %ctx.message.message_type,
            thread_id = ctx.thread_id(),
            connection_id = ctx.connection_id(),
            "dispatching message"
        );
        handler.handle(ctx).await
    }

    fn handler_for(&self, type_uri: &str) -> Result<&Arc<dyn Handler>, ParleyError> {
        let unsupported = || ParleyError::UnsupportedProtocol {
            message_type: type_uri.to_string(),
        };
        let message_type = MessageType::parse(type_uri).map_err(|_| unsupported())?;
        let index = self
            .exact
            .get(&message_type.canonical_uri())
            .copied()
            .or_else(|| {
                self.routes
                    .iter()
                    .find(|(registered, _)| registered.is_compatible_with(&message_type))
                    .map(|(_, index)| *index)
            })
            .ok_or_else(unsupported)?;
        self.handlers.get(index).ok_or_else(unsupported)
    }

    pub fn supported_message_types(&self) -> Vec<MessageType> {
        self.routes.iter().map(|(t, _)| t.clone()).collect()
    }

    /// Distinct protocol URIs (`document/protocol/major.minor`) in registration order.
    pub fn supported_protocols(&self) -> Vec<String> {
        let mut protocols: Vec<String> = Vec::new();
        for (message_type, _) in &self.routes {
            let uri = message_type.protocol_uri();
            if !protocols.contains(&uri) {
                protocols.push(uri);
            }
        }
        protocols
    }

    /// Supported protocol URIs whose family matches one of `families`, in the
    /// priority order of `families`.
    ///
    /// A family is given as `document/protocol` or `document/protocol/major.minor`;
    /// a versioned family matches any minor version of the same major.
    pub fn filter_supported_protocols_by_message_families(&self, families: &[String]) -> Vec<String> {
        let supported = self.supported_protocols();
        let mut filtered: Vec<String> = Vec::new();
        for family in families {
            for protocol in &supported {
                if family_matches(family, protocol) && !filtered.contains(protocol) {
                    filtered.push(protocol.clone());
                }
            }
        }
        filtered
    }
}

fn family_matches(family: &str, protocol_uri: &str) -> bool {
    let family = parley_core::message_type::normalize_type_uri(family);
    let family = family.trim_end_matches('/');
    let (Ok(probe), Ok(supported)) = (
        MessageType::parse(&format!("{family}/x")),
        MessageType::parse(&format!("{protocol_uri}/x")),
    ) else {
        // Unversioned family: compare the family prefix.
        return protocol_uri
            .rsplit_once('/')
            .is_some_and(|(prefix, _)| prefix == family);
    };
    probe.is_compatible_with(&supported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::AgentMessage;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        types: Vec<MessageType>,
        calls: AtomicUsize,
    }

    impl CountingHandler {
        fn new(types: Vec<MessageType>) -> Arc<Self> {
            Arc::new(Self {
                types,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Handler for CountingHandler {
        fn supported_message_types(&self) -> Vec<MessageType> {
            self.types.clone()
        }

        async fn handle(&self, _ctx: &InboundMessageContext) -> Result<HandlerOutput, ParleyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerOutput::none())
        }
    }

    fn ctx(type_uri: &str) -> InboundMessageContext {
        let mut message = AgentMessage::new(&MessageType::didcomm("x", 1, 0, "y"), &json!({})).unwrap();
        message.message_type = type_uri.to_string();
        InboundMessageContext::new(message)
    }

    fn offer(minor: u32) -> MessageType {
        MessageType::didcomm("issue-credential", 1, minor, "offer-credential")
    }

    #[tokio::test]
    async fn duplicate_registration_fails_and_registers_nothing() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register_handler(CountingHandler::new(vec![offer(0)]))
            .unwrap();
        let late = CountingHandler::new(vec![
            MessageType::didcomm("present-proof", 1, 0, "presentation"),
            offer(0),
        ]);
        let err = dispatcher.register_handler(late).unwrap_err();
        assert!(matches!(err, ParleyError::HandlerConflict { .. }));
        assert_eq!(dispatcher.supported_message_types(), vec![offer(0)]);
    }

    #[tokio::test]
    async fn legacy_prefix_and_minor_versions_reach_the_handler() {
        let handler = CountingHandler::new(vec![offer(0)]);
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_handler(handler.clone()).unwrap();

        dispatcher
            .dispatch(&ctx("did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/issue-credential/1.0/offer-credential"))
            .await
            .unwrap();
        dispatcher
            .dispatch(&ctx("https://didcomm.org/issue-credential/1.3/offer-credential"))
            .await
            .unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_type_is_unsupported() {
        let dispatcher = Dispatcher::new();
        for uri in [
            "https://didcomm.org/issue-credential/2.0/offer-credential",
            "not a type",
        ] {
            let err = dispatcher.dispatch(&ctx(uri)).await.unwrap_err();
            assert!(matches!(err, ParleyError::UnsupportedProtocol { .. }));
        }
    }

    #[tokio::test]
    async fn family_filter_keeps_priority_order() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register_handler(CountingHandler::new(vec![
                MessageType::didcomm("connections", 1, 0, "request"),
                MessageType::didcomm("connections", 1, 0, "response"),
                MessageType::didcomm("didexchange", 1, 0, "request"),
                MessageType::didcomm("trust_ping", 1, 0, "ping"),
            ]))
            .unwrap();

        let families = vec![
            "https://didcomm.org/didexchange/1.1".to_string(),
            "https://didcomm.org/connections".to_string(),
            "https://didcomm.org/unknown".to_string(),
        ];
        assert_eq!(
            dispatcher.filter_supported_protocols_by_message_families(&families),
            vec![
                "https://didcomm.org/didexchange/1.0".to_string(),
                "https://didcomm.org/connections/1.0".to_string(),
            ]
        );
        assert_eq!(dispatcher.supported_protocols().len(), 3);
    }
}
