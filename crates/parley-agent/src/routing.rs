// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use parley_core::DidDoc;

/// The identity and inbound path we advertise for one relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    pub did: String,
    pub verkey: String,
    /// Our inbound endpoints, or the mediator's when mediated. Empty means queue-only.
    pub endpoints: Vec<String>,
    pub routing_keys: Vec<String>,
    /// Mediation record the keys were registered with.
    pub mediator_id: Option<String>,
}

impl Routing {
    pub fn did_doc(&self) -> DidDoc {
        DidDoc::for_endpoints(&self.did, &self.verkey, &self.endpoints, &self.routing_keys)
    }

    /// First advertised endpoint, or the queue placeholder.
    pub fn primary_endpoint(&self) -> String {
        self.did_doc()
            .services
            .into_iter()
            .next()
            .map(|s| s.service_endpoint)
            .unwrap_or_else(|| parley_core::DID_COMM_TRANSPORT_QUEUE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_routing_advertises_the_queue() {
        let routing = Routing {
            did: "did:peer:1".into(),
            verkey: "key-1".into(),
            endpoints: vec![],
            routing_keys: vec![],
            mediator_id: None,
        };
        assert_eq!(routing.primary_endpoint(), parley_core::DID_COMM_TRANSPORT_QUEUE);
        assert_eq!(routing.did_doc().recipient_keys(), vec!["key-1".to_string()]);
    }
}
