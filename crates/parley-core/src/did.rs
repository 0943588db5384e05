// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DID documents and DIDComm service endpoints.

use serde::{Deserialize, Serialize};

use crate::message::ServiceDecorator;

/// Sentinel endpoint meaning "no reachable address; hold messages until the peer polls".
pub const DID_COMM_TRANSPORT_QUEUE: &str = "didcomm:transport/queue";

/// A peer's advertised endpoint plus the key material needed to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCommService {
    pub id: String,
    pub service_endpoint: String,
    #[serde(default)]
    pub recipient_keys: Vec<String>,
    #[serde(default)]
    pub routing_keys: Vec<String>,
    #[serde(default)]
    pub priority: u32,
}

impl DidCommService {
    /// URI scheme of the endpoint (`http`, `ws`, `didcomm`, ...).
    pub fn scheme(&self) -> &str {
        self.service_endpoint
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .unwrap_or(self.service_endpoint.as_str())
    }

    /// True for the store-and-forward queue placeholder.
    pub fn is_queue(&self) -> bool {
        self.service_endpoint == DID_COMM_TRANSPORT_QUEUE
    }

    /// The `~service` decorator advertising this service on a connection-less message.
    pub fn to_decorator(&self) -> ServiceDecorator {
        ServiceDecorator {
            recipient_keys: self.recipient_keys.clone(),
            routing_keys: self.routing_keys.clone(),
            service_endpoint: self.service_endpoint.clone(),
        }
    }

    /// Builds a service from a `~service` decorator.
    pub fn from_decorator(id: impl Into<String>, decorator: &ServiceDecorator) -> Self {
        Self {
            id: id.into(),
            service_endpoint: decorator.service_endpoint.clone(),
            recipient_keys: decorator.recipient_keys.clone(),
            routing_keys: decorator.routing_keys.clone(),
            priority: 0,
        }
    }
}

/// A minimal DID document: the DID plus its DIDComm services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDoc {
    pub id: String,
    #[serde(default, rename = "service")]
    pub services: Vec<DidCommService>,
}

impl DidDoc {
    /// Builds a document with one service per endpoint, or the queue placeholder
    /// when no endpoint is reachable.
    pub fn for_endpoints(
        did: &str,
        verkey: &str,
        endpoints: &[String],
        routing_keys: &[String],
    ) -> Self {
        let endpoints: Vec<String> = if endpoints.is_empty() {
            vec![DID_COMM_TRANSPORT_QUEUE.to_string()]
        } else {
            endpoints.to_vec()
        };
        let services = endpoints
            .into_iter()
            .enumerate()
            .map(|(i, endpoint)| DidCommService {
                id: format!("{did}#did-communication-{i}"),
                service_endpoint: endpoint,
                recipient_keys: vec![verkey.to_string()],
                routing_keys: routing_keys.to_vec(),
                priority: i as u32,
            })
            .collect();
        Self {
            id: did.to_string(),
            services,
        }
    }

    /// DIDComm services ordered by their advertised priority.
    pub fn did_comm_services(&self) -> Vec<DidCommService> {
        let mut services = self.services.clone();
        services.sort_by_key(|s| s.priority);
        services
    }

    /// Every recipient key advertised by the document.
    pub fn recipient_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for service in &self.services {
            for key in &service.recipient_keys {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_prefix_before_colon() {
        let service = DidCommService {
            id: "s".into(),
            service_endpoint: "wss://agent.example/ws".into(),
            recipient_keys: vec![],
            routing_keys: vec![],
            priority: 0,
        };
        assert_eq!(service.scheme(), "wss");
    }

    #[test]
    fn empty_endpoints_yield_queue_placeholder() {
        let doc = DidDoc::for_endpoints("did:peer:1", "key-1", &[], &[]);
        assert_eq!(doc.services.len(), 1);
        assert!(doc.services[0].is_queue());
        assert_eq!(doc.services[0].scheme(), "didcomm");
    }

    #[test]
    fn services_sort_by_priority() {
        let mut doc = DidDoc::for_endpoints(
            "did:peer:1",
            "key-1",
            &["http://a".into(), "ws://b".into()],
            &[],
        );
        doc.services[0].priority = 5;
        let sorted = doc.did_comm_services();
        assert_eq!(sorted[0].service_endpoint, "ws://b");
        assert_eq!(doc.recipient_keys(), vec!["key-1".to_string()]);
    }
}
