// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery: session, prioritized services, then the store-and-forward queue.
//!
//! Delivery to a connection tries, in order:
//! 1. the open transport session the peer asked us to reply on;
//! 2. each resolved service in transport-priority order, using the first
//!    registered transport that supports the service's scheme;
//! 3. the queue, when the peer advertised the queue placeholder.
//!
//! Send failures move on to the next candidate. Only when every candidate is
//! exhausted and no queue exists does the caller see `Undeliverable`.

use std::sync::Arc;

use parley_bus::{EventBus, EventKind};
use parley_config::model::TransportConfig;
use parley_core::{
    AgentMessage, DidCommService, DidResolver, EnvelopeKeys, EnvelopeService, OutboundPackage,
    OutboundTransport, ParleyError, ReturnRoute, StorageAdapter,
};
use tracing::{debug, error, warn};

use crate::connections::ConnectionRecord;
use crate::oob::OutOfBandRecord;
use crate::repository::Repository;
use crate::transport_service::TransportService;

/// How a message left the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Session { session_id: String },
    Transport { endpoint: String },
    /// Parked for the peer to pick up.
    Queued,
}

/// Candidate services for one peer, after priority ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedServices {
    pub services: Vec<DidCommService>,
    pub queue_service: Option<DidCommService>,
}

/// Splits off the queue placeholder, drops unlisted schemes when restrictive,
/// and stable-sorts the rest by scheme priority with unlisted schemes last.
pub fn prioritize_services(
    services: Vec<DidCommService>,
    priority: &TransportConfig,
) -> ResolvedServices {
    let (queue, mut reachable): (Vec<_>, Vec<_>) =
        services.into_iter().partition(DidCommService::is_queue);

    let rank = |service: &DidCommService| {
        priority
            .priority
            .iter()
            .position(|scheme| scheme == service.scheme())
    };
    if priority.restrictive {
        reachable.retain(|s| rank(s).is_some());
    }
    reachable.sort_by_key(|s| rank(s).unwrap_or(usize::MAX));

    ResolvedServices {
        services: reachable,
        queue_service: queue.into_iter().next(),
    }
}

pub struct MessageSender {
    envelope: Arc<dyn EnvelopeService>,
    storage: Arc<dyn StorageAdapter>,
    transport_service: Arc<TransportService>,
    out_of_band: Repository<OutOfBandRecord>,
    resolver: Option<Arc<dyn DidResolver>>,
    transports: Vec<Arc<dyn OutboundTransport>>,
    priority: TransportConfig,
    bus: EventBus,
}

impl MessageSender {
    pub fn new(
        envelope: Arc<dyn EnvelopeService>,
        storage: Arc<dyn StorageAdapter>,
        transport_service: Arc<TransportService>,
        resolver: Option<Arc<dyn DidResolver>>,
        priority: TransportConfig,
        bus: EventBus,
    ) -> Self {
        let out_of_band = Repository::new(Arc::clone(&storage), bus.clone());
        Self {
            envelope,
            storage,
            transport_service,
            out_of_band,
            resolver,
            transports: Vec::new(),
            priority,
            bus,
        }
    }

    pub fn register_outbound_transport(&mut self, transport: Arc<dyn OutboundTransport>) {
        debug!(transport = transport.name(), schemes = ?transport.supported_schemes(), "outbound transport registered");
        self.transports.push(transport);
    }

    pub fn outbound_transports(&self) -> &[Arc<dyn OutboundTransport>] {
        &self.transports
    }

    pub async fn pack_message(
        &self,
        message: &AgentMessage,
        keys: &EnvelopeKeys,
    ) -> Result<Vec<u8>, ParleyError> {
        self.envelope.pack(message, keys).await
    }

    /// Services of the peer on `connection`, ordered by transport priority.
    pub async fn resolve_services(
        &self,
        connection: &ConnectionRecord,
    ) -> Result<ResolvedServices, ParleyError> {
        let out_of_band = match &connection.out_of_band_id {
            Some(id) => self.out_of_band.find_by_id(id).await?,
            None => None,
        };
        let services = TransportService::find_did_comm_services(
            connection,
            out_of_band.as_ref(),
            self.resolver.as_deref(),
        )
        .await?;
        Ok(prioritize_services(services, &self.priority))
    }

    pub async fn send_to_connection(
        &self,
        message: &AgentMessage,
        connection: &ConnectionRecord,
    ) -> Result<Delivery, ParleyError> {
        let mut message = message.clone();

        if let Some(delivery) = self.try_session(&message, connection).await {
            return Ok(delivery);
        }

        // Without a reachable endpoint of our own, the peer can only answer on this connection.
        if !TransportService::has_inbound_endpoint(&connection.did_doc)
            && !message.has_return_routing()
        {
            message.set_return_routing(ReturnRoute::All);
        }

        let resolved = self.resolve_services(connection).await?;
        for service in &resolved.services {
            match self
                .send_via_service(&message, service, &connection.verkey, Some(&connection.id))
                .await
            {
                Ok(delivery) => return Ok(delivery),
                Err(e) => {
                    warn!(
                        connection_id = %connection.id,
                        endpoint = %service.service_endpoint,
                        error = %e,
                        "delivery to service failed, trying next"
                    );
                }
            }
        }

        if let Some(queue) = &resolved.queue_service {
            let keys = EnvelopeKeys {
                recipient_keys: queue.recipient_keys.clone(),
                routing_keys: queue.routing_keys.clone(),
                sender_key: Some(connection.verkey.clone()),
            };
            let packed = self.pack_message(&message, &keys).await?;
            self.storage.enqueue_message(&connection.id, &packed).await?;
            debug!(connection_id = %connection.id, message_type = %message.message_type, "message queued");
            self.bus.publish(EventKind::MessageQueued {
                connection_id: connection.id.clone(),
                message_type: message.message_type.clone(),
            });
            return Ok(Delivery::Queued);
        }

        error!(
            connection_id = %connection.id,
            message_type = %message.message_type,
            "message is undeliverable"
        );
        Err(ParleyError::Undeliverable {
            connection_id: connection.id.clone(),
            message_type: message.message_type.clone(),
        })
    }

    /// Sends a connection-less message to a single service.
    ///
    /// `sender_key` is required: an anonymous send has no way to be answered.
    pub async fn send_to_service(
        &self,
        message: &AgentMessage,
        service: &DidCommService,
        sender_key: Option<&str>,
    ) -> Result<Delivery, ParleyError> {
        let sender_key = sender_key.ok_or_else(|| {
            ParleyError::Internal(format!(
                "no sender key to send {} to service {}",
                message.message_type, service.id
            ))
        })?;
        self.send_via_service(message, service, sender_key, None).await
    }

    /// Replies on a specific inbound session.
    pub async fn send_to_session(
        &self,
        message: &AgentMessage,
        session_id: &str,
    ) -> Result<Delivery, ParleyError> {
        let session = self
            .transport_service
            .find_session_by_id(session_id)
            .ok_or_else(|| ParleyError::transport(format!("session {session_id} is closed")))?;
        let keys = session.keys.clone().ok_or_else(|| {
            ParleyError::transport(format!("session {session_id} has no reply keys"))
        })?;
        let packed = self.pack_message(message, &keys).await?;
        session.send(packed).await?;
        Ok(Delivery::Session {
            session_id: session.id,
        })
    }

    /// Delivers a payload packed by someone else, as a mediator does with a
    /// forwarded message. A return-routed session for the connection is used
    /// when one is open; otherwise the payload waits in the queue.
    pub async fn send_package(
        &self,
        connection_id: &str,
        payload: Vec<u8>,
        message_type: &str,
    ) -> Result<Delivery, ParleyError> {
        if let Some(session) = self.transport_service.find_session_by_connection_id(connection_id)
            && session
                .inbound_message
                .as_ref()
                .is_some_and(AgentMessage::has_return_routing)
        {
            match session.send(payload.clone()).await {
                Ok(()) => {
                    self.bus.publish(EventKind::MessageSent {
                        connection_id: Some(connection_id.to_string()),
                        message_type: message_type.to_string(),
                        endpoint: format!("session:{}", session.id),
                    });
                    return Ok(Delivery::Session {
                        session_id: session.id,
                    });
                }
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "session send failed, queueing package");
                    self.transport_service.remove_session(&session.id);
                }
            }
        }

        self.storage.enqueue_message(connection_id, &payload).await?;
        debug!(connection_id, message_type, "package queued");
        self.bus.publish(EventKind::MessageQueued {
            connection_id: connection_id.to_string(),
            message_type: message_type.to_string(),
        });
        Ok(Delivery::Queued)
    }

    async fn try_session(
        &self,
        message: &AgentMessage,
        connection: &ConnectionRecord,
    ) -> Option<Delivery> {
        let session = self.transport_service.find_session_by_connection_id(&connection.id)?;
        let return_routed = session
            .inbound_message
            .as_ref()
            .is_some_and(|inbound| inbound.has_return_routing_for_thread(message.thread_id()));
        if !return_routed {
            return None;
        }
        let Some(keys) = session.keys.clone() else {
            debug!(session_id = %session.id, "session has no reply keys");
            return None;
        };

        let result = async {
            let packed = self.pack_message(message, &keys).await?;
            session.send(packed).await
        }
        .await;
        match result {
            Ok(()) => {
                debug!(session_id = %session.id, connection_id = %connection.id, "sent over session");
                self.bus.publish(EventKind::MessageSent {
                    connection_id: Some(connection.id.clone()),
                    message_type: message.message_type.clone(),
                    endpoint: format!("session:{}", session.id),
                });
                Some(Delivery::Session {
                    session_id: session.id,
                })
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "session send failed, falling back to services");
                self.transport_service.remove_session(&session.id);
                None
            }
        }
    }

    async fn send_via_service(
        &self,
        message: &AgentMessage,
        service: &DidCommService,
        sender_key: &str,
        connection_id: Option<&str>,
    ) -> Result<Delivery, ParleyError> {
        let scheme = service.scheme();
        let transport = self
            .transports
            .iter()
            .find(|t| t.supported_schemes().iter().any(|s| s == scheme))
            .ok_or_else(|| {
                ParleyError::transport(format!("no outbound transport supports scheme `{scheme}`"))
            })?;

        let keys = EnvelopeKeys {
            recipient_keys: service.recipient_keys.clone(),
            routing_keys: service.routing_keys.clone(),
            sender_key: Some(sender_key.to_string()),
        };
        let payload = self.pack_message(message, &keys).await?;
        transport
            .send_message(OutboundPackage {
                payload,
                endpoint: service.service_endpoint.clone(),
                response_requested: message.has_return_routing(),
                connection_id: connection_id.map(str::to_string),
            })
            .await?;

        debug!(
            endpoint = %service.service_endpoint,
            transport = transport.name(),
            message_type = %message.message_type,
            "message sent"
        );
        self.bus.publish(EventKind::MessageSent {
            connection_id: connection_id.map(str::to_string),
            message_type: message.message_type.clone(),
            endpoint: service.service_endpoint.clone(),
        });
        Ok(Delivery::Transport {
            endpoint: service.service_endpoint.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(id: &str, endpoint: &str) -> DidCommService {
        DidCommService {
            id: id.into(),
            service_endpoint: endpoint.into(),
            recipient_keys: vec!["k".into()],
            routing_keys: vec![],
            priority: 0,
        }
    }

    fn priority(schemes: &[&str], restrictive: bool) -> TransportConfig {
        TransportConfig {
            priority: schemes.iter().map(|s| s.to_string()).collect(),
            restrictive,
        }
    }

    #[test]
    fn listed_schemes_come_first_in_stable_order() {
        let services = vec![
            service("http-1", "http://a"),
            service("ws-1", "ws://b"),
            service("ws-2", "ws://c"),
        ];
        let resolved = prioritize_services(services, &priority(&["ws", "http"], false));
        let ids: Vec<&str> = resolved.services.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["ws-1", "ws-2", "http-1"]);
        assert!(resolved.queue_service.is_none());
    }

    #[test]
    fn unlisted_schemes_sort_last_or_are_dropped_when_restrictive() {
        let services = vec![
            service("udp", "udp://a"),
            service("http", "http://b"),
            service("tcp", "tcp://c"),
        ];
        let lenient = prioritize_services(services.clone(), &priority(&["http"], false));
        let ids: Vec<&str> = lenient.services.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["http", "udp", "tcp"]);

        let strict = prioritize_services(services, &priority(&["http"], true));
        assert_eq!(strict.services.len(), 1);
    }

    #[test]
    fn queue_placeholder_is_partitioned_out() {
        let services = vec![
            service("queue", parley_core::DID_COMM_TRANSPORT_QUEUE),
            service("http", "http://b"),
        ];
        let resolved = prioritize_services(services, &priority(&[], true));
        assert!(resolved.services.is_empty());
        assert_eq!(resolved.queue_service.map(|s| s.id), Some("queue".to_string()));
    }
}
