// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live transport sessions and peer service discovery.
//!
//! Sessions are in-memory only: they exist while the inbound transport
//! connection is open and vanish on restart, after which replies fall back to
//! the peer's advertised services.

use dashmap::DashMap;
use parley_core::{DidCommService, DidDoc, DidResolver, ParleyError, TransportSession};
use tracing::{debug, warn};

use crate::connections::{ConnectionRecord, ConnectionRole};
use crate::oob::{OutOfBandRecord, ServiceEntry};

#[derive(Debug, Default)]
pub struct TransportService {
    sessions: DashMap<String, TransportSession>,
}

impl TransportService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_session(&self, session: TransportSession) {
        debug!(session_id = %session.id, connection_id = ?session.connection_id, "session saved");
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn find_session_by_id(&self, id: &str) -> Option<TransportSession> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn find_session_by_connection_id(&self, connection_id: &str) -> Option<TransportSession> {
        self.sessions
            .iter()
            .find(|s| s.connection_id.as_deref() == Some(connection_id))
            .map(|s| s.value().clone())
    }

    pub fn find_session_by_out_of_band_id(&self, out_of_band_id: &str) -> Option<TransportSession> {
        self.sessions
            .iter()
            .find(|s| s.out_of_band_id.as_deref() == Some(out_of_band_id))
            .map(|s| s.value().clone())
    }

    pub fn remove_session(&self, id: &str) -> Option<TransportSession> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    /// Drains every session, for shutdown.
    pub fn take_sessions(&self) -> Vec<TransportSession> {
        let ids: Vec<String> = self.sessions.iter().map(|s| s.key().clone()).collect();
        ids.iter().filter_map(|id| self.remove_session(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// True when the document advertises an endpoint other than the queue placeholder.
    pub fn has_inbound_endpoint(did_doc: &DidDoc) -> bool {
        did_doc.services.iter().any(|s| !s.is_queue())
    }

    /// Candidate services for reaching the peer of `connection`, from the first
    /// source that has any: their DID document, the legacy invitation we
    /// accepted, then the out-of-band invitation.
    pub async fn find_did_comm_services(
        connection: &ConnectionRecord,
        out_of_band: Option<&OutOfBandRecord>,
        resolver: Option<&dyn DidResolver>,
    ) -> Result<Vec<DidCommService>, ParleyError> {
        if let Some(doc) = &connection.their_did_doc {
            return Ok(doc.did_comm_services());
        }

        if connection.role == ConnectionRole::Invitee
            && let Some(invitation) = &connection.invitation
        {
            return Ok(vec![DidCommService {
                id: format!("{}-invitation", connection.id),
                service_endpoint: invitation.service_endpoint.clone(),
                recipient_keys: invitation.recipient_keys.clone(),
                routing_keys: invitation.routing_keys.clone(),
                priority: 0,
            }]);
        }

        let Some(out_of_band) = out_of_band else {
            return Ok(Vec::new());
        };
        let mut services = Vec::new();
        for service in &out_of_band.invitation.services {
            match service {
                ServiceEntry::Inline(inline) => services.push(inline.clone()),
                ServiceEntry::Did(did) => match resolver {
                    Some(resolver) => services.extend(resolver.resolve(did).await?.did_comm_services()),
                    None => warn!(did = %did, "no DID resolver configured; skipping service"),
                },
            }
        }
        Ok(services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use parley_core::{DID_COMM_TRANSPORT_QUEUE, SessionSink};

    use crate::connections::{ConnectionInvitation, ConnectionState, HandshakeProtocol};
    use crate::oob::{OutOfBandInvitation, OutOfBandRole, OutOfBandState};

    struct NullSink;

    #[async_trait]
    impl SessionSink for NullSink {
        async fn send(&self, _payload: Vec<u8>) -> Result<(), ParleyError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), ParleyError> {
            Ok(())
        }
    }

    struct OneDocResolver(DidDoc);

    #[async_trait]
    impl DidResolver for OneDocResolver {
        async fn resolve(&self, did: &str) -> Result<DidDoc, ParleyError> {
            if did == self.0.id {
                Ok(self.0.clone())
            } else {
                Err(ParleyError::Internal(format!("unknown DID {did}")))
            }
        }
    }

    fn connection(role: ConnectionRole) -> ConnectionRecord {
        let now = Utc::now();
        ConnectionRecord {
            id: "conn-1".into(),
            state: ConnectionState::Requested,
            role,
            protocol: HandshakeProtocol::Connections,
            did: "did:peer:me".into(),
            verkey: "my-key".into(),
            did_doc: DidDoc::for_endpoints("did:peer:me", "my-key", &[], &[]),
            their_did: None,
            their_key: None,
            their_did_doc: None,
            their_label: None,
            invitation: None,
            invitation_did: None,
            out_of_band_id: None,
            thread_id: None,
            auto_accept: true,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sessions_are_found_by_every_key_and_removed() {
        let registry = TransportService::new();
        let mut session = TransportSession::new("ws", Arc::new(NullSink));
        session.connection_id = Some("conn-1".into());
        session.out_of_band_id = Some("oob-1".into());
        let id = session.id.clone();
        registry.save_session(session);

        assert!(registry.find_session_by_id(&id).is_some());
        assert!(registry.find_session_by_connection_id("conn-1").is_some());
        assert!(registry.find_session_by_out_of_band_id("oob-1").is_some());
        assert!(registry.find_session_by_connection_id("conn-2").is_none());

        registry.remove_session(&id);
        assert!(registry.is_empty());
    }

    #[test]
    fn queue_only_document_has_no_inbound_endpoint() {
        let queue_only = DidDoc::for_endpoints("did:peer:x", "k", &[], &[]);
        assert_eq!(queue_only.services[0].service_endpoint, DID_COMM_TRANSPORT_QUEUE);
        assert!(!TransportService::has_inbound_endpoint(&queue_only));

        let reachable = DidDoc::for_endpoints("did:peer:x", "k", &["ws://x".into()], &[]);
        assert!(TransportService::has_inbound_endpoint(&reachable));
    }

    #[tokio::test]
    async fn their_document_wins_over_invitation() {
        let mut conn = connection(ConnectionRole::Invitee);
        conn.invitation = Some(ConnectionInvitation {
            label: "Faber".into(),
            recipient_keys: vec!["inv-key".into()],
            service_endpoint: "http://invitation".into(),
            routing_keys: vec![],
        });

        let services = TransportService::find_did_comm_services(&conn, None, None).await.unwrap();
        assert_eq!(services[0].id, "conn-1-invitation");
        assert_eq!(services[0].recipient_keys, vec!["inv-key".to_string()]);

        conn.their_did_doc = Some(DidDoc::for_endpoints(
            "did:peer:faber",
            "faber-key",
            &["ws://faber".into()],
            &[],
        ));
        let services = TransportService::find_did_comm_services(&conn, None, None).await.unwrap();
        assert_eq!(services[0].service_endpoint, "ws://faber");
    }

    #[tokio::test]
    async fn out_of_band_dids_are_resolved() {
        let conn = connection(ConnectionRole::Invitee);
        let doc = DidDoc::for_endpoints("did:sov:faber", "faber-key", &["http://faber".into()], &[]);
        let now = Utc::now();
        let oob = OutOfBandRecord {
            id: "oob-1".into(),
            state: OutOfBandState::PrepareResponse,
            role: OutOfBandRole::Receiver,
            invitation: OutOfBandInvitation {
                id: "inv-1".into(),
                label: "Faber".into(),
                goal_code: None,
                handshake_protocols: vec![],
                services: vec![ServiceEntry::Did("did:sov:faber".into())],
                requests_attach: vec![],
            },
            reusable: false,
            auto_accept_connection: true,
            reuse_connection_id: None,
            our_did: None,
            our_verkey: None,
            our_did_doc: None,
            created_at: now,
            updated_at: now,
        };
        let resolver = OneDocResolver(doc.clone());
        let services =
            TransportService::find_did_comm_services(&conn, Some(&oob), Some(&resolver))
                .await
                .unwrap();
        assert_eq!(services, doc.did_comm_services());
    }
}
