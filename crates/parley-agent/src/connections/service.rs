// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection handshake state machine for connections 1.0 and DID exchange 1.0.
//!
//! ```text
//! invitee: Invited -> Requested -> Responded -> Complete
//! inviter: Invited -> Requested -> Responded -> Complete
//! any non-terminal -> Abandoned (problem report)
//! ```
//!
//! The inviter's `Responded -> Complete` step is driven by whatever the invitee
//! sends first over the new connection: a trust ping, an ack, or a DID exchange
//! `complete`.

use std::sync::Arc;

use chrono::Utc;
use parley_bus::EventBus;
use parley_config::model::AgentConfig;
use parley_core::{AgentMessage, MessageRole, ParleyError, StorageAdapter, TagQuery};
use strum::IntoEnumIterator;
use tracing::{debug, info};

use super::messages::{
    ConnectionInvitation, ConnectionMessageKind, TrustPingBody, handshake_message, peer_did_doc,
};
use super::record::{ConnectionRecord, ConnectionRole, ConnectionState, HandshakeProtocol};
use crate::context::InboundMessageContext;
use crate::locks::ExchangeLocks;
use crate::message_repository::DidCommMessageRepository;
use crate::notification::ProblemReportBody;
use crate::oob::{OutOfBandRecord, OutOfBandRole, OutOfBandState};
use crate::record::{ExchangeRecord, assert_not_terminal, assert_state};
use crate::repository::Repository;
use crate::routing::Routing;

const RECORD_TYPE: &str = ConnectionRecord::RECORD_TYPE;

pub struct ConnectionService {
    connections: Repository<ConnectionRecord>,
    out_of_band: Repository<OutOfBandRecord>,
    messages: DidCommMessageRepository,
    locks: ExchangeLocks,
    config: AgentConfig,
}

impl ConnectionService {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        bus: EventBus,
        locks: ExchangeLocks,
        config: AgentConfig,
    ) -> Self {
        Self {
            connections: Repository::new(Arc::clone(&storage), bus.clone()),
            out_of_band: Repository::new(Arc::clone(&storage), bus),
            messages: DidCommMessageRepository::new(storage),
            locks,
            config,
        }
    }

    pub fn repository(&self) -> &Repository<ConnectionRecord> {
        &self.connections
    }

    /// Creates a legacy connections 1.0 invitation and the inviter's record.
    pub async fn create_invitation(
        &self,
        routing: &Routing,
        auto_accept: Option<bool>,
    ) -> Result<(ConnectionRecord, ConnectionInvitation), ParleyError> {
        let invitation = ConnectionInvitation {
            label: self.config.label.clone(),
            recipient_keys: vec![routing.verkey.clone()],
            service_endpoint: routing.primary_endpoint(),
            routing_keys: routing.routing_keys.clone(),
        };
        let mut record = self.new_record(ConnectionRole::Inviter, HandshakeProtocol::Connections, routing, auto_accept);
        record.invitation = Some(invitation.clone());
        self.connections.save(&record).await?;
        info!(connection_id = %record.id, "connection invitation created");
        Ok((record, invitation))
    }

    /// Stores a received legacy invitation as the invitee's record.
    pub async fn process_invitation(
        &self,
        invitation: ConnectionInvitation,
        routing: &Routing,
        auto_accept: Option<bool>,
    ) -> Result<ConnectionRecord, ParleyError> {
        let mut record = self.new_record(ConnectionRole::Invitee, HandshakeProtocol::Connections, routing, auto_accept);
        record.their_label = Some(invitation.label.clone());
        record.invitation = Some(invitation);
        self.connections.save(&record).await?;
        debug!(connection_id = %record.id, "connection invitation received");
        Ok(record)
    }

    /// Creates the invitee's record for a handshake started by an out-of-band invitation.
    pub async fn process_out_of_band_invitation(
        &self,
        out_of_band: &OutOfBandRecord,
        protocol: HandshakeProtocol,
        routing: &Routing,
        auto_accept: Option<bool>,
    ) -> Result<ConnectionRecord, ParleyError> {
        let mut record = self.new_record(ConnectionRole::Invitee, protocol, routing, auto_accept);
        record.their_label = Some(out_of_band.invitation.label.clone());
        record.out_of_band_id = Some(out_of_band.id.clone());
        record.invitation_did = out_of_band.invitation.dids().first().map(|d| d.to_string());
        self.connections.save(&record).await?;
        debug!(connection_id = %record.id, out_of_band_id = %out_of_band.id, "out-of-band connection created");
        Ok(record)
    }

    /// Invitee: `Invited -> Requested`.
    pub async fn create_request(
        &self,
        connection_id: &str,
    ) -> Result<(AgentMessage, ConnectionRecord), ParleyError> {
        let _guard = self.locks.lock(RECORD_TYPE, connection_id, None).await;
        let mut record = self.connections.get_by_id(connection_id).await?;
        assert_role(&record, ConnectionRole::Invitee)?;
        assert_state(&record, &[ConnectionState::Invited])?;

        let mut message = handshake_message(
            record.protocol,
            "request",
            Some(&self.config.label),
            &record.did,
            &record.did_doc,
        )?;
        let thread_id = message.id.clone();
        message.set_thread_id(thread_id.clone());
        if let Some(out_of_band_id) = &record.out_of_band_id {
            let out_of_band = self.out_of_band.get_by_id(out_of_band_id).await?;
            message.set_parent_thread_id(out_of_band.invitation.id);
        }

        record.thread_id = Some(thread_id);
        self.connections.update_state(&mut record, ConnectionState::Requested).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Inviter: accepts a request addressed to one of our invitation keys.
    ///
    /// Requests for a legacy invitation advance that invitation's record. Requests
    /// for an out-of-band invitation open a fresh record with the invitation's
    /// identity; a single-use invitation is then marked done.
    pub async fn process_request(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ConnectionRecord, ParleyError> {
        let message_type = ctx.message_type()?;
        let protocol = match ConnectionMessageKind::from_type(&message_type) {
            Some(ConnectionMessageKind::Request(protocol)) => protocol,
            _ => {
                return Err(ParleyError::InvalidMessage(format!(
                    "{} is not a connection request",
                    ctx.message.message_type
                )));
            }
        };
        let recipient_key = ctx.recipient_key.as_deref().ok_or_else(|| {
            ParleyError::InvalidMessage("connection request was not addressed to a key".into())
        })?;
        let _guard = self.locks.lock(RECORD_TYPE, recipient_key, None).await;

        let invited = self
            .connections
            .find_single_by_query(
                &TagQuery::new()
                    .with("invitationKey", recipient_key)
                    .with("role", ConnectionRole::Inviter.to_string())
                    .with("state", ConnectionState::Invited.to_string()),
            )
            .await?;

        let (mut record, is_new) = match invited {
            Some(record) => (record, false),
            None => (self.record_for_out_of_band_request(ctx, protocol, recipient_key).await?, true),
        };

        let (label, their_did, their_doc) = peer_did_doc(protocol, &ctx.message)?;
        record.protocol = protocol;
        record.their_key = their_doc
            .recipient_keys()
            .into_iter()
            .next()
            .or_else(|| ctx.sender_key.clone());
        record.their_did = Some(their_did);
        record.their_did_doc = Some(their_doc);
        record.their_label = label;
        record.thread_id = Some(ctx.thread_id().to_string());

        if is_new {
            record.state = ConnectionState::Requested;
            self.connections.save(&record).await?;
        } else {
            self.connections.update_state(&mut record, ConnectionState::Requested).await?;
        }
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        info!(connection_id = %record.id, thread_id = ctx.thread_id(), "connection request received");
        Ok(record)
    }

    /// Inviter: `Requested -> Responded`.
    pub async fn create_response(
        &self,
        connection_id: &str,
    ) -> Result<(AgentMessage, ConnectionRecord), ParleyError> {
        let _guard = self.locks.lock(RECORD_TYPE, connection_id, None).await;
        let mut record = self.connections.get_by_id(connection_id).await?;
        assert_role(&record, ConnectionRole::Inviter)?;
        assert_state(&record, &[ConnectionState::Requested])?;
        let thread_id = handshake_thread(&record)?;

        let mut message =
            handshake_message(record.protocol, "response", None, &record.did, &record.did_doc)?;
        message.set_thread_id(thread_id);

        self.connections.update_state(&mut record, ConnectionState::Responded).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Invitee: `Requested -> Responded`, learning the inviter's pairwise DID.
    pub async fn process_response(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ConnectionRecord, ParleyError> {
        let found = self
            .connections
            .get_single_by_query(
                &TagQuery::new()
                    .with("threadId", ctx.thread_id())
                    .with("role", ConnectionRole::Invitee.to_string()),
            )
            .await?;
        let _guard = self.locks.lock(RECORD_TYPE, &found.id, None).await;
        let mut record = self.connections.get_by_id(&found.id).await?;
        assert_state(&record, &[ConnectionState::Requested])?;

        if let Some(recipient_key) = &ctx.recipient_key
            && *recipient_key != record.verkey
        {
            return Err(ParleyError::ThreadBinding(format!(
                "connection response for {} was not addressed to our key",
                record.id
            )));
        }

        let (_, their_did, their_doc) = peer_did_doc(record.protocol, &ctx.message)?;
        record.their_key = their_doc
            .recipient_keys()
            .into_iter()
            .next()
            .or_else(|| ctx.sender_key.clone());
        record.their_did = Some(their_did);
        record.their_did_doc = Some(their_doc);

        self.connections.update_state(&mut record, ConnectionState::Responded).await?;
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        info!(connection_id = %record.id, "connection response received");
        Ok(record)
    }

    /// Sends a trust ping; the invitee side moves `Responded -> Complete`.
    pub async fn create_trust_ping(
        &self,
        connection_id: &str,
        response_requested: bool,
    ) -> Result<(AgentMessage, ConnectionRecord), ParleyError> {
        let _guard = self.locks.lock(RECORD_TYPE, connection_id, None).await;
        let mut record = self.connections.get_by_id(connection_id).await?;
        assert_state(&record, &[ConnectionState::Responded, ConnectionState::Complete])?;

        let message = AgentMessage::new(
            &ConnectionMessageKind::Ping.message_type(),
            &TrustPingBody {
                response_requested,
                comment: None,
            },
        )?;
        if record.role == ConnectionRole::Invitee && record.state == ConnectionState::Responded {
            self.connections.update_state(&mut record, ConnectionState::Complete).await?;
        }
        Ok((message, record))
    }

    /// DID exchange invitee: `Responded -> Complete`, with the `complete` message.
    pub async fn create_complete(
        &self,
        connection_id: &str,
    ) -> Result<(AgentMessage, ConnectionRecord), ParleyError> {
        let _guard = self.locks.lock(RECORD_TYPE, connection_id, None).await;
        let mut record = self.connections.get_by_id(connection_id).await?;
        assert_role(&record, ConnectionRole::Invitee)?;
        assert_state(&record, &[ConnectionState::Responded])?;

        let mut message = AgentMessage::new(
            &ConnectionMessageKind::Complete.message_type(),
            &serde_json::json!({}),
        )?;
        message.set_thread_id(handshake_thread(&record)?);
        if let Some(out_of_band_id) = &record.out_of_band_id {
            let out_of_band = self.out_of_band.get_by_id(out_of_band_id).await?;
            message.set_parent_thread_id(out_of_band.invitation.id);
        }

        self.connections.update_state(&mut record, ConnectionState::Complete).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Handles a trust ping, ack or `complete` on a connection.
    ///
    /// The inviter completes its side the first time the invitee talks over the
    /// new connection. Anything else leaves the record as it is.
    pub async fn process_ack(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ConnectionRecord, ParleyError> {
        let connection = match &ctx.connection {
            Some(connection) => connection.clone(),
            None => {
                self.connections
                    .get_single_by_query(
                        &TagQuery::new()
                            .with("threadId", ctx.thread_id())
                            .with("role", ConnectionRole::Inviter.to_string()),
                    )
                    .await?
            }
        };
        let _guard = self.locks.lock(RECORD_TYPE, &connection.id, None).await;
        let mut record = self.connections.get_by_id(&connection.id).await?;
        assert_state(&record, &[ConnectionState::Responded, ConnectionState::Complete])?;

        if record.role == ConnectionRole::Inviter && record.state == ConnectionState::Responded {
            self.connections.update_state(&mut record, ConnectionState::Complete).await?;
            info!(connection_id = %record.id, "connection complete");
        }
        Ok(record)
    }

    /// Any non-terminal handshake moves to `Abandoned`.
    pub async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ConnectionRecord, ParleyError> {
        let found = match &ctx.connection {
            Some(connection) => connection.clone(),
            None => {
                self.connections
                    .get_single_by_query(&TagQuery::new().with("threadId", ctx.thread_id()))
                    .await?
            }
        };
        let _guard = self.locks.lock(RECORD_TYPE, &found.id, None).await;
        let mut record = self.connections.get_by_id(&found.id).await?;
        assert_not_terminal(&record, &ConnectionState::iter().collect::<Vec<_>>())?;

        let report: ProblemReportBody = ctx.message.body()?;
        record.error_message = Some(report.error_message());
        self.connections.update_state(&mut record, ConnectionState::Abandoned).await?;
        Ok(record)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<ConnectionRecord, ParleyError> {
        self.connections.get_by_id(id).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<ConnectionRecord>, ParleyError> {
        self.connections.find_by_id(id).await
    }

    pub async fn get_all(&self) -> Result<Vec<ConnectionRecord>, ParleyError> {
        self.connections.get_all().await
    }

    /// The connection whose own key received the message and whose peer key sent it.
    pub async fn find_by_keys(
        &self,
        sender_key: &str,
        recipient_key: &str,
    ) -> Result<Option<ConnectionRecord>, ParleyError> {
        self.connections
            .find_single_by_query(
                &TagQuery::new()
                    .with("verkey", recipient_key)
                    .with("theirKey", sender_key),
            )
            .await
    }

    pub async fn find_by_verkey(&self, verkey: &str) -> Result<Option<ConnectionRecord>, ParleyError> {
        self.connections
            .find_single_by_query(&TagQuery::new().with("verkey", verkey))
            .await
    }

    pub async fn find_by_their_key(
        &self,
        their_key: &str,
    ) -> Result<Option<ConnectionRecord>, ParleyError> {
        self.connections
            .find_single_by_query(&TagQuery::new().with("theirKey", their_key))
            .await
    }

    pub async fn find_by_out_of_band_id(
        &self,
        out_of_band_id: &str,
    ) -> Result<Vec<ConnectionRecord>, ParleyError> {
        self.connections
            .find_by_query(&TagQuery::new().with("outOfBandId", out_of_band_id))
            .await
    }

    /// Connections opened from invitations published under `did`, for reuse.
    pub async fn find_by_invitation_did(
        &self,
        did: &str,
    ) -> Result<Vec<ConnectionRecord>, ParleyError> {
        self.connections
            .find_by_query(&TagQuery::new().with("invitationDid", did))
            .await
    }

    fn new_record(
        &self,
        role: ConnectionRole,
        protocol: HandshakeProtocol,
        routing: &Routing,
        auto_accept: Option<bool>,
    ) -> ConnectionRecord {
        let now = Utc::now();
        ConnectionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            state: ConnectionState::Invited,
            role,
            protocol,
            did: routing.did.clone(),
            verkey: routing.verkey.clone(),
            did_doc: routing.did_doc(),
            their_did: None,
            their_key: None,
            their_did_doc: None,
            their_label: None,
            invitation: None,
            invitation_did: None,
            out_of_band_id: None,
            thread_id: None,
            auto_accept: auto_accept.unwrap_or(self.config.auto_accept_connections),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn record_for_out_of_band_request(
        &self,
        ctx: &InboundMessageContext,
        protocol: HandshakeProtocol,
        recipient_key: &str,
    ) -> Result<ConnectionRecord, ParleyError> {
        let not_found = || ParleyError::RecordNotFound {
            record_type: RECORD_TYPE.to_string(),
            query: format!("invitationKey={recipient_key}"),
        };
        let mut out_of_band = self
            .out_of_band
            .find_single_by_query(
                &TagQuery::new()
                    .with("recipientKey", recipient_key)
                    .with("role", OutOfBandRole::Sender.to_string()),
            )
            .await?
            .ok_or_else(not_found)?;
        assert_state(&out_of_band, &[OutOfBandState::AwaitResponse])?;

        if let Some(parent) = ctx.message.parent_thread_id()
            && parent != out_of_band.invitation.id
        {
            return Err(ParleyError::ThreadBinding(format!(
                "request names invitation {parent}, key belongs to {}",
                out_of_band.invitation.id
            )));
        }
        let offered = &out_of_band.invitation.handshake_protocols;
        if !offered.is_empty()
            && !offered
                .iter()
                .any(|uri| HandshakeProtocol::from_protocol_uri(uri) == Some(protocol))
        {
            return Err(ParleyError::InvalidMessage(format!(
                "invitation {} does not offer {}",
                out_of_band.invitation.id,
                protocol.protocol_uri()
            )));
        }

        let (Some(did), Some(verkey), Some(did_doc)) = (
            out_of_band.our_did.clone(),
            out_of_band.our_verkey.clone(),
            out_of_band.our_did_doc.clone(),
        ) else {
            return Err(ParleyError::Internal(format!(
                "out-of-band record {} has no identity",
                out_of_band.id
            )));
        };
        let now = Utc::now();
        let record = ConnectionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            state: ConnectionState::Invited,
            role: ConnectionRole::Inviter,
            protocol,
            did,
            verkey,
            did_doc,
            their_did: None,
            their_key: None,
            their_did_doc: None,
            their_label: None,
            invitation: None,
            invitation_did: None,
            out_of_band_id: Some(out_of_band.id.clone()),
            thread_id: None,
            auto_accept: out_of_band.auto_accept_connection,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        if !out_of_band.reusable {
            self.out_of_band
                .update_state(&mut out_of_band, OutOfBandState::Done)
                .await?;
        }
        Ok(record)
    }
}

fn assert_role(record: &ConnectionRecord, role: ConnectionRole) -> Result<(), ParleyError> {
    crate::record::assert_role(record, record.role, role)
}

fn handshake_thread(record: &ConnectionRecord) -> Result<String, ParleyError> {
    record.thread_id.clone().ok_or_else(|| {
        ParleyError::Internal(format!("connection {} has no handshake thread", record.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::model::StorageConfig;
    use parley_storage::SqliteStorage;
    use tempfile::TempDir;

    async fn service() -> (ConnectionService, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("conn.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        let service = ConnectionService::new(
            Arc::new(storage),
            EventBus::default(),
            ExchangeLocks::new(),
            AgentConfig::default(),
        );
        (service, dir)
    }

    fn routing(name: &str) -> Routing {
        Routing {
            did: format!("did:peer:{name}"),
            verkey: format!("{name}-key"),
            endpoints: vec![format!("http://{name}")],
            routing_keys: vec![],
            mediator_id: None,
        }
    }

    fn inbound(message: AgentMessage, sender: &str, recipient: &str) -> InboundMessageContext {
        InboundMessageContext::new(message).with_keys(Some(sender.into()), Some(recipient.into()))
    }

    #[tokio::test]
    async fn legacy_handshake_reaches_complete_on_both_sides() {
        let (faber, _d1) = service().await;
        let (alice, _d2) = service().await;

        let (inviter, invitation) = faber.create_invitation(&routing("faber"), None).await.unwrap();
        let invitee = alice.process_invitation(invitation, &routing("alice"), None).await.unwrap();
        assert_eq!(invitee.state, ConnectionState::Invited);

        let (request, invitee) = alice.create_request(&invitee.id).await.unwrap();
        assert_eq!(invitee.state, ConnectionState::Requested);

        let inviter_requested = faber
            .process_request(&inbound(request, "alice-key", "faber-key"))
            .await
            .unwrap();
        assert_eq!(inviter_requested.id, inviter.id);
        assert_eq!(inviter_requested.their_key.as_deref(), Some("alice-key"));

        let (response, _) = faber.create_response(&inviter.id).await.unwrap();
        let invitee = alice
            .process_response(&inbound(response, "faber-key", "alice-key"))
            .await
            .unwrap();
        assert_eq!(invitee.state, ConnectionState::Responded);
        assert_eq!(invitee.their_did.as_deref(), Some("did:peer:faber"));

        let (ping, invitee) = alice.create_trust_ping(&invitee.id, false).await.unwrap();
        assert_eq!(invitee.state, ConnectionState::Complete);

        let responded = faber.get_by_id(&inviter.id).await.unwrap();
        let ctx = inbound(ping, "alice-key", "faber-key").with_connection(responded);
        let inviter = faber.process_ack(&ctx).await.unwrap();
        assert_eq!(inviter.state, ConnectionState::Complete);

        let found = faber.find_by_keys("alice-key", "faber-key").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(inviter.id));
    }

    #[tokio::test]
    async fn response_cannot_skip_the_request() {
        let (alice, _dir) = service().await;
        let (faber, _d2) = service().await;
        let (_, invitation) = faber.create_invitation(&routing("faber"), None).await.unwrap();
        let invitee = alice.process_invitation(invitation, &routing("alice"), None).await.unwrap();

        let err = faber.create_response(&invitee.id).await.unwrap_err();
        assert!(err.is_not_found());

        let err = alice.create_trust_ping(&invitee.id, false).await.unwrap_err();
        assert!(matches!(err, ParleyError::InvalidState { ref actual, .. } if actual == "invited"));
        assert_eq!(
            alice.get_by_id(&invitee.id).await.unwrap().state,
            ConnectionState::Invited
        );
    }

    #[tokio::test]
    async fn problem_report_abandons_the_handshake() {
        let (alice, _dir) = service().await;
        let (faber, _d2) = service().await;
        let (_, invitation) = faber.create_invitation(&routing("faber"), None).await.unwrap();
        let invitee = alice.process_invitation(invitation, &routing("alice"), None).await.unwrap();
        let (request, _) = alice.create_request(&invitee.id).await.unwrap();

        let report = crate::notification::problem_report_message(
            &ConnectionMessageKind::ProblemReport(HandshakeProtocol::Connections).message_type(),
            request.thread_id(),
            "request_not_accepted",
            "no thanks",
        )
        .unwrap();
        let abandoned = alice.process_problem_report(&InboundMessageContext::new(report)).await.unwrap();
        assert_eq!(abandoned.state, ConnectionState::Abandoned);
        assert_eq!(abandoned.error_message.as_deref(), Some("request_not_accepted: no thanks"));
    }
}
