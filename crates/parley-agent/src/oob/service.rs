// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Out-of-band invitations and handshake reuse.
//!
//! ```text
//! sender:   AwaitResponse -> Done   (single-use, once answered)
//! receiver: PrepareResponse -> Done (connection created or reused)
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_bus::{BusEvent, EventBus, EventKind, WaitError, wait_for_event};
use parley_config::model::AgentConfig;
use parley_core::{
    AgentMessage, Attachment, DidCommService, MessageRole, ParleyError, StorageAdapter, TagQuery,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::messages::{OutOfBandInvitation, OutOfBandMessageKind, ServiceEntry, reuse_message};
use super::record::{OutOfBandRecord, OutOfBandRole, OutOfBandState};
use crate::connections::ConnectionRecord;
use crate::context::InboundMessageContext;
use crate::locks::ExchangeLocks;
use crate::message_repository::DidCommMessageRepository;
use crate::record::{ExchangeRecord, assert_role, assert_state};
use crate::repository::Repository;
use crate::routing::Routing;

const RECORD_TYPE: &str = OutOfBandRecord::RECORD_TYPE;

/// Options for [`OutOfBandService::create_invitation`].
#[derive(Debug, Clone, Default)]
pub struct CreateInvitationOptions {
    /// Defaults to the agent label.
    pub label: Option<String>,
    pub goal_code: Option<String>,
    /// Advertise this public DID instead of an inline service block.
    pub public_did: Option<String>,
    pub reusable: bool,
    pub auto_accept_connection: Option<bool>,
    /// Messages to process once the invitation is accepted.
    pub requests: Vec<Attachment>,
}

pub struct OutOfBandService {
    records: Repository<OutOfBandRecord>,
    messages: DidCommMessageRepository,
    locks: ExchangeLocks,
    bus: EventBus,
    config: AgentConfig,
}

impl OutOfBandService {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        bus: EventBus,
        locks: ExchangeLocks,
        config: AgentConfig,
    ) -> Self {
        Self {
            records: Repository::new(Arc::clone(&storage), bus.clone()),
            messages: DidCommMessageRepository::new(storage),
            locks,
            bus,
            config,
        }
    }

    /// Creates our invitation. `handshake_protocols` must already be narrowed
    /// to the protocols this agent supports; an empty list means a
    /// connection-less invitation carrying only `requests`.
    pub async fn create_invitation(
        &self,
        routing: &Routing,
        handshake_protocols: Vec<String>,
        options: CreateInvitationOptions,
    ) -> Result<OutOfBandRecord, ParleyError> {
        if handshake_protocols.is_empty() && options.requests.is_empty() {
            return Err(ParleyError::InvalidMessage(
                "an invitation needs handshake protocols or request attachments".into(),
            ));
        }
        if options.reusable && handshake_protocols.is_empty() {
            return Err(ParleyError::InvalidMessage(
                "only handshake invitations can be reusable".into(),
            ));
        }

        let service = match &options.public_did {
            Some(did) => ServiceEntry::Did(did.clone()),
            None => ServiceEntry::Inline(DidCommService {
                id: "#inline-0".into(),
                service_endpoint: routing.primary_endpoint(),
                recipient_keys: vec![routing.verkey.clone()],
                routing_keys: routing.routing_keys.clone(),
                priority: 0,
            }),
        };
        let invitation = OutOfBandInvitation {
            id: uuid::Uuid::new_v4().to_string(),
            label: options.label.unwrap_or_else(|| self.config.label.clone()),
            goal_code: options.goal_code,
            handshake_protocols,
            services: vec![service],
            requests_attach: options.requests,
        };

        let now = Utc::now();
        let record = OutOfBandRecord {
            id: uuid::Uuid::new_v4().to_string(),
            state: OutOfBandState::AwaitResponse,
            role: OutOfBandRole::Sender,
            invitation,
            reusable: options.reusable,
            auto_accept_connection: options
                .auto_accept_connection
                .unwrap_or(self.config.auto_accept_connections),
            reuse_connection_id: None,
            our_did: Some(routing.did.clone()),
            our_verkey: Some(routing.verkey.clone()),
            our_did_doc: Some(routing.did_doc()),
            created_at: now,
            updated_at: now,
        };
        self.records.save(&record).await?;
        info!(out_of_band_id = %record.id, invitation_id = %record.invitation.id, "out-of-band invitation created");
        Ok(record)
    }

    /// Stores a received invitation. Receiving the same invitation twice is rejected.
    pub async fn receive_invitation(
        &self,
        invitation: OutOfBandInvitation,
        auto_accept_connection: Option<bool>,
    ) -> Result<OutOfBandRecord, ParleyError> {
        if invitation.services.is_empty() {
            return Err(ParleyError::InvalidMessage(format!(
                "invitation {} has no services",
                invitation.id
            )));
        }
        let query = TagQuery::new()
            .with("invitationId", invitation.id.clone())
            .with("role", OutOfBandRole::Receiver.to_string());
        if !self.records.find_by_query(&query).await?.is_empty() {
            return Err(ParleyError::RecordDuplicate {
                record_type: RECORD_TYPE.to_string(),
                query: query.to_string(),
            });
        }

        let now = Utc::now();
        let record = OutOfBandRecord {
            id: uuid::Uuid::new_v4().to_string(),
            state: OutOfBandState::PrepareResponse,
            role: OutOfBandRole::Receiver,
            invitation,
            reusable: false,
            auto_accept_connection: auto_accept_connection
                .unwrap_or(self.config.auto_accept_connections),
            reuse_connection_id: None,
            our_did: None,
            our_verkey: None,
            our_did_doc: None,
            created_at: now,
            updated_at: now,
        };
        self.records.save(&record).await?;
        debug!(out_of_band_id = %record.id, invitation_id = %record.invitation.id, "out-of-band invitation received");
        Ok(record)
    }

    /// Receiver: asks the inviter to reuse `connection` instead of a new handshake.
    pub async fn create_handshake_reuse(
        &self,
        out_of_band_id: &str,
        connection: &ConnectionRecord,
    ) -> Result<AgentMessage, ParleyError> {
        let record = self.records.get_by_id(out_of_band_id).await?;
        assert_role(&record, record.role, OutOfBandRole::Receiver)?;
        assert_state(&record, &[OutOfBandState::PrepareResponse])?;

        let message =
            reuse_message(OutOfBandMessageKind::HandshakeReuse, 1, None, &record.invitation.id)?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        debug!(out_of_band_id, connection_id = %connection.id, "handshake reuse requested");
        Ok(message)
    }

    /// Sender: accepts reuse of the connection the message arrived on.
    ///
    /// The answer uses the minor version the peer spoke. A single-use
    /// invitation is done afterwards.
    pub async fn process_handshake_reuse(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<(AgentMessage, OutOfBandRecord), ParleyError> {
        let connection = ctx.ready_connection()?;
        let invitation_id = parent_thread(ctx)?;
        let _guard = self.locks.lock(RECORD_TYPE, invitation_id, None).await;
        let mut record = self
            .records
            .get_single_by_query(
                &TagQuery::new()
                    .with("invitationId", invitation_id)
                    .with("role", OutOfBandRole::Sender.to_string()),
            )
            .await?;
        assert_state(&record, &[OutOfBandState::AwaitResponse])?;

        let minor = ctx.message_type()?.minor;
        let accepted = reuse_message(
            OutOfBandMessageKind::HandshakeReuseAccepted,
            minor,
            Some(ctx.thread_id()),
            invitation_id,
        )?;

        record.reuse_connection_id = Some(connection.id.clone());
        if record.reusable {
            record.touch(Utc::now());
            self.records.update(&record).await?;
        } else {
            self.records.update_state(&mut record, OutOfBandState::Done).await?;
        }
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        info!(out_of_band_id = %record.id, connection_id = %connection.id, "connection reuse accepted");
        Ok((accepted, record))
    }

    /// Receiver: the inviter agreed to reuse; announces it and closes the invitation.
    pub async fn process_reuse_accepted(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<OutOfBandRecord, ParleyError> {
        let connection = ctx.ready_connection()?;
        let invitation_id = parent_thread(ctx)?;
        let _guard = self.locks.lock(RECORD_TYPE, invitation_id, None).await;
        let mut record = self
            .records
            .get_single_by_query(
                &TagQuery::new()
                    .with("invitationId", invitation_id)
                    .with("role", OutOfBandRole::Receiver.to_string()),
            )
            .await?;
        assert_state(&record, &[OutOfBandState::PrepareResponse])?;

        record.reuse_connection_id = Some(connection.id.clone());
        self.records.update_state(&mut record, OutOfBandState::Done).await?;
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        self.bus.publish(EventKind::ReuseAccepted {
            out_of_band_id: record.id.clone(),
            connection_id: connection.id.clone(),
            reuse_thread_id: ctx.thread_id().to_string(),
        });
        Ok(record)
    }

    /// Logs a peer's out-of-band problem report against the invitation it names.
    pub async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<Option<OutOfBandRecord>, ParleyError> {
        let record = match ctx.message.parent_thread_id() {
            Some(invitation_id) => self.find_by_message_id(invitation_id).await?,
            None => None,
        };
        warn!(
            out_of_band_id = record.as_ref().map(|r| r.id.as_str()),
            thread_id = ctx.thread_id(),
            body = ?ctx.message.body,
            "out-of-band problem report received"
        );
        Ok(record)
    }

    /// Waits on `rx` for the peer to accept reuse for `out_of_band_id`.
    ///
    /// Returns the reused connection id. Subscribe before sending the reuse
    /// request so an immediate answer is not missed.
    pub async fn return_when_accepted(
        rx: broadcast::Receiver<BusEvent>,
        out_of_band_id: &str,
        timeout: Duration,
    ) -> Result<String, ParleyError> {
        wait_for_event(rx, timeout, |event| match &event.kind {
            EventKind::ReuseAccepted {
                out_of_band_id: id,
                connection_id,
                ..
            } if id == out_of_band_id => Some(connection_id.clone()),
            _ => None,
        })
        .await
        .map_err(|e| match e {
            WaitError::Timeout(duration) => ParleyError::Timeout { duration },
            WaitError::Closed => ParleyError::Internal("event bus closed".into()),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.bus.subscribe()
    }

    /// The record of the invitation with message id `invitation_id`.
    pub async fn find_by_message_id(
        &self,
        invitation_id: &str,
    ) -> Result<Option<OutOfBandRecord>, ParleyError> {
        self.records
            .find_single_by_query(&TagQuery::new().with("invitationId", invitation_id))
            .await
    }

    pub async fn find_by_recipient_key(
        &self,
        recipient_key: &str,
    ) -> Result<Option<OutOfBandRecord>, ParleyError> {
        self.records
            .find_single_by_query(&TagQuery::new().with("recipientKey", recipient_key))
            .await
    }

    pub async fn update_state(
        &self,
        record: &mut OutOfBandRecord,
        state: OutOfBandState,
    ) -> Result<(), ParleyError> {
        self.records.update_state(record, state).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<OutOfBandRecord, ParleyError> {
        self.records.get_by_id(id).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<OutOfBandRecord>, ParleyError> {
        self.records.find_by_id(id).await
    }

    pub async fn get_all(&self) -> Result<Vec<OutOfBandRecord>, ParleyError> {
        self.records.get_all().await
    }

    pub async fn delete(&self, record: &OutOfBandRecord) -> Result<(), ParleyError> {
        self.records.delete(record).await
    }
}

fn parent_thread(ctx: &InboundMessageContext) -> Result<&str, ParleyError> {
    ctx.message.parent_thread_id().ok_or_else(|| {
        ParleyError::InvalidMessage(format!(
            "{} must name the invitation as parent thread",
            ctx.message.message_type
        ))
    })
}
