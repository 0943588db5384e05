// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient side of mediation: asking a peer to route for us and
//! collecting what it queued.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parley_bus::{EventBus, EventKind, WaitError, wait_for_event};
use parley_config::model::MediationConfig;
use parley_core::{AgentMessage, MessageRole, ParleyError, StorageAdapter, TagQuery};
use tracing::{debug, info, warn};

use super::messages::{
    BatchBody, BatchPickupBody, KeylistAction, KeylistResult, KeylistUpdate, KeylistUpdateBody,
    KeylistUpdateResponseBody, MediationGrantBody, MediationMessageKind,
};
use super::record::{MediationRecord, MediationRole, MediationState};
use crate::connections::ConnectionRecord;
use crate::context::InboundMessageContext;
use crate::locks::ExchangeLocks;
use crate::message_repository::DidCommMessageRepository;
use crate::message_sender::MessageSender;
use crate::record::{ExchangeRecord, assert_role, assert_state};
use crate::repository::Repository;

const RECORD_TYPE: &str = MediationRecord::RECORD_TYPE;

pub struct MediationRecipientService {
    records: Repository<MediationRecord>,
    messages: DidCommMessageRepository,
    locks: ExchangeLocks,
    bus: EventBus,
    config: MediationConfig,
}

impl MediationRecipientService {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        bus: EventBus,
        locks: ExchangeLocks,
        config: MediationConfig,
    ) -> Self {
        Self {
            records: Repository::new(Arc::clone(&storage), bus.clone()),
            messages: DidCommMessageRepository::new(storage),
            locks,
            bus,
            config,
        }
    }

    /// Asks the peer on `connection` to mediate: `-> Requested`.
    pub async fn create_request(
        &self,
        connection: &ConnectionRecord,
    ) -> Result<(AgentMessage, MediationRecord), ParleyError> {
        if !connection.is_ready() {
            return Err(ParleyError::ThreadBinding(format!(
                "connection {} is not ready (state {})",
                connection.id, connection.state
            )));
        }
        let message = AgentMessage::new(
            &MediationMessageKind::Request.message_type(),
            &serde_json::json!({}),
        )?;
        let record = MediationRecord::new(
            connection.id.clone(),
            message.id.clone(),
            MediationState::Requested,
            MediationRole::Recipient,
        );
        self.records.save(&record).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// `Requested -> Granted`, keeping the mediator's endpoint and routing keys.
    pub async fn process_grant(&self, ctx: &InboundMessageContext) -> Result<MediationRecord, ParleyError> {
        let body: MediationGrantBody = ctx.message.body()?;
        let connection = ctx.ready_connection()?;

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), Some(&connection.id)).await;
        let mut record = self.get_by_thread_and_connection_id(ctx.thread_id(), &connection.id).await?;
        assert_role(&record, record.role, MediationRole::Recipient)?;
        assert_state(&record, &[MediationState::Requested])?;

        record.endpoint = Some(body.endpoint);
        record.routing_keys = body.routing_keys;
        self.records.update_state(&mut record, MediationState::Granted).await?;
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        info!(mediation_id = %record.id, connection_id = %record.connection_id, "mediation granted");
        Ok(record)
    }

    /// `Requested -> Denied`.
    pub async fn process_deny(&self, ctx: &InboundMessageContext) -> Result<MediationRecord, ParleyError> {
        let connection = ctx.ready_connection()?;

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), Some(&connection.id)).await;
        let mut record = self.get_by_thread_and_connection_id(ctx.thread_id(), &connection.id).await?;
        assert_role(&record, record.role, MediationRole::Recipient)?;
        assert_state(&record, &[MediationState::Requested])?;

        self.records.update_state(&mut record, MediationState::Denied).await?;
        info!(mediation_id = %record.id, "mediation denied");
        Ok(record)
    }

    /// Requests mediation and waits for the grant or denial.
    ///
    /// The subscription is taken before the request leaves, so a grant that
    /// arrives during the send is not missed. A late answer after the timeout
    /// still updates the record but is not observed here.
    pub async fn request_and_await_grant(
        &self,
        connection: &ConnectionRecord,
        sender: &MessageSender,
        timeout: Duration,
    ) -> Result<MediationRecord, ParleyError> {
        let rx = self.bus.subscribe();
        let (message, record) = self.create_request(connection).await?;
        sender.send_to_connection(&message, connection).await?;

        let record_id = record.id.clone();
        let outcome = wait_for_event(rx, timeout, |event| {
            event
                .as_state_changed()
                .filter(|c| c.record_type == RECORD_TYPE && c.record_id == record_id)
                .filter(|c| c.state != MediationState::Requested.to_string())
                .map(|_| ())
        })
        .await;
        match outcome {
            Ok(()) => self.records.get_by_id(&record.id).await,
            Err(WaitError::Timeout(duration)) => {
                warn!(mediation_id = %record.id, ?duration, "no answer to mediation request");
                Err(ParleyError::Timeout { duration })
            }
            Err(WaitError::Closed) => Err(ParleyError::Internal("event bus closed".into())),
        }
    }

    /// Registers or withdraws a recipient key with a granted mediator.
    ///
    /// The record changes once the mediator confirms the update.
    pub async fn create_keylist_update(
        &self,
        mediation_id: &str,
        recipient_key: &str,
        action: KeylistAction,
    ) -> Result<(AgentMessage, MediationRecord), ParleyError> {
        let record = self.records.get_by_id(mediation_id).await?;
        assert_role(&record, record.role, MediationRole::Recipient)?;
        assert_state(&record, &[MediationState::Granted])?;

        let message = AgentMessage::new(
            &MediationMessageKind::KeylistUpdate.message_type(),
            &KeylistUpdateBody {
                updates: vec![KeylistUpdate {
                    recipient_key: recipient_key.to_string(),
                    action,
                }],
            },
        )?;
        Ok((message, record))
    }

    /// Applies the keys the mediator confirmed.
    pub async fn process_keylist_update_response(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<MediationRecord, ParleyError> {
        let body: KeylistUpdateResponseBody = ctx.message.body()?;
        let connection = ctx.ready_connection()?;
        let mut record = self.get_granted_by_connection_id(&connection.id).await?;

        for updated in body.updated {
            if updated.result != KeylistResult::Success {
                debug!(recipient_key = %updated.recipient_key, result = %updated.result, "keylist update not applied");
                continue;
            }
            match updated.action {
                KeylistAction::Add => {
                    if !record.recipient_keys.contains(&updated.recipient_key) {
                        record.recipient_keys.push(updated.recipient_key);
                    }
                }
                KeylistAction::Remove => record.recipient_keys.retain(|k| *k != updated.recipient_key),
            }
        }
        self.records.update(&record).await?;
        self.bus.publish(EventKind::KeylistUpdated {
            mediation_id: record.id.clone(),
            recipient_keys: record.recipient_keys.clone(),
        });
        Ok(record)
    }

    /// Sends a keylist update and waits until the mediator confirms `recipient_key`.
    pub async fn update_keylist_and_await(
        &self,
        mediation_id: &str,
        connection: &ConnectionRecord,
        recipient_key: &str,
        action: KeylistAction,
        sender: &MessageSender,
        timeout: Duration,
    ) -> Result<MediationRecord, ParleyError> {
        let rx = self.bus.subscribe();
        let (message, record) = self.create_keylist_update(mediation_id, recipient_key, action).await?;
        if record.connection_id != connection.id {
            return Err(ParleyError::ThreadBinding(format!(
                "mediation {mediation_id} belongs to connection {}",
                record.connection_id
            )));
        }
        sender.send_to_connection(&message, connection).await?;

        let applied = |keys: &[String]| match action {
            KeylistAction::Add => keys.iter().any(|k| k == recipient_key),
            KeylistAction::Remove => keys.iter().all(|k| k != recipient_key),
        };
        let outcome = wait_for_event(rx, timeout, |event| match &event.kind {
            EventKind::KeylistUpdated {
                mediation_id: id,
                recipient_keys,
            } if id == mediation_id && applied(recipient_keys) => Some(()),
            _ => None,
        })
        .await;
        match outcome {
            Ok(()) => self.records.get_by_id(mediation_id).await,
            Err(WaitError::Timeout(duration)) => {
                warn!(mediation_id, recipient_key, ?duration, "keylist update not confirmed");
                Err(ParleyError::Timeout { duration })
            }
            Err(WaitError::Closed) => Err(ParleyError::Internal("event bus closed".into())),
        }
    }

    /// A pickup request for up to the configured batch size.
    pub async fn create_batch_pickup(&self, mediation_id: &str) -> Result<AgentMessage, ParleyError> {
        let record = self.records.get_by_id(mediation_id).await?;
        assert_role(&record, record.role, MediationRole::Recipient)?;
        assert_state(&record, &[MediationState::Granted])?;
        AgentMessage::new(
            &MediationMessageKind::BatchPickup.message_type(),
            &BatchPickupBody {
                batch_size: self.config.batch_size,
            },
        )
    }

    /// Unwraps a batch into packed messages for the inbound path.
    pub fn process_batch(&self, ctx: &InboundMessageContext) -> Result<Vec<Vec<u8>>, ParleyError> {
        let body: BatchBody = ctx.message.body()?;
        debug!(count = body.messages_attach.len(), "batch received");
        body.messages_attach
            .into_iter()
            .map(|item| match item.message {
                serde_json::Value::String(encoded) => BASE64.decode(encoded).map_err(|e| {
                    ParleyError::InvalidMessage(format!("batch item {} is not base64: {e}", item.id))
                }),
                other => Ok(serde_json::to_vec(&other)?),
            })
            .collect()
    }

    pub async fn get_by_id(&self, id: &str) -> Result<MediationRecord, ParleyError> {
        self.records.get_by_id(id).await
    }

    pub async fn find_by_connection_id(
        &self,
        connection_id: &str,
    ) -> Result<Option<MediationRecord>, ParleyError> {
        self.records
            .find_single_by_query(
                &TagQuery::new()
                    .with("connectionId", connection_id)
                    .with("role", MediationRole::Recipient.to_string()),
            )
            .await
    }

    /// The first granted mediator, used for new routing when none is named.
    pub async fn find_default_mediator(&self) -> Result<Option<MediationRecord>, ParleyError> {
        Ok(self
            .records
            .find_by_query(
                &TagQuery::new()
                    .with("role", MediationRole::Recipient.to_string())
                    .with("state", MediationState::Granted.to_string()),
            )
            .await?
            .into_iter()
            .min_by_key(|r| r.created_at))
    }

    pub async fn get_all(&self) -> Result<Vec<MediationRecord>, ParleyError> {
        self.records.get_all().await
    }

    async fn get_by_thread_and_connection_id(
        &self,
        thread_id: &str,
        connection_id: &str,
    ) -> Result<MediationRecord, ParleyError> {
        self.records
            .get_single_by_query(
                &TagQuery::new()
                    .with("threadId", thread_id)
                    .with("connectionId", connection_id),
            )
            .await
    }

    async fn get_granted_by_connection_id(&self, connection_id: &str) -> Result<MediationRecord, ParleyError> {
        self.records
            .get_single_by_query(
                &TagQuery::new()
                    .with("connectionId", connection_id)
                    .with("role", MediationRole::Recipient.to_string())
                    .with("state", MediationState::Granted.to_string()),
            )
            .await
    }
}
