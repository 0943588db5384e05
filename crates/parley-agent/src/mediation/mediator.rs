// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mediator side: granting mediation, tracking recipient keys, accepting
//! forwards and handing queued messages over in batches.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parley_bus::EventBus;
use parley_config::model::MediationConfig;
use parley_core::{AgentMessage, MessageRole, ParleyError, StorageAdapter, TagQuery};
use tracing::{debug, info};

use super::messages::{
    BatchBody, BatchItem, BatchPickupBody, ForwardBody, KeylistAction, KeylistResult,
    KeylistUpdateBody, KeylistUpdateResponseBody, KeylistUpdated, MediationGrantBody,
    MediationMessageKind,
};
use super::record::{MediationRecord, MediationRole, MediationState, recipient_key_tag};
use crate::connections::ConnectionRecord;
use crate::context::InboundMessageContext;
use crate::locks::ExchangeLocks;
use crate::message_repository::DidCommMessageRepository;
use crate::record::{ExchangeRecord, assert_role, assert_state};
use crate::repository::Repository;

const RECORD_TYPE: &str = MediationRecord::RECORD_TYPE;

/// A forwarded payload and the connection it is destined for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardDelivery {
    pub connection_id: String,
    pub payload: Vec<u8>,
}

pub struct MediatorService {
    records: Repository<MediationRecord>,
    connections: Repository<ConnectionRecord>,
    messages: DidCommMessageRepository,
    storage: Arc<dyn StorageAdapter>,
    locks: ExchangeLocks,
    config: MediationConfig,
    endpoints: Vec<String>,
}

impl MediatorService {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        bus: EventBus,
        locks: ExchangeLocks,
        config: MediationConfig,
        endpoints: Vec<String>,
    ) -> Self {
        Self {
            records: Repository::new(Arc::clone(&storage), bus.clone()),
            connections: Repository::new(Arc::clone(&storage), bus),
            messages: DidCommMessageRepository::new(Arc::clone(&storage)),
            storage,
            locks,
            config,
            endpoints,
        }
    }

    pub fn auto_accept_requests(&self) -> bool {
        self.config.auto_accept_requests
    }

    /// A peer asks us to mediate: new record in `Requested`.
    pub async fn process_request(&self, ctx: &InboundMessageContext) -> Result<MediationRecord, ParleyError> {
        let connection = ctx.ready_connection()?;

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), Some(&connection.id)).await;
        let record = MediationRecord::new(
            connection.id.clone(),
            ctx.thread_id(),
            MediationState::Requested,
            MediationRole::Mediator,
        );
        self.records.save(&record).await?;
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        debug!(mediation_id = %record.id, connection_id = %connection.id, "mediation requested");
        Ok(record)
    }

    /// `Requested -> Granted`. Our first endpoint is the one peers forward to;
    /// the routing key is our key on the recipient's connection.
    pub async fn create_grant(&self, mediation_id: &str) -> Result<(AgentMessage, MediationRecord), ParleyError> {
        let mut record = self.records.get_by_id(mediation_id).await?;
        let _guard = self
            .locks
            .lock(RECORD_TYPE, &record.thread_id, Some(&record.connection_id))
            .await;
        record = self.records.get_by_id(mediation_id).await?;
        assert_role(&record, record.role, MediationRole::Mediator)?;
        assert_state(&record, &[MediationState::Requested])?;

        let endpoint = self.endpoints.first().cloned().ok_or_else(|| {
            ParleyError::Config("a mediator needs at least one inbound endpoint".into())
        })?;
        let connection = self.connections.get_by_id(&record.connection_id).await?;

        let message = AgentMessage::new(
            &MediationMessageKind::Grant.message_type(),
            &MediationGrantBody {
                endpoint: endpoint.clone(),
                routing_keys: vec![connection.verkey.clone()],
            },
        )?
        .with_thread_id(record.thread_id.clone());

        record.endpoint = Some(endpoint);
        record.routing_keys = vec![connection.verkey];
        self.records.update_state(&mut record, MediationState::Granted).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        info!(mediation_id = %record.id, connection_id = %record.connection_id, "mediation granted");
        Ok((message, record))
    }

    /// `Requested -> Denied`.
    pub async fn create_deny(&self, mediation_id: &str) -> Result<(AgentMessage, MediationRecord), ParleyError> {
        let mut record = self.records.get_by_id(mediation_id).await?;
        let _guard = self
            .locks
            .lock(RECORD_TYPE, &record.thread_id, Some(&record.connection_id))
            .await;
        record = self.records.get_by_id(mediation_id).await?;
        assert_role(&record, record.role, MediationRole::Mediator)?;
        assert_state(&record, &[MediationState::Requested])?;

        let message = AgentMessage::new(&MediationMessageKind::Deny.message_type(), &serde_json::json!({}))?
            .with_thread_id(record.thread_id.clone());
        self.records.update_state(&mut record, MediationState::Denied).await?;
        Ok((message, record))
    }

    /// Applies a recipient's key changes and reports the outcome per key.
    pub async fn process_keylist_update(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<(AgentMessage, MediationRecord), ParleyError> {
        let body: KeylistUpdateBody = ctx.message.body()?;
        let connection = ctx.ready_connection()?;
        let mut record = self.get_granted_by_connection_id(&connection.id).await?;

        let mut updated = Vec::with_capacity(body.updates.len());
        for update in body.updates {
            let present = record.recipient_keys.contains(&update.recipient_key);
            let result = match (update.action, present) {
                (KeylistAction::Add, false) => {
                    record.recipient_keys.push(update.recipient_key.clone());
                    KeylistResult::Success
                }
                (KeylistAction::Remove, true) => {
                    record.recipient_keys.retain(|k| *k != update.recipient_key);
                    KeylistResult::Success
                }
                _ => KeylistResult::NoChange,
            };
            updated.push(KeylistUpdated {
                recipient_key: update.recipient_key,
                action: update.action,
                result,
            });
        }
        self.records.update(&record).await?;

        let response = AgentMessage::new(
            &MediationMessageKind::KeylistUpdateResponse.message_type(),
            &KeylistUpdateResponseBody { updated },
        )?
        .with_thread_id(ctx.thread_id());
        Ok((response, record))
    }

    /// Resolves a forward to the connection of the recipient that registered `to`.
    pub async fn process_forward(&self, ctx: &InboundMessageContext) -> Result<ForwardDelivery, ParleyError> {
        let body: ForwardBody = ctx.message.body()?;
        let record = self
            .records
            .find_single_by_query(
                &TagQuery::new()
                    .with("role", MediationRole::Mediator.to_string())
                    .with(recipient_key_tag(&body.to), "true"),
            )
            .await?
            .ok_or_else(|| {
                ParleyError::InvalidMessage(format!("no mediation registered for key {}", body.to))
            })?;
        let payload = match body.msg {
            serde_json::Value::String(encoded) => BASE64
                .decode(encoded)
                .map_err(|e| ParleyError::InvalidMessage(format!("forwarded message is not base64: {e}")))?,
            other => serde_json::to_vec(&other)?,
        };
        debug!(mediation_id = %record.id, connection_id = %record.connection_id, "forward accepted");
        Ok(ForwardDelivery {
            connection_id: record.connection_id,
            payload,
        })
    }

    /// Drains up to `min(requested, configured batch size)` queued messages, oldest first.
    pub async fn process_batch_pickup(&self, ctx: &InboundMessageContext) -> Result<AgentMessage, ParleyError> {
        let body: BatchPickupBody = ctx.message.body()?;
        let connection = ctx.ready_connection()?;
        let limit = body.batch_size.min(self.config.batch_size);

        let queued = self.storage.take_queued_messages(&connection.id, Some(limit)).await?;
        let messages_attach = queued
            .into_iter()
            .map(|entry| BatchItem {
                id: entry.id.to_string(),
                message: serde_json::from_slice(&entry.payload)
                    .unwrap_or_else(|_| serde_json::Value::String(BASE64.encode(&entry.payload))),
            })
            .collect::<Vec<_>>();
        debug!(connection_id = %connection.id, count = messages_attach.len(), "batch picked up");

        Ok(AgentMessage::new(&MediationMessageKind::Batch.message_type(), &BatchBody { messages_attach })?
            .with_thread_id(ctx.thread_id()))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<MediationRecord, ParleyError> {
        self.records.get_by_id(id).await
    }

    pub async fn get_all(&self) -> Result<Vec<MediationRecord>, ParleyError> {
        self.records.get_all().await
    }

    async fn get_granted_by_connection_id(&self, connection_id: &str) -> Result<MediationRecord, ParleyError> {
        self.records
            .get_single_by_query(
                &TagQuery::new()
                    .with("connectionId", connection_id)
                    .with("role", MediationRole::Mediator.to_string())
                    .with("state", MediationState::Granted.to_string()),
            )
            .await
    }
}
