// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{MessageType, ParleyError};
use tracing::debug;

use super::mediator::MediatorService;
use super::messages::MediationMessageKind;
use super::recipient::MediationRecipientService;
use crate::context::InboundMessageContext;
use crate::dispatcher::{Handler, HandlerOutput};
use crate::message_sender::MessageSender;
use crate::outbound::OutboundMessage;

/// Coordinate-mediation, message pickup and forward messages, for both roles.
pub struct MediationHandler {
    recipient: Arc<MediationRecipientService>,
    mediator: Arc<MediatorService>,
    sender: Arc<MessageSender>,
}

impl MediationHandler {
    pub fn new(
        recipient: Arc<MediationRecipientService>,
        mediator: Arc<MediatorService>,
        sender: Arc<MessageSender>,
    ) -> Self {
        Self {
            recipient,
            mediator,
            sender,
        }
    }
}

#[async_trait]
impl Handler for MediationHandler {
    fn supported_message_types(&self) -> Vec<MessageType> {
        MediationMessageKind::handled_types()
    }

    async fn handle(&self, ctx: &InboundMessageContext) -> Result<HandlerOutput, ParleyError> {
        let message_type = ctx.message_type()?;
        let kind = MediationMessageKind::from_type(&message_type).ok_or_else(|| {
            ParleyError::UnsupportedProtocol {
                message_type: ctx.message.message_type.clone(),
            }
        })?;

        match kind {
            MediationMessageKind::Request => {
                let record = self.mediator.process_request(ctx).await?;
                if !self.mediator.auto_accept_requests() {
                    return Ok(HandlerOutput::none());
                }
                let (grant, record) = self.mediator.create_grant(&record.id).await?;
                let connection = ctx.ready_connection()?;
                Ok(HandlerOutput::reply(
                    OutboundMessage::to_connection(grant, connection).for_record(&record.id),
                ))
            }
            MediationMessageKind::Grant => {
                self.recipient.process_grant(ctx).await?;
                Ok(HandlerOutput::none())
            }
            MediationMessageKind::Deny => {
                self.recipient.process_deny(ctx).await?;
                Ok(HandlerOutput::none())
            }
            MediationMessageKind::KeylistUpdate => {
                let (response, record) = self.mediator.process_keylist_update(ctx).await?;
                Ok(HandlerOutput::reply(
                    OutboundMessage::to_connection(response, ctx.ready_connection()?)
                        .for_record(&record.id),
                ))
            }
            MediationMessageKind::KeylistUpdateResponse => {
                self.recipient.process_keylist_update_response(ctx).await?;
                Ok(HandlerOutput::none())
            }
            MediationMessageKind::BatchPickup => {
                let batch = self.mediator.process_batch_pickup(ctx).await?;
                Ok(HandlerOutput::reply(OutboundMessage::to_connection(
                    batch,
                    ctx.ready_connection()?,
                )))
            }
            MediationMessageKind::Batch => Ok(HandlerOutput::redeliver(self.recipient.process_batch(ctx)?)),
            MediationMessageKind::Forward => {
                let forward = self.mediator.process_forward(ctx).await?;
                let delivery = self
                    .sender
                    .send_package(&forward.connection_id, forward.payload, &ctx.message.message_type)
                    .await?;
                debug!(connection_id = %forward.connection_id, ?delivery, "forward delivered");
                Ok(HandlerOutput::none())
            }
        }
    }
}
