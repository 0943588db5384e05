// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{MessageType, ParleyError};
use tracing::debug;

use super::messages::ProofMessageKind;
use super::service::{PresentationOptions, ProofService};
use crate::context::InboundMessageContext;
use crate::dispatcher::{Handler, HandlerOutput};
use crate::outbound::OutboundMessage;

/// Present-proof 1.0 and 2.0 messages.
pub struct ProofHandler {
    service: Arc<ProofService>,
}

impl ProofHandler {
    pub fn new(service: Arc<ProofService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Handler for ProofHandler {
    fn supported_message_types(&self) -> Vec<MessageType> {
        ProofMessageKind::handled_types()
    }

    async fn handle(&self, ctx: &InboundMessageContext) -> Result<HandlerOutput, ParleyError> {
        let message_type = ctx.message_type()?;
        let (kind, _) = ProofMessageKind::from_type(&message_type).ok_or_else(|| {
            ParleyError::UnsupportedProtocol {
                message_type: ctx.message.message_type.clone(),
            }
        })?;

        match kind {
            ProofMessageKind::Proposal => {
                self.service.process_proposal(ctx).await?;
                Ok(HandlerOutput::none())
            }
            ProofMessageKind::Request => {
                let record = self.service.process_request(ctx).await?;
                match &ctx.connection {
                    Some(connection) if record.auto_accept => {
                        let (presentation, record) = self
                            .service
                            .create_presentation(&record.id, PresentationOptions::default())
                            .await?;
                        Ok(HandlerOutput::reply(
                            OutboundMessage::to_connection(presentation, connection)
                                .for_record(&record.id),
                        ))
                    }
                    _ => Ok(HandlerOutput::none()),
                }
            }
            ProofMessageKind::Presentation => {
                let record = self.service.process_presentation(ctx).await?;
                match &ctx.connection {
                    Some(connection) if record.auto_accept => {
                        let (ack, record) = self.service.create_ack(&record.id).await?;
                        Ok(HandlerOutput::reply(
                            OutboundMessage::to_connection(ack, connection).for_record(&record.id),
                        ))
                    }
                    _ => Ok(HandlerOutput::none()),
                }
            }
            ProofMessageKind::Ack => {
                self.service.process_ack(ctx).await?;
                Ok(HandlerOutput::none())
            }
            ProofMessageKind::ProblemReport => {
                let record = self.service.process_problem_report(ctx).await?;
                debug!(record_id = %record.id, error = ?record.error_message, "proof exchange abandoned");
                Ok(HandlerOutput::none())
            }
        }
    }
}
