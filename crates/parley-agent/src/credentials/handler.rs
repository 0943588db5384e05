// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{MessageType, ParleyError};
use tracing::debug;

use super::messages::CredentialMessageKind;
use super::record::CredentialExchangeRecord;
use super::service::{CredentialIssueOptions, CredentialRequestOptions, CredentialService};
use crate::connections::ConnectionRecord;
use crate::context::InboundMessageContext;
use crate::dispatcher::{Handler, HandlerOutput};
use crate::outbound::OutboundMessage;

/// Issue-credential 1.0 and 2.0 messages.
///
/// With auto-accept on the record and a connection to answer over, the next
/// step is taken immediately: offer to request, request to credential,
/// credential to ack.
pub struct CredentialHandler {
    service: Arc<CredentialService>,
}

impl CredentialHandler {
    pub fn new(service: Arc<CredentialService>) -> Self {
        Self { service }
    }

    fn auto_reply<'a>(
        ctx: &'a InboundMessageContext,
        record: &CredentialExchangeRecord,
    ) -> Option<&'a ConnectionRecord> {
        if record.auto_accept {
            ctx.connection.as_ref()
        } else {
            None
        }
    }
}

#[async_trait]
impl Handler for CredentialHandler {
    fn supported_message_types(&self) -> Vec<MessageType> {
        CredentialMessageKind::handled_types()
    }

    async fn handle(&self, ctx: &InboundMessageContext) -> Result<HandlerOutput, ParleyError> {
        let message_type = ctx.message_type()?;
        let (kind, _) = CredentialMessageKind::from_type(&message_type).ok_or_else(|| {
            ParleyError::UnsupportedProtocol {
                message_type: ctx.message.message_type.clone(),
            }
        })?;

        match kind {
            CredentialMessageKind::Proposal => {
                self.service.process_proposal(ctx).await?;
                Ok(HandlerOutput::none())
            }
            CredentialMessageKind::Offer => {
                let record = self.service.process_offer(ctx).await?;
                let Some(connection) = Self::auto_reply(ctx, &record) else {
                    return Ok(HandlerOutput::none());
                };
                let (request, record) = self
                    .service
                    .create_request(&record.id, CredentialRequestOptions::default())
                    .await?;
                Ok(HandlerOutput::reply(
                    OutboundMessage::to_connection(request, connection).for_record(&record.id),
                ))
            }
            CredentialMessageKind::Request => {
                let record = self.service.process_request(ctx).await?;
                let Some(connection) = Self::auto_reply(ctx, &record) else {
                    return Ok(HandlerOutput::none());
                };
                let (credential, record) = self
                    .service
                    .create_credential(&record.id, CredentialIssueOptions::default())
                    .await?;
                Ok(HandlerOutput::reply(
                    OutboundMessage::to_connection(credential, connection).for_record(&record.id),
                ))
            }
            CredentialMessageKind::Credential => {
                let record = self.service.process_credential(ctx).await?;
                let Some(connection) = Self::auto_reply(ctx, &record) else {
                    return Ok(HandlerOutput::none());
                };
                let (ack, record) = self.service.create_ack(&record.id).await?;
                Ok(HandlerOutput::reply(
                    OutboundMessage::to_connection(ack, connection).for_record(&record.id),
                ))
            }
            CredentialMessageKind::Ack => {
                self.service.process_ack(ctx).await?;
                Ok(HandlerOutput::none())
            }
            CredentialMessageKind::ProblemReport => {
                let record = self.service.process_problem_report(ctx).await?;
                debug!(record_id = %record.id, error = ?record.error_message, "credential exchange abandoned");
                Ok(HandlerOutput::none())
            }
        }
    }
}
