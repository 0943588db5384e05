// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{MessageType, ParleyError};

use super::messages::OutOfBandMessageKind;
use super::service::OutOfBandService;
use crate::context::InboundMessageContext;
use crate::dispatcher::{Handler, HandlerOutput};
use crate::outbound::OutboundMessage;

/// Handshake reuse for out-of-band 1.0 and 1.1. Invitations themselves travel out of band.
pub struct OutOfBandHandler {
    service: Arc<OutOfBandService>,
}

impl OutOfBandHandler {
    pub fn new(service: Arc<OutOfBandService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Handler for OutOfBandHandler {
    fn supported_message_types(&self) -> Vec<MessageType> {
        OutOfBandMessageKind::handled_types()
    }

    async fn handle(&self, ctx: &InboundMessageContext) -> Result<HandlerOutput, ParleyError> {
        let message_type = ctx.message_type()?;
        let unsupported = || ParleyError::UnsupportedProtocol {
            message_type: ctx.message.message_type.clone(),
        };
        match OutOfBandMessageKind::from_type(&message_type).ok_or_else(unsupported)? {
            OutOfBandMessageKind::HandshakeReuse => {
                let (accepted, record) = self.service.process_handshake_reuse(ctx).await?;
                let connection = ctx.ready_connection()?;
                Ok(HandlerOutput::reply(
                    OutboundMessage::to_connection(accepted, connection).for_record(&record.id),
                ))
            }
            OutOfBandMessageKind::HandshakeReuseAccepted => {
                self.service.process_reuse_accepted(ctx).await?;
                Ok(HandlerOutput::none())
            }
            OutOfBandMessageKind::ProblemReport => {
                self.service.process_problem_report(ctx).await?;
                Ok(HandlerOutput::none())
            }
            OutOfBandMessageKind::Invitation => Err(unsupported()),
        }
    }
}
