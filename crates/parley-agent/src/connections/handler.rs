// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{AgentMessage, MessageType, ParleyError};
use tracing::debug;

use super::messages::{ConnectionMessageKind, TrustPingBody};
use super::record::HandshakeProtocol;
use super::service::ConnectionService;
use crate::context::InboundMessageContext;
use crate::dispatcher::{Handler, HandlerOutput};
use crate::outbound::OutboundMessage;

/// Handshake, trust ping and connection problem-report messages.
pub struct ConnectionHandler {
    service: Arc<ConnectionService>,
}

impl ConnectionHandler {
    pub fn new(service: Arc<ConnectionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Handler for ConnectionHandler {
    fn supported_message_types(&self) -> Vec<MessageType> {
        ConnectionMessageKind::all()
            .iter()
            .map(ConnectionMessageKind::message_type)
            .collect()
    }

    async fn handle(&self, ctx: &InboundMessageContext) -> Result<HandlerOutput, ParleyError> {
        let message_type = ctx.message_type()?;
        let kind = ConnectionMessageKind::from_type(&message_type).ok_or_else(|| {
            ParleyError::UnsupportedProtocol {
                message_type: ctx.message.message_type.clone(),
            }
        })?;

        match kind {
            ConnectionMessageKind::Request(_) => {
                let record = self.service.process_request(ctx).await?;
                if !record.auto_accept {
                    return Ok(HandlerOutput::none());
                }
                let (response, record) = self.service.create_response(&record.id).await?;
                Ok(HandlerOutput::reply(
                    OutboundMessage::to_connection(response, &record).for_record(&record.id),
                ))
            }
            ConnectionMessageKind::Response(protocol) => {
                // The invitee already accepted when it sent the request.
                let record = self.service.process_response(ctx).await?;
                let (message, record) = match protocol {
                    HandshakeProtocol::DidExchange => self.service.create_complete(&record.id).await?,
                    HandshakeProtocol::Connections => {
                        self.service.create_trust_ping(&record.id, false).await?
                    }
                };
                Ok(HandlerOutput::reply(
                    OutboundMessage::to_connection(message, &record).for_record(&record.id),
                ))
            }
            ConnectionMessageKind::Complete | ConnectionMessageKind::Ack => {
                self.service.process_ack(ctx).await?;
                Ok(HandlerOutput::none())
            }
            ConnectionMessageKind::Ping => {
                let record = self.service.process_ack(ctx).await?;
                let ping: TrustPingBody = ctx.message.body()?;
                if !ping.response_requested {
                    return Ok(HandlerOutput::none());
                }
                let response = AgentMessage::new(
                    &ConnectionMessageKind::PingResponse.message_type(),
                    &serde_json::json!({}),
                )?
                .with_thread_id(ctx.thread_id());
                Ok(HandlerOutput::reply(OutboundMessage::to_connection(response, &record)))
            }
            ConnectionMessageKind::PingResponse => {
                debug!(connection_id = ctx.connection_id(), thread_id = ctx.thread_id(), "trust ping answered");
                Ok(HandlerOutput::none())
            }
            ConnectionMessageKind::ProblemReport(_) => {
                self.service.process_problem_report(ctx).await?;
                Ok(HandlerOutput::none())
            }
        }
    }
}
