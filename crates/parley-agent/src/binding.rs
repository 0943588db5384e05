// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread binding checks for non-opening messages.
//!
//! A message continuing an exchange must arrive over the exchange's own
//! connection. Connection-less exchanges are bound through the `~service`
//! decorators of the messages stored for the record instead: the sender must
//! hold the key the peer advertised, and the message must be addressed to the
//! key we advertised.

use parley_core::{AgentMessage, ParleyError};

use crate::context::InboundMessageContext;
use crate::message_repository::DidCommMessageRepository;

pub fn assert_connection_or_service(
    ctx: &InboundMessageContext,
    record_connection_id: Option<&str>,
    previous_received: Option<&AgentMessage>,
    previous_sent: Option<&AgentMessage>,
) -> Result<(), ParleyError> {
    if let Some(connection) = &ctx.connection {
        ctx.ready_connection()?;
        return match record_connection_id {
            Some(id) if id == connection.id => Ok(()),
            Some(id) => Err(ParleyError::ThreadBinding(format!(
                "thread {} belongs to connection {id}, message arrived on {}",
                ctx.thread_id(),
                connection.id
            ))),
            None => Err(ParleyError::ThreadBinding(format!(
                "thread {} is connection-less, message arrived on connection {}",
                ctx.thread_id(),
                connection.id
            ))),
        };
    }

    if record_connection_id.is_some() {
        return Err(ParleyError::ThreadBinding(format!(
            "thread {} requires a connection",
            ctx.thread_id()
        )));
    }

    let received_service = previous_received.and_then(|m| m.service.as_ref());
    let sent_service = previous_sent.and_then(|m| m.service.as_ref());
    if received_service.is_none() && sent_service.is_none() {
        return Err(ParleyError::ThreadBinding(format!(
            "no connection or ~service decorator to bind thread {}",
            ctx.thread_id()
        )));
    }

    if let Some(service) = received_service {
        let sender_ok = ctx
            .sender_key
            .as_ref()
            .is_some_and(|key| service.recipient_keys.contains(key));
        if !sender_ok {
            return Err(ParleyError::ThreadBinding(
                "sender key does not match the peer's ~service recipient keys".into(),
            ));
        }
    }

    if let Some(service) = sent_service {
        let recipient_ok = ctx
            .recipient_key
            .as_ref()
            .is_some_and(|key| service.recipient_keys.contains(key));
        if !recipient_ok {
            return Err(ParleyError::ThreadBinding(
                "recipient key does not match our ~service recipient keys".into(),
            ));
        }
    }

    Ok(())
}

/// Binds a message to a stored exchange, loading the `~service` messages
/// only when the message arrived without a connection.
pub async fn assert_bound(
    ctx: &InboundMessageContext,
    messages: &DidCommMessageRepository,
    record_id: &str,
    record_connection_id: Option<&str>,
) -> Result<(), ParleyError> {
    let (received, sent) = if ctx.connection.is_none() {
        messages.service_bound_messages(record_id).await?
    } else {
        (None, None)
    };
    assert_connection_or_service(ctx, record_connection_id, received.as_ref(), sent.as_ref())
}
