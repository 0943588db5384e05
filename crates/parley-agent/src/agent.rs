// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The agent facade.
//!
//! [`AgentBuilder`] wires the whole object graph explicitly: one storage
//! adapter, one event bus, one lock registry shared by every protocol service,
//! one message sender and the dispatcher with a handler per protocol family.
//! [`Agent`] is a cheap clone over that graph and owns the inbound path:
//! unpack, resolve the connection, remember a return-routed session, dispatch,
//! deliver the reply, then run any messages the handler unwrapped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parley_bus::EventBus;
use parley_config::model::{ParleyConfig, PickupStrategy};
use parley_core::{
    DecryptedMessage, DidCommService, DidInfo, DidResolver, EnvelopeKeys, EnvelopeService,
    OutboundTransport, ParleyError, ReturnRoute, StorageAdapter, TransportSession, Wallet,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connections::{
    ConnectionHandler, ConnectionInvitation, ConnectionRecord, ConnectionService, HandshakeProtocol,
};
use crate::context::InboundMessageContext;
use crate::credentials::{CredentialHandler, CredentialService};
use crate::dispatcher::Dispatcher;
use crate::locks::ExchangeLocks;
use crate::mediation::{
    KeylistAction, MediationHandler, MediationRecipientService, MediationRecord, MediatorService,
};
use crate::message_sender::{Delivery, MessageSender};
use crate::notification::problem_report_message;
use crate::oob::{
    CreateInvitationOptions, OutOfBandHandler, OutOfBandInvitation, OutOfBandRecord,
    OutOfBandService, OutOfBandState,
};
use crate::outbound::{OutboundMessage, OutboundTarget};
use crate::proofs::{ProofHandler, ProofService};
use crate::routing::Routing;
use crate::transport_service::TransportService;

/// Options for [`Agent::receive_invitation_and_connect`].
#[derive(Debug, Clone, Default)]
pub struct ReceiveInvitationOptions {
    /// Overrides `agent.auto_accept_connections` for the new connection.
    pub auto_accept_connection: Option<bool>,
    /// Overrides `out_of_band.reuse_connections`.
    pub reuse_connection: Option<bool>,
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    config: ParleyConfig,
    storage: Arc<dyn StorageAdapter>,
    envelope: Arc<dyn EnvelopeService>,
    wallet: Arc<dyn Wallet>,
    resolver: Option<Arc<dyn DidResolver>>,
    transports: Vec<Arc<dyn OutboundTransport>>,
    public_did: Option<DidInfo>,
    bus: Option<EventBus>,
}

impl AgentBuilder {
    /// `storage` must already be initialized.
    pub fn new(
        config: ParleyConfig,
        storage: Arc<dyn StorageAdapter>,
        envelope: Arc<dyn EnvelopeService>,
        wallet: Arc<dyn Wallet>,
    ) -> Self {
        Self {
            config,
            storage,
            envelope,
            wallet,
            resolver: None,
            transports: Vec::new(),
            public_did: None,
            bus: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DidResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_outbound_transport(mut self, transport: Arc<dyn OutboundTransport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// The DID advertised by invitations created with `public_did` set.
    pub fn with_public_did(mut self, did: DidInfo) -> Self {
        self.public_did = Some(did);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> Result<Agent, ParleyError> {
        let config = self.config;
        let storage = self.storage;
        let bus = self.bus.unwrap_or_default();
        let locks = ExchangeLocks::new();
        let transport_service = Arc::new(TransportService::new());

        let mut sender = MessageSender::new(
            Arc::clone(&self.envelope),
            Arc::clone(&storage),
            Arc::clone(&transport_service),
            self.resolver.clone(),
            config.transport.clone(),
            bus.clone(),
        );
        for transport in self.transports {
            sender.register_outbound_transport(transport);
        }
        let sender = Arc::new(sender);

        let connections = Arc::new(ConnectionService::new(
            Arc::clone(&storage),
            bus.clone(),
            locks.clone(),
            config.agent.clone(),
        ));
        let out_of_band = Arc::new(OutOfBandService::new(
            Arc::clone(&storage),
            bus.clone(),
            locks.clone(),
            config.agent.clone(),
        ));
        let credentials = Arc::new(CredentialService::new(
            Arc::clone(&storage),
            bus.clone(),
            locks.clone(),
            config.agent.auto_accept_credentials,
        ));
        let proofs = Arc::new(ProofService::new(
            Arc::clone(&storage),
            bus.clone(),
            locks.clone(),
            config.agent.auto_accept_proofs,
        ));
        let mediation_recipient = Arc::new(MediationRecipientService::new(
            Arc::clone(&storage),
            bus.clone(),
            locks.clone(),
            config.mediation.clone(),
        ));
        let mediator = Arc::new(MediatorService::new(
            Arc::clone(&storage),
            bus.clone(),
            locks,
            config.mediation.clone(),
            config.agent.endpoints.clone(),
        ));

        let mut dispatcher = Dispatcher::new();
        dispatcher.register_handler(Arc::new(ConnectionHandler::new(Arc::clone(&connections))))?;
        dispatcher.register_handler(Arc::new(OutOfBandHandler::new(Arc::clone(&out_of_band))))?;
        dispatcher.register_handler(Arc::new(CredentialHandler::new(Arc::clone(&credentials))))?;
        dispatcher.register_handler(Arc::new(ProofHandler::new(Arc::clone(&proofs))))?;
        dispatcher.register_handler(Arc::new(MediationHandler::new(
            Arc::clone(&mediation_recipient),
            Arc::clone(&mediator),
            Arc::clone(&sender),
        )))?;

        info!(
            label = %config.agent.label,
            endpoints = ?config.agent.endpoints,
            protocols = dispatcher.supported_protocols().len(),
            "agent initialized"
        );

        Ok(Agent {
            inner: Arc::new(AgentInner {
                config,
                storage,
                envelope: self.envelope,
                wallet: self.wallet,
                public_did: self.public_did,
                bus,
                dispatcher,
                sender,
                transport_service,
                connections,
                out_of_band,
                credentials,
                proofs,
                mediation_recipient,
                mediator,
            }),
        })
    }
}

struct AgentInner {
    config: ParleyConfig,
    storage: Arc<dyn StorageAdapter>,
    envelope: Arc<dyn EnvelopeService>,
    wallet: Arc<dyn Wallet>,
    public_did: Option<DidInfo>,
    bus: EventBus,
    dispatcher: Dispatcher,
    sender: Arc<MessageSender>,
    transport_service: Arc<TransportService>,
    connections: Arc<ConnectionService>,
    out_of_band: Arc<OutOfBandService>,
    credentials: Arc<CredentialService>,
    proofs: Arc<ProofService>,
    mediation_recipient: Arc<MediationRecipientService>,
    mediator: Arc<MediatorService>,
}

/// A DIDComm agent. Clones share the same services and storage.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn builder(
        config: ParleyConfig,
        storage: Arc<dyn StorageAdapter>,
        envelope: Arc<dyn EnvelopeService>,
        wallet: Arc<dyn Wallet>,
    ) -> AgentBuilder {
        AgentBuilder::new(config, storage, envelope, wallet)
    }

    /// Processes one packed inbound message.
    ///
    /// `session` is the inbound transport connection, when the transport can
    /// carry replies. It is kept only if the message asks for return routing.
    /// Undecryptable messages and unknown message types are logged and dropped.
    pub async fn receive_message(
        &self,
        wire: &[u8],
        session: Option<TransportSession>,
    ) -> Result<(), ParleyError> {
        let mut pending: VecDeque<Vec<u8>> = self.process_inbound(wire, session).await?.into();
        while let Some(payload) = pending.pop_front() {
            match self.process_inbound(&payload, None).await {
                Ok(more) => pending.extend(more),
                Err(e) => warn!(error = %e, "unwrapped message could not be processed"),
            }
        }
        Ok(())
    }

    async fn process_inbound(
        &self,
        wire: &[u8],
        session: Option<TransportSession>,
    ) -> Result<Vec<Vec<u8>>, ParleyError> {
        let DecryptedMessage {
            message,
            sender_key,
            recipient_key,
        } = match self.inner.envelope.unpack(wire).await {
            Ok(decrypted) => decrypted,
            Err(e @ ParleyError::Decryption(_)) => {
                warn!(error = %e, "dropping inbound message");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let connection = self
            .find_connection(sender_key.as_deref(), recipient_key.as_deref())
            .await?;
        let mut ctx = InboundMessageContext::new(message).with_keys(sender_key, recipient_key);
        if let Some(connection) = connection {
            ctx = ctx.with_connection(connection);
        }

        if let Some(mut session) = session
            && ctx.message.has_return_routing()
        {
            session.keys = ctx.sender_key.as_ref().map(|sender| EnvelopeKeys {
                recipient_keys: vec![sender.clone()],
                routing_keys: Vec::new(),
                sender_key: ctx.recipient_key.clone(),
            });
            session.inbound_message = Some(ctx.message.clone());
            session.connection_id = ctx.connection_id().map(str::to_string);
            ctx.session_id = Some(session.id.clone());
            self.inner.transport_service.save_session(session);
        }

        let output = match self.inner.dispatcher.dispatch(&ctx).await {
            Ok(output) => output,
            Err(ParleyError::UnsupportedProtocol { message_type }) => {
                warn!(%message_type, connection_id = ctx.connection_id(), "no handler for message, dropping");
                return Ok(Vec::new());
            }
            Err(ParleyError::ProblemReport { code, message }) => {
                warn!(%code, %message, thread_id = ctx.thread_id(), "rejecting message with problem report");
                if let Err(e) = self.send_problem_report(&ctx, &code, &message).await {
                    warn!(error = %e, thread_id = ctx.thread_id(), "problem report could not be sent");
                }
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if let Some(reply) = output.reply {
            if let (Some(session_id), Some(connection)) = (&ctx.session_id, reply.connection()) {
                self.bind_session(session_id, &connection.id);
            }
            self.send_message(reply).await?;
        }
        Ok(output.redeliver)
    }

    /// Connection for an inbound message: by both keys, or by our key alone
    /// while the handshake has not told us theirs yet.
    async fn find_connection(
        &self,
        sender_key: Option<&str>,
        recipient_key: Option<&str>,
    ) -> Result<Option<ConnectionRecord>, ParleyError> {
        let Some(recipient_key) = recipient_key else {
            return Ok(None);
        };
        if let Some(sender_key) = sender_key
            && let Some(connection) = self
                .inner
                .connections
                .find_by_keys(sender_key, recipient_key)
                .await?
        {
            return Ok(Some(connection));
        }
        match self.inner.connections.find_by_verkey(recipient_key).await {
            Ok(found) => Ok(found.filter(|c| c.their_key.is_none())),
            Err(ParleyError::RecordDuplicate { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn bind_session(&self, session_id: &str, connection_id: &str) {
        if let Some(mut session) = self.inner.transport_service.find_session_by_id(session_id)
            && session.connection_id.as_deref() != Some(connection_id)
        {
            session.connection_id = Some(connection_id.to_string());
            self.inner.transport_service.save_session(session);
        }
    }

    async fn send_problem_report(
        &self,
        ctx: &InboundMessageContext,
        code: &str,
        description: &str,
    ) -> Result<(), ParleyError> {
        let report = problem_report_message(&ctx.message_type()?, ctx.thread_id(), code, description)?;
        let outbound = if let Some(connection) = &ctx.connection {
            OutboundMessage::to_connection(report, connection)
        } else if let Some(session_id) = &ctx.session_id {
            OutboundMessage::over_session(report, session_id)
        } else if let (Some(service), Some(our_key)) = (&ctx.message.service, &ctx.recipient_key) {
            OutboundMessage::to_service(
                report,
                DidCommService::from_decorator("#service-0", service),
                our_key.clone(),
            )
        } else {
            debug!(thread_id = ctx.thread_id(), "no route back to the sender for a problem report");
            return Ok(());
        };
        self.send_message(outbound).await.map(|_| ())
    }

    /// Delivers a message to its target.
    pub async fn send_message(&self, outbound: OutboundMessage) -> Result<Delivery, ParleyError> {
        let OutboundMessage {
            message,
            target,
            associated_record_id,
        } = outbound;
        debug!(
            message_type = %message.message_type,
            thread_id = message.thread_id(),
            record_id = associated_record_id.as_deref(),
            "sending message"
        );
        let sender = &self.inner.sender;
        match target {
            OutboundTarget::Connection(connection) => {
                sender.send_to_connection(&message, &connection).await
            }
            OutboundTarget::Service {
                service,
                sender_key,
            } => sender.send_to_service(&message, &service, Some(&sender_key)).await,
            OutboundTarget::Session(session_id) => sender.send_to_session(&message, &session_id).await,
        }
    }

    /// A fresh DID for one relationship, routed through a mediator when one is granted.
    ///
    /// With `mediation_id` unset the oldest granted mediation is used. The new
    /// key is registered with the mediator before this returns.
    pub async fn create_routing(&self, mediation_id: Option<&str>) -> Result<Routing, ParleyError> {
        let did = self.inner.wallet.create_did().await?;
        let recipient = &self.inner.mediation_recipient;
        let mediation = match mediation_id {
            Some(id) => Some(recipient.get_by_id(id).await?),
            None => recipient.find_default_mediator().await?,
        };
        let Some(mediation) = mediation else {
            return Ok(Routing {
                did: did.did,
                verkey: did.verkey,
                endpoints: self.inner.config.agent.endpoints.clone(),
                routing_keys: Vec::new(),
                mediator_id: None,
            });
        };

        let connection = self.inner.connections.get_by_id(&mediation.connection_id).await?;
        let mediation = recipient
            .update_keylist_and_await(
                &mediation.id,
                &connection,
                &did.verkey,
                KeylistAction::Add,
                &self.inner.sender,
                self.grant_timeout(),
            )
            .await?;
        debug!(mediation_id = %mediation.id, verkey = %did.verkey, "routing created through mediator");
        Ok(Routing {
            did: did.did,
            verkey: did.verkey,
            endpoints: mediation.endpoint.iter().cloned().collect(),
            routing_keys: mediation.routing_keys.clone(),
            mediator_id: Some(mediation.id),
        })
    }

    /// Creates a legacy connections 1.0 invitation.
    pub async fn create_connection_invitation(
        &self,
        auto_accept: Option<bool>,
    ) -> Result<(ConnectionRecord, ConnectionInvitation), ParleyError> {
        let routing = self.create_routing(None).await?;
        self.inner.connections.create_invitation(&routing, auto_accept).await
    }

    /// Stores a legacy invitation and, when auto-accepting, sends the request.
    pub async fn receive_connection_invitation(
        &self,
        invitation: ConnectionInvitation,
        auto_accept: Option<bool>,
    ) -> Result<ConnectionRecord, ParleyError> {
        let routing = self.create_routing(None).await?;
        let record = self
            .inner
            .connections
            .process_invitation(invitation, &routing, auto_accept)
            .await?;
        if !record.auto_accept {
            return Ok(record);
        }
        self.accept_invitation(&record.id).await
    }

    /// Invitee: sends the connection request for an `Invited` connection.
    pub async fn accept_invitation(&self, connection_id: &str) -> Result<ConnectionRecord, ParleyError> {
        let (request, record) = self.inner.connections.create_request(connection_id).await?;
        self.send_message(OutboundMessage::to_connection(request, &record).for_record(&record.id))
            .await?;
        Ok(record)
    }

    /// Creates an out-of-band invitation offering `handshake_protocols`, in
    /// preference order, narrowed to the protocols this agent handles.
    ///
    /// An empty list creates a connection-less invitation carrying only
    /// `options.requests`.
    pub async fn create_out_of_band_invitation(
        &self,
        handshake_protocols: &[HandshakeProtocol],
        options: CreateInvitationOptions,
    ) -> Result<OutOfBandRecord, ParleyError> {
        let families: Vec<String> = handshake_protocols.iter().map(HandshakeProtocol::protocol_uri).collect();
        let supported = self
            .inner
            .dispatcher
            .filter_supported_protocols_by_message_families(&families);
        if supported.is_empty() && !handshake_protocols.is_empty() {
            return Err(ParleyError::Config(
                "none of the requested handshake protocols is supported".into(),
            ));
        }

        let routing = match &options.public_did {
            Some(did) => self.public_routing(did)?,
            None => self.create_routing(None).await?,
        };
        self.inner
            .out_of_band
            .create_invitation(&routing, supported, options)
            .await
    }

    fn public_routing(&self, did: &str) -> Result<Routing, ParleyError> {
        let public = self
            .inner
            .public_did
            .as_ref()
            .filter(|public| public.did == did)
            .ok_or_else(|| ParleyError::Config(format!("{did} is not this agent's public DID")))?;
        Ok(Routing {
            did: public.did.clone(),
            verkey: public.verkey.clone(),
            endpoints: self.inner.config.agent.endpoints.clone(),
            routing_keys: Vec::new(),
            mediator_id: None,
        })
    }

    /// Receives an out-of-band invitation and connects to its sender.
    ///
    /// When the invitation names a DID we already have a ready connection
    /// with, reuse is tried first; if the sender does not accept within
    /// `out_of_band.reuse_timeout_ms`, a new connection is created instead.
    /// Connection-less invitations are stored and returned without a connection.
    pub async fn receive_invitation_and_connect(
        &self,
        invitation: OutOfBandInvitation,
        options: ReceiveInvitationOptions,
    ) -> Result<(OutOfBandRecord, Option<ConnectionRecord>), ParleyError> {
        let out_of_band = &self.inner.out_of_band;
        let mut record = out_of_band
            .receive_invitation(invitation, options.auto_accept_connection)
            .await?;
        if record.invitation.handshake_protocols.is_empty() {
            return Ok((record, None));
        }

        let reuse = options
            .reuse_connection
            .unwrap_or(self.inner.config.out_of_band.reuse_connections);
        if reuse && let Some(existing) = self.find_reusable_connection(&record.invitation).await? {
            match self.reuse_connection(&record, &existing).await {
                Ok(connection) => {
                    let record = out_of_band.get_by_id(&record.id).await?;
                    return Ok((record, Some(connection)));
                }
                Err(ParleyError::Timeout { duration }) => {
                    info!(
                        out_of_band_id = %record.id,
                        connection_id = %existing.id,
                        ?duration,
                        "connection reuse not accepted in time, creating a new connection"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let protocol = record
            .invitation
            .handshake_protocols
            .iter()
            .find_map(|uri| HandshakeProtocol::from_protocol_uri(uri))
            .ok_or_else(|| {
                ParleyError::InvalidMessage(format!(
                    "invitation {} offers no supported handshake protocol",
                    record.invitation.id
                ))
            })?;
        let routing = self.create_routing(None).await?;
        let connection = self
            .inner
            .connections
            .process_out_of_band_invitation(&record, protocol, &routing, Some(record.auto_accept_connection))
            .await?;
        let connection = if connection.auto_accept {
            self.accept_invitation(&connection.id).await?
        } else {
            connection
        };
        out_of_band.update_state(&mut record, OutOfBandState::Done).await?;
        Ok((record, Some(connection)))
    }

    async fn find_reusable_connection(
        &self,
        invitation: &OutOfBandInvitation,
    ) -> Result<Option<ConnectionRecord>, ParleyError> {
        for did in invitation.dids() {
            let ready = self
                .inner
                .connections
                .find_by_invitation_did(did)
                .await?
                .into_iter()
                .find(ConnectionRecord::is_ready);
            if ready.is_some() {
                return Ok(ready);
            }
        }
        Ok(None)
    }

    async fn reuse_connection(
        &self,
        record: &OutOfBandRecord,
        existing: &ConnectionRecord,
    ) -> Result<ConnectionRecord, ParleyError> {
        let out_of_band = &self.inner.out_of_band;
        let rx = out_of_band.subscribe();
        let reuse = out_of_band.create_handshake_reuse(&record.id, existing).await?;
        self.send_message(OutboundMessage::to_connection(reuse, existing).for_record(&record.id))
            .await?;
        let timeout = Duration::from_millis(self.inner.config.out_of_band.reuse_timeout_ms);
        let connection_id = OutOfBandService::return_when_accepted(rx, &record.id, timeout).await?;
        info!(out_of_band_id = %record.id, %connection_id, "existing connection reused");
        self.inner.connections.get_by_id(&connection_id).await
    }

    /// Asks the peer on `connection_id` to mediate and waits for its answer.
    pub async fn request_mediation_and_await_grant(
        &self,
        connection_id: &str,
    ) -> Result<MediationRecord, ParleyError> {
        let connection = self.inner.connections.get_by_id(connection_id).await?;
        self.inner
            .mediation_recipient
            .request_and_await_grant(&connection, &self.inner.sender, self.grant_timeout())
            .await
    }

    /// Sends one `batch-pickup` to the mediator, asking for the batch on the same connection.
    pub async fn pickup_messages(&self, mediation_id: &str) -> Result<Delivery, ParleyError> {
        let record = self.inner.mediation_recipient.get_by_id(mediation_id).await?;
        let connection = self.inner.connections.get_by_id(&record.connection_id).await?;
        let mut pickup = self.inner.mediation_recipient.create_batch_pickup(mediation_id).await?;
        pickup.set_return_routing(ReturnRoute::All);
        self.inner.sender.send_to_connection(&pickup, &connection).await
    }

    /// Keeps a return-routed session open to the mediator with a trust ping.
    async fn open_implicit_session(&self, mediation_id: &str) -> Result<Delivery, ParleyError> {
        let record = self.inner.mediation_recipient.get_by_id(mediation_id).await?;
        let (mut ping, connection) = self
            .inner
            .connections
            .create_trust_ping(&record.connection_id, false)
            .await?;
        ping.set_return_routing(ReturnRoute::All);
        self.inner.sender.send_to_connection(&ping, &connection).await
    }

    /// Collects queued messages from a mediator in the background until `cancel` fires.
    ///
    /// `pickup-v1` polls with `batch-pickup`; `implicit` re-opens a
    /// return-routed session on each tick; `none` returns immediately.
    pub fn start_message_pickup(&self, mediation_id: &str, cancel: CancellationToken) -> JoinHandle<()> {
        let agent = self.clone();
        let mediation_id = mediation_id.to_string();
        let strategy = self.inner.config.mediation.pickup_strategy;
        let interval = Duration::from_millis(self.inner.config.mediation.polling_interval_ms);

        tokio::spawn(async move {
            if strategy == PickupStrategy::None {
                debug!(%mediation_id, "message pickup disabled");
                return;
            }
            info!(%mediation_id, %strategy, ?interval, "message pickup started");
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(%mediation_id, "message pickup stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let result = match strategy {
                            PickupStrategy::Implicit => agent.open_implicit_session(&mediation_id).await,
                            _ => agent.pickup_messages(&mediation_id).await,
                        };
                        if let Err(e) = result {
                            warn!(%mediation_id, error = %e, "message pickup failed");
                        }
                    }
                }
            }
        })
    }

    /// Closes open sessions and transports, then the storage backend.
    pub async fn shutdown(&self) -> Result<(), ParleyError> {
        for session in self.inner.transport_service.take_sessions() {
            if let Err(e) = session.close().await {
                warn!(session_id = %session.id, error = %e, "session close failed");
            }
        }
        for transport in self.inner.sender.outbound_transports() {
            if let Err(e) = transport.shutdown().await {
                warn!(transport = transport.name(), error = %e, "transport shutdown failed");
            }
        }
        self.inner.storage.close().await?;
        info!("agent shut down");
        Ok(())
    }

    fn grant_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.config.mediation.grant_timeout_ms)
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn connections(&self) -> &ConnectionService {
        &self.inner.connections
    }

    pub fn out_of_band(&self) -> &OutOfBandService {
        &self.inner.out_of_band
    }

    pub fn credentials(&self) -> &CredentialService {
        &self.inner.credentials
    }

    pub fn proofs(&self) -> &ProofService {
        &self.inner.proofs
    }

    pub fn mediation_recipient(&self) -> &MediationRecipientService {
        &self.inner.mediation_recipient
    }

    pub fn mediator(&self) -> &MediatorService {
        &self.inner.mediator
    }

    pub fn message_sender(&self) -> &MessageSender {
        &self.inner.sender
    }

    pub fn transport_service(&self) -> &TransportService {
        &self.inner.transport_service
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.inner.storage
    }
}
