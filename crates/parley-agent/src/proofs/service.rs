// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proof presentation state machine for present-proof 1.0 and 2.0.
//!
//! ```text
//! prover:   ProposalSent -> RequestReceived -> PresentationSent -> Done
//! verifier: ProposalReceived -> RequestSent -> PresentationReceived -> Done
//! ```
//!
//! Either side may open: the prover with a proposal, the verifier with a
//! request. A request may travel without a connection when it carries the
//! verifier's `~service`.

use std::sync::Arc;

use parley_bus::EventBus;
use parley_core::{
    AgentMessage, Attachment, MessageRole, ParleyError, ServiceDecorator, StorageAdapter, TagQuery,
};
use serde_json::json;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use super::messages::{
    PresentationBody, ProofMessageKind, ProofProtocolVersion, ProposePresentationBody,
    RequestPresentationBody,
};
use super::record::{ProofExchangeRecord, ProofRole, ProofState};
use crate::binding::assert_bound;
use crate::connections::{ConnectionRecord, ConnectionState};
use crate::context::InboundMessageContext;
use crate::credentials::messages::{attachment_json, has_attachment_data};
use crate::locks::{ExchangeGuard, ExchangeLocks};
use crate::message_repository::DidCommMessageRepository;
use crate::notification::{PRESENTATION_ABANDONED, ProblemReportBody, ack_message, problem_report_message};
use crate::record::{ExchangeRecord, assert_not_terminal, assert_role, assert_state};
use crate::repository::Repository;

const RECORD_TYPE: &str = ProofExchangeRecord::RECORD_TYPE;

#[derive(Debug, Clone)]
pub struct ProofProposalOptions {
    pub protocol_version: ProofProtocolVersion,
    pub comment: Option<String>,
    /// Opaque presentation preview.
    pub presentation_proposal: Option<serde_json::Value>,
    pub auto_accept: Option<bool>,
}

impl Default for ProofProposalOptions {
    fn default() -> Self {
        Self {
            protocol_version: ProofProtocolVersion::V1,
            comment: None,
            presentation_proposal: None,
            auto_accept: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProofRequestOptions {
    pub protocol_version: ProofProtocolVersion,
    pub comment: Option<String>,
    /// Opaque proof request payload.
    pub proof_request: serde_json::Value,
    pub auto_accept: Option<bool>,
    /// Our `~service`, for a request sent without a connection.
    pub service: Option<ServiceDecorator>,
}

impl Default for ProofRequestOptions {
    fn default() -> Self {
        Self {
            protocol_version: ProofProtocolVersion::V1,
            comment: None,
            proof_request: json!({}),
            auto_accept: None,
            service: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PresentationOptions {
    pub comment: Option<String>,
    /// Opaque presentation payload. Derived from the stored request when absent.
    pub presentation: Option<serde_json::Value>,
    pub service: Option<ServiceDecorator>,
}

pub struct ProofService {
    records: Repository<ProofExchangeRecord>,
    messages: DidCommMessageRepository,
    locks: ExchangeLocks,
    auto_accept: bool,
}

impl ProofService {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        bus: EventBus,
        locks: ExchangeLocks,
        auto_accept: bool,
    ) -> Self {
        Self {
            records: Repository::new(Arc::clone(&storage), bus),
            messages: DidCommMessageRepository::new(storage),
            locks,
            auto_accept,
        }
    }

    /// Prover opens with a proposal: `-> ProposalSent`.
    pub async fn create_proposal(
        &self,
        connection: &ConnectionRecord,
        options: ProofProposalOptions,
    ) -> Result<(AgentMessage, ProofExchangeRecord), ParleyError> {
        assert_connection_ready(connection)?;
        let message = AgentMessage::new(
            &ProofMessageKind::Proposal.message_type(options.protocol_version),
            &ProposePresentationBody {
                comment: options.comment,
                presentation_proposal: options.presentation_proposal,
            },
        )?;
        let record = ProofExchangeRecord::new(
            message.id.clone(),
            Some(connection.id.clone()),
            ProofState::ProposalSent,
            ProofRole::Prover,
            options.protocol_version,
            options.auto_accept.unwrap_or(self.auto_accept),
        );
        self.records.save(&record).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Prover counters a request: `RequestReceived -> ProposalSent`.
    pub async fn create_proposal_as_response(
        &self,
        record_id: &str,
        options: ProofProposalOptions,
    ) -> Result<(AgentMessage, ProofExchangeRecord), ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, ProofRole::Prover)?;
        assert_state(&record, &[ProofState::RequestReceived])?;

        let message = AgentMessage::new(
            &ProofMessageKind::Proposal.message_type(record.protocol_version),
            &ProposePresentationBody {
                comment: options.comment,
                presentation_proposal: options.presentation_proposal,
            },
        )?
        .with_thread_id(record.thread_id.clone());

        self.records.update_state(&mut record, ProofState::ProposalSent).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Verifier receives a proposal, opening an exchange or answering its request.
    pub async fn process_proposal(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ProofExchangeRecord, ParleyError> {
        let version = inbound_version(ctx)?;
        let connection = ctx.ready_connection()?;

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), Some(&connection.id)).await;
        let record = match self.find_by_thread_and_connection_id(ctx.thread_id(), Some(&connection.id)).await? {
            Some(mut record) => {
                assert_role(&record, record.role, ProofRole::Verifier)?;
                assert_state(&record, &[ProofState::RequestSent])?;
                assert_bound(ctx, &self.messages, &record.id, record.connection_id.as_deref()).await?;
                self.records.update_state(&mut record, ProofState::ProposalReceived).await?;
                record
            }
            None => {
                let record = ProofExchangeRecord::new(
                    ctx.thread_id(),
                    Some(connection.id.clone()),
                    ProofState::ProposalReceived,
                    ProofRole::Verifier,
                    version,
                    self.auto_accept,
                );
                self.records.save(&record).await?;
                record
            }
        };
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        Ok(record)
    }

    /// Verifier opens with a request: `-> RequestSent`.
    pub async fn create_request(
        &self,
        connection: Option<&ConnectionRecord>,
        options: ProofRequestOptions,
    ) -> Result<(AgentMessage, ProofExchangeRecord), ParleyError> {
        match connection {
            Some(connection) => assert_connection_ready(connection)?,
            None if options.service.is_none() => {
                return Err(ParleyError::InvalidMessage(
                    "a connection-less proof request needs a ~service decorator".into(),
                ));
            }
            None => {}
        }
        let mut message = request_message(options.protocol_version, options.comment, options.proof_request)?;
        message.service = options.service;

        let record = ProofExchangeRecord::new(
            message.id.clone(),
            connection.map(|c| c.id.clone()),
            ProofState::RequestSent,
            ProofRole::Verifier,
            options.protocol_version,
            options.auto_accept.unwrap_or(self.auto_accept),
        );
        self.records.save(&record).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        info!(record_id = %record.id, thread_id = %record.thread_id, "proof request created");
        Ok((message, record))
    }

    /// Verifier answers a proposal: `ProposalReceived -> RequestSent`.
    pub async fn create_request_as_response(
        &self,
        record_id: &str,
        options: ProofRequestOptions,
    ) -> Result<(AgentMessage, ProofExchangeRecord), ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, ProofRole::Verifier)?;
        assert_state(&record, &[ProofState::ProposalReceived])?;

        let message = request_message(record.protocol_version, options.comment, options.proof_request)?
            .with_thread_id(record.thread_id.clone());
        if let Some(auto_accept) = options.auto_accept {
            record.auto_accept = auto_accept;
        }
        self.records.update_state(&mut record, ProofState::RequestSent).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Prover receives a request, opening an exchange or answering its proposal.
    pub async fn process_request(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ProofExchangeRecord, ParleyError> {
        let version = inbound_version(ctx)?;
        let body: RequestPresentationBody = ctx.message.body()?;
        if !has_attachment_data(&body.request_presentations_attach) {
            return Err(ParleyError::problem_report(
                PRESENTATION_ABANDONED,
                format!(
                    "Missing required base64 or json encoded attachment data for presentation request with thread id {}",
                    ctx.thread_id()
                ),
            ));
        }
        if ctx.connection.is_some() {
            ctx.ready_connection()?;
        } else if ctx.message.service.is_none() {
            return Err(ParleyError::ThreadBinding(format!(
                "proof request {} has neither a connection nor a ~service",
                ctx.message.id
            )));
        }

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), ctx.connection_id()).await;
        let record = match self.find_by_thread_and_connection_id(ctx.thread_id(), ctx.connection_id()).await? {
            Some(mut record) => {
                assert_role(&record, record.role, ProofRole::Prover)?;
                assert_state(&record, &[ProofState::ProposalSent])?;
                assert_bound(ctx, &self.messages, &record.id, record.connection_id.as_deref()).await?;
                self.records.update_state(&mut record, ProofState::RequestReceived).await?;
                record
            }
            None => {
                let record = ProofExchangeRecord::new(
                    ctx.thread_id(),
                    ctx.connection_id().map(str::to_string),
                    ProofState::RequestReceived,
                    ProofRole::Prover,
                    version,
                    self.auto_accept,
                );
                self.records.save(&record).await?;
                record
            }
        };
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        debug!(record_id = %record.id, thread_id = ctx.thread_id(), "proof request processed");
        Ok(record)
    }

    /// Prover presents: `RequestReceived -> PresentationSent`.
    pub async fn create_presentation(
        &self,
        record_id: &str,
        options: PresentationOptions,
    ) -> Result<(AgentMessage, ProofExchangeRecord), ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, ProofRole::Prover)?;
        assert_state(&record, &[ProofState::RequestReceived])?;

        let version = record.protocol_version;
        let request: RequestPresentationBody = self
            .messages
            .get_agent_message(&record.id, &ProofMessageKind::Request.message_type(version))
            .await?
            .body()?;
        let Some(request_attachment) = request
            .request_presentations_attach
            .iter()
            .find(|a| a.data.json.is_some() || a.data.base64.is_some())
        else {
            return Err(ParleyError::problem_report(
                PRESENTATION_ABANDONED,
                format!(
                    "Missing required base64 or json encoded attachment data for presentation request with thread id {}",
                    record.thread_id
                ),
            ));
        };
        let presentation = options.presentation.unwrap_or_else(|| {
            json!({
                "request_attachment_id": request_attachment.id,
                "thread_id": record.thread_id,
            })
        });

        let mut message = AgentMessage::new(
            &ProofMessageKind::Presentation.message_type(version),
            &PresentationBody {
                comment: options.comment,
                presentations_attach: vec![Attachment::json(presentation)],
            },
        )?
        .with_thread_id(record.thread_id.clone());
        message.service = options.service;

        self.records.update_state(&mut record, ProofState::PresentationSent).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Verifier receives the presentation: `RequestSent -> PresentationReceived`.
    ///
    /// Cryptographic verification belongs to the credential format; a
    /// presentation counts as verified when it carries attachment data.
    pub async fn process_presentation(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ProofExchangeRecord, ParleyError> {
        let body: PresentationBody = ctx.message.body()?;

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), ctx.connection_id()).await;
        let mut record = self
            .get_by_thread_and_connection_id(ctx.thread_id(), ctx.connection_id())
            .await?;
        assert_role(&record, record.role, ProofRole::Verifier)?;
        assert_state(&record, &[ProofState::RequestSent])?;
        assert_bound(ctx, &self.messages, &record.id, record.connection_id.as_deref()).await?;

        if !has_attachment_data(&body.presentations_attach) {
            return Err(ParleyError::problem_report(
                PRESENTATION_ABANDONED,
                format!(
                    "Missing required base64 or json encoded attachment data for presentation with thread id {}",
                    ctx.thread_id()
                ),
            ));
        }
        record.presentation = attachment_json(&body.presentations_attach).cloned();
        record.is_verified = Some(true);
        self.records.update_state(&mut record, ProofState::PresentationReceived).await?;
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        Ok(record)
    }

    /// Verifier acknowledges: `PresentationReceived -> Done`.
    pub async fn create_ack(
        &self,
        record_id: &str,
    ) -> Result<(AgentMessage, ProofExchangeRecord), ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, ProofRole::Verifier)?;
        assert_state(&record, &[ProofState::PresentationReceived])?;

        let message = ack_message(
            &ProofMessageKind::Ack.message_type(record.protocol_version),
            &record.thread_id,
        )?;
        self.records.update_state(&mut record, ProofState::Done).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Prover receives the ack: `PresentationSent -> Done`.
    pub async fn process_ack(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ProofExchangeRecord, ParleyError> {
        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), ctx.connection_id()).await;
        let mut record = self
            .get_by_thread_and_connection_id(ctx.thread_id(), ctx.connection_id())
            .await?;
        assert_role(&record, record.role, ProofRole::Prover)?;
        assert_state(&record, &[ProofState::PresentationSent])?;
        assert_bound(ctx, &self.messages, &record.id, record.connection_id.as_deref()).await?;

        self.records.update_state(&mut record, ProofState::Done).await?;
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        info!(record_id = %record.id, "proof exchange done");
        Ok(record)
    }

    /// Prover refuses an open exchange: `-> Declined`.
    pub async fn decline_request(&self, record_id: &str) -> Result<ProofExchangeRecord, ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, ProofRole::Prover)?;
        assert_not_terminal(&record, &ProofState::iter().collect::<Vec<_>>())?;
        self.records.update_state(&mut record, ProofState::Declined).await?;
        Ok(record)
    }

    pub async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<ProofExchangeRecord, ParleyError> {
        let report: ProblemReportBody = ctx.message.body()?;

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), ctx.connection_id()).await;
        let mut record = self
            .get_by_thread_and_connection_id(ctx.thread_id(), ctx.connection_id())
            .await?;
        assert_not_terminal(&record, &ProofState::iter().collect::<Vec<_>>())?;

        record.error_message = Some(report.error_message());
        self.records.update_state(&mut record, ProofState::Abandoned).await?;
        Ok(record)
    }

    pub async fn create_problem_report(
        &self,
        record_id: &str,
        description: &str,
    ) -> Result<AgentMessage, ParleyError> {
        let record = self.records.get_by_id(record_id).await?;
        problem_report_message(
            &ProofMessageKind::ProblemReport.message_type(record.protocol_version),
            &record.thread_id,
            PRESENTATION_ABANDONED,
            description,
        )
    }

    pub async fn get_by_thread_and_connection_id(
        &self,
        thread_id: &str,
        connection_id: Option<&str>,
    ) -> Result<ProofExchangeRecord, ParleyError> {
        self.records
            .get_single_by_query(&thread_query(thread_id, connection_id))
            .await
    }

    pub async fn find_by_thread_and_connection_id(
        &self,
        thread_id: &str,
        connection_id: Option<&str>,
    ) -> Result<Option<ProofExchangeRecord>, ParleyError> {
        self.records
            .find_single_by_query(&thread_query(thread_id, connection_id))
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<ProofExchangeRecord, ParleyError> {
        self.records.get_by_id(id).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<ProofExchangeRecord>, ParleyError> {
        self.records.find_by_id(id).await
    }

    pub async fn get_all(&self) -> Result<Vec<ProofExchangeRecord>, ParleyError> {
        self.records.get_all().await
    }

    async fn lock_record(&self, record_id: &str) -> Result<(ExchangeGuard, ProofExchangeRecord), ParleyError> {
        let record = self.records.get_by_id(record_id).await?;
        let guard = self
            .locks
            .lock(RECORD_TYPE, &record.thread_id, record.connection_id.as_deref())
            .await;
        let record = self.records.get_by_id(record_id).await?;
        Ok((guard, record))
    }
}

fn thread_query(thread_id: &str, connection_id: Option<&str>) -> TagQuery {
    TagQuery::new()
        .with("threadId", thread_id)
        .with_opt("connectionId", connection_id)
}

fn inbound_version(ctx: &InboundMessageContext) -> Result<ProofProtocolVersion, ParleyError> {
    let message_type = ctx.message_type()?;
    ProofMessageKind::from_type(&message_type)
        .map(|(_, version)| version)
        .ok_or_else(|| ParleyError::UnsupportedProtocol {
            message_type: ctx.message.message_type.clone(),
        })
}

fn assert_connection_ready(connection: &ConnectionRecord) -> Result<(), ParleyError> {
    if connection.is_ready() {
        return Ok(());
    }
    Err(ParleyError::invalid_state(
        ConnectionRecord::RECORD_TYPE,
        connection.state,
        &[ConnectionState::Responded, ConnectionState::Complete],
    ))
}

fn request_message(
    version: ProofProtocolVersion,
    comment: Option<String>,
    proof_request: serde_json::Value,
) -> Result<AgentMessage, ParleyError> {
    AgentMessage::new(
        &ProofMessageKind::Request.message_type(version),
        &RequestPresentationBody {
            comment,
            request_presentations_attach: vec![Attachment::json(proof_request)],
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::{ConnectionRole, HandshakeProtocol};
    use chrono::Utc;
    use parley_config::model::StorageConfig;
    use parley_core::DidDoc;
    use parley_storage::SqliteStorage;
    use tempfile::TempDir;

    async fn service() -> (ProofService, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("proof.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        let service = ProofService::new(
            Arc::new(storage),
            EventBus::default(),
            ExchangeLocks::new(),
            false,
        );
        (service, dir)
    }

    fn connection(id: &str, ours: &str) -> ConnectionRecord {
        let now = Utc::now();
        let did = format!("did:peer:{ours}");
        let verkey = format!("{ours}-key");
        ConnectionRecord {
            id: id.into(),
            state: ConnectionState::Complete,
            role: ConnectionRole::Invitee,
            protocol: HandshakeProtocol::DidExchange,
            did_doc: DidDoc::for_endpoints(&did, &verkey, &[], &[]),
            did,
            verkey,
            their_did: None,
            their_key: None,
            their_did_doc: None,
            their_label: None,
            invitation: None,
            invitation_did: None,
            out_of_band_id: None,
            thread_id: None,
            auto_accept: true,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn request_options() -> ProofRequestOptions {
        ProofRequestOptions {
            proof_request: json!({"requested_attributes": {"name": {}}}),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn presentation_reaches_done_on_both_sides() {
        let (verifier, _d1) = service().await;
        let (prover, _d2) = service().await;
        let verifier_conn = connection("c-v", "verifier");
        let prover_conn = connection("c-p", "prover");

        let (request, verifier_record) =
            verifier.create_request(Some(&verifier_conn), request_options()).await.unwrap();
        let prover_record = prover
            .process_request(&InboundMessageContext::new(request).with_connection(prover_conn.clone()))
            .await
            .unwrap();
        assert_eq!(prover_record.state, ProofState::RequestReceived);

        let (presentation, prover_record) = prover
            .create_presentation(&prover_record.id, PresentationOptions::default())
            .await
            .unwrap();
        assert_eq!(prover_record.state, ProofState::PresentationSent);

        let verifier_record_after = verifier
            .process_presentation(
                &InboundMessageContext::new(presentation).with_connection(verifier_conn.clone()),
            )
            .await
            .unwrap();
        assert_eq!(verifier_record_after.id, verifier_record.id);
        assert_eq!(verifier_record_after.is_verified, Some(true));

        let (ack, verifier_record) = verifier.create_ack(&verifier_record.id).await.unwrap();
        assert_eq!(verifier_record.state, ProofState::Done);

        let ack_type = ProofMessageKind::Ack.message_type(verifier_record.protocol_version);
        assert_eq!(
            verifier.messages.get_agent_message(&verifier_record.id, &ack_type).await.unwrap(),
            ack
        );

        let prover_record = prover
            .process_ack(&InboundMessageContext::new(ack.clone()).with_connection(prover_conn))
            .await
            .unwrap();
        assert_eq!(prover_record.state, ProofState::Done);
        assert_eq!(
            prover.messages.get_agent_message(&prover_record.id, &ack_type).await.unwrap(),
            ack
        );
    }

    #[tokio::test]
    async fn presentation_cannot_skip_the_request() {
        let (prover, _d) = service().await;
        let (_, record) = prover
            .create_proposal(&connection("c-p", "prover"), ProofProposalOptions::default())
            .await
            .unwrap();
        let err = prover
            .create_presentation(&record.id, PresentationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidState { .. }));
        assert_eq!(prover.get_by_id(&record.id).await.unwrap().state, ProofState::ProposalSent);
    }

    #[tokio::test]
    async fn connectionless_request_is_bound_by_service_keys() {
        let (verifier, _d1) = service().await;
        let (prover, _d2) = service().await;
        let verifier_service = ServiceDecorator {
            recipient_keys: vec!["verifier-key".into()],
            routing_keys: vec![],
            service_endpoint: "http://verifier".into(),
        };

        let (request, _) = verifier
            .create_request(
                None,
                ProofRequestOptions {
                    service: Some(verifier_service),
                    ..request_options()
                },
            )
            .await
            .unwrap();
        let prover_record = prover
            .process_request(
                &InboundMessageContext::new(request)
                    .with_keys(Some("verifier-key".into()), Some("prover-key".into())),
            )
            .await
            .unwrap();
        assert!(prover_record.connection_id.is_none());

        let (presentation, _) = prover
            .create_presentation(
                &prover_record.id,
                PresentationOptions {
                    service: Some(ServiceDecorator {
                        recipient_keys: vec!["prover-key".into()],
                        routing_keys: vec![],
                        service_endpoint: "http://prover".into(),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let wrong = InboundMessageContext::new(presentation.clone())
            .with_keys(Some("prover-key".into()), Some("someone-else".into()));
        let err = verifier.process_presentation(&wrong).await.unwrap_err();
        assert!(matches!(err, ParleyError::ThreadBinding(_)));

        let right = InboundMessageContext::new(presentation)
            .with_keys(Some("prover-key".into()), Some("verifier-key".into()));
        let record = verifier.process_presentation(&right).await.unwrap();
        assert_eq!(record.state, ProofState::PresentationReceived);
    }

    #[tokio::test]
    async fn problem_report_abandons_the_exchange() {
        let (verifier, _d) = service().await;
        let conn = connection("c-v", "verifier");
        let (_, record) = verifier.create_request(Some(&conn), request_options()).await.unwrap();

        let report = problem_report_message(
            &ProofMessageKind::ProblemReport.message_type(ProofProtocolVersion::V1),
            &record.thread_id,
            "abandoned",
            "no such credential",
        )
        .unwrap();
        let record = verifier
            .process_problem_report(&InboundMessageContext::new(report).with_connection(conn))
            .await
            .unwrap();
        assert_eq!(record.state, ProofState::Abandoned);
        assert_eq!(record.error_message.as_deref(), Some("abandoned: no such credential"));
    }
}
