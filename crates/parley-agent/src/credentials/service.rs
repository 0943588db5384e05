// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential issuance state machine shared by issue-credential 1.0 and 2.0.
//!
//! ```text
//! holder: ProposalSent -> OfferReceived -> RequestSent -> CredentialReceived -> Done
//! issuer: ProposalReceived -> OfferSent -> RequestReceived -> CredentialIssued -> Done
//! holder: OfferReceived -> ProposalSent (counter proposal)
//! any non-terminal -> Declined (holder) | Abandoned (problem report)
//! ```
//!
//! Every operation takes the exchange lock, re-reads the record, asserts its
//! role and state, then persists the transition and stores the message.

use std::collections::BTreeMap;
use std::sync::Arc;

use parley_bus::EventBus;
use parley_core::{
    AgentMessage, Attachment, MessageRole, ParleyError, ServiceDecorator, StorageAdapter,
    Supplement, TagQuery,
};
use serde_json::json;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use super::messages::{
    CredentialMessageKind, CredentialPreview, CredentialPreviewAttribute,
    CredentialProtocolVersion, IssueCredentialBody, OfferCredentialBody, ProposeCredentialBody,
    RequestCredentialBody, attachment_json, has_attachment_data,
};
use super::record::{
    CredentialExchangeRecord, CredentialMetadata, CredentialMetadataKey, CredentialRole,
    CredentialState,
};
use crate::binding::assert_bound;
use crate::connections::{ConnectionRecord, ConnectionState};
use crate::context::InboundMessageContext;
use crate::locks::{ExchangeGuard, ExchangeLocks};
use crate::message_repository::DidCommMessageRepository;
use crate::notification::{ISSUANCE_ABANDONED, ProblemReportBody, ack_message, problem_report_message};
use crate::record::{ExchangeRecord, assert_not_terminal, assert_role, assert_state};
use crate::repository::Repository;

const RECORD_TYPE: &str = CredentialExchangeRecord::RECORD_TYPE;

#[derive(Debug, Clone)]
pub struct CredentialProposalOptions {
    pub protocol_version: CredentialProtocolVersion,
    pub attributes: Vec<CredentialPreviewAttribute>,
    pub credential_definition_id: Option<String>,
    pub comment: Option<String>,
    /// Sent on 2.0 messages only.
    pub supplements: Vec<Supplement>,
    pub auto_accept: Option<bool>,
}

impl Default for CredentialProposalOptions {
    fn default() -> Self {
        Self {
            protocol_version: CredentialProtocolVersion::V1,
            attributes: Vec::new(),
            credential_definition_id: None,
            comment: None,
            supplements: Vec::new(),
            auto_accept: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialOfferOptions {
    pub protocol_version: CredentialProtocolVersion,
    pub attributes: Vec<CredentialPreviewAttribute>,
    pub credential_definition_id: Option<String>,
    /// Opaque offer payload. Derived from the definition id when absent.
    pub offer: Option<serde_json::Value>,
    pub comment: Option<String>,
    pub supplements: Vec<Supplement>,
    pub auto_accept: Option<bool>,
    /// Our `~service`, for an offer sent without a connection.
    pub service: Option<ServiceDecorator>,
}

impl Default for CredentialOfferOptions {
    fn default() -> Self {
        Self {
            protocol_version: CredentialProtocolVersion::V1,
            attributes: Vec::new(),
            credential_definition_id: None,
            offer: None,
            comment: None,
            supplements: Vec::new(),
            auto_accept: None,
            service: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialRequestOptions {
    pub comment: Option<String>,
    /// Opaque request payload. Derived from the stored offer when absent.
    pub request: Option<serde_json::Value>,
    /// Holder secret needed later to accept the credential.
    pub request_metadata: Option<serde_json::Value>,
    pub service: Option<ServiceDecorator>,
    pub auto_accept: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialIssueOptions {
    pub comment: Option<String>,
    /// Opaque credential payload. Built from the record's attributes when absent.
    pub credential: Option<serde_json::Value>,
    pub supplements: Vec<Supplement>,
}

pub struct CredentialService {
    records: Repository<CredentialExchangeRecord>,
    messages: DidCommMessageRepository,
    locks: ExchangeLocks,
    auto_accept: bool,
}

impl CredentialService {
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

    /// Holder opens an exchange with a proposal: `-> ProposalSent`.
    pub async fn create_proposal(
        &self,
        connection: &ConnectionRecord,
        options: CredentialProposalOptions,
    ) -> Result<(AgentMessage, CredentialExchangeRecord), ParleyError> {
        assert_connection_ready(connection)?;
        let version = options.protocol_version;
        let message = AgentMessage::new(
            &CredentialMessageKind::Proposal.message_type(version),
            &ProposeCredentialBody {
                comment: options.comment,
                credential_preview: preview(&options.attributes),
                cred_def_id: options.credential_definition_id.clone(),
                supplements: supplements_for(version, options.supplements),
            },
        )?;

        let mut record = CredentialExchangeRecord::new(
            message.id.clone(),
            Some(connection.id.clone()),
            CredentialState::ProposalSent,
            CredentialRole::Holder,
            version,
            options.auto_accept.unwrap_or(self.auto_accept),
        );
        record.credential_attributes = options.attributes;
        if let Some(id) = options.credential_definition_id {
            record.metadata.set(CredentialMetadata::CredentialDefinitionId(id));
        }
        self.records.save(&record).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Issuer receives a proposal, opening an exchange or answering its own offer.
    pub async fn process_proposal(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, ParleyError> {
        let version = inbound_version(ctx)?;
        let connection = ctx.ready_connection()?;
        let body: ProposeCredentialBody = ctx.message.body()?;
        let attributes = body.credential_preview.map(|p| p.attributes).unwrap_or_default();

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), Some(&connection.id)).await;
        let record = match self.find_by_thread_and_connection_id(ctx.thread_id(), Some(&connection.id)).await? {
            Some(mut record) => {
                assert_role(&record, record.role, CredentialRole::Issuer)?;
                assert_state(&record, &[CredentialState::OfferSent])?;
                assert_bound(ctx, &self.messages, &record.id, record.connection_id.as_deref()).await?;
                if !attributes.is_empty() {
                    record.credential_attributes = attributes;
                }
                self.records.update_state(&mut record, CredentialState::ProposalReceived).await?;
                record
            }
            None => {
                let mut record = CredentialExchangeRecord::new(
                    ctx.thread_id(),
                    Some(connection.id.clone()),
                    CredentialState::ProposalReceived,
                    CredentialRole::Issuer,
                    version,
                    self.auto_accept,
                );
                record.credential_attributes = attributes;
                if let Some(id) = body.cred_def_id {
                    record.metadata.set(CredentialMetadata::CredentialDefinitionId(id));
                }
                self.records.save(&record).await?;
                record
            }
        };
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        debug!(record_id = %record.id, thread_id = ctx.thread_id(), "credential proposal processed");
        Ok(record)
    }

    /// Issuer opens an exchange with an offer: `-> OfferSent`.
    ///
    /// Without a connection the offer must carry our `~service`.
    pub async fn create_offer(
        &self,
        connection: Option<&ConnectionRecord>,
        options: CredentialOfferOptions,
    ) -> Result<(AgentMessage, CredentialExchangeRecord), ParleyError> {
        match connection {
            Some(connection) => assert_connection_ready(connection)?,
            None if options.service.is_none() => {
                return Err(ParleyError::InvalidMessage(
                    "a connection-less offer needs a ~service decorator".into(),
                ));
            }
            None => {}
        }
        let version = options.protocol_version;
        let mut message = offer_message(version, &options, &options.attributes)?;
        message.service = options.service.clone();

        let mut record = CredentialExchangeRecord::new(
            message.id.clone(),
            connection.map(|c| c.id.clone()),
            CredentialState::OfferSent,
            CredentialRole::Issuer,
            version,
            options.auto_accept.unwrap_or(self.auto_accept),
        );
        record.credential_attributes = options.attributes;
        if let Some(id) = options.credential_definition_id {
            record.metadata.set(CredentialMetadata::CredentialDefinitionId(id));
        }
        self.records.save(&record).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        info!(record_id = %record.id, thread_id = %record.thread_id, "credential offer created");
        Ok((message, record))
    }

    /// Issuer answers a proposal: `ProposalReceived -> OfferSent`.
    pub async fn create_offer_as_response(
        &self,
        record_id: &str,
        options: CredentialOfferOptions,
    ) -> Result<(AgentMessage, CredentialExchangeRecord), ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, CredentialRole::Issuer)?;
        assert_state(&record, &[CredentialState::ProposalReceived])?;

        if !options.attributes.is_empty() {
            record.credential_attributes = options.attributes.clone();
        }
        let mut message = offer_message(record.protocol_version, &options, &record.credential_attributes)?;
        message.set_thread_id(record.thread_id.clone());
        if let Some(id) = options.credential_definition_id {
            record.metadata.set(CredentialMetadata::CredentialDefinitionId(id));
        }
        if let Some(auto_accept) = options.auto_accept {
            record.auto_accept = auto_accept;
        }

        self.records.update_state(&mut record, CredentialState::OfferSent).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Holder receives an offer, opening an exchange or answering its proposal.
    pub async fn process_offer(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, ParleyError> {
        let version = inbound_version(ctx)?;
        let body: OfferCredentialBody = ctx.message.body()?;
        if !has_attachment_data(&body.offers_attach) {
            return Err(ParleyError::problem_report(
                ISSUANCE_ABANDONED,
                format!(
                    "Missing required base64 or json encoded attachment data for credential offer with thread id {}",
                    ctx.thread_id()
                ),
            ));
        }
        if ctx.connection.is_some() {
            ctx.ready_connection()?;
        } else if ctx.message.service.is_none() {
            return Err(ParleyError::ThreadBinding(format!(
                "credential offer {} has neither a connection nor a ~service",
                ctx.message.id
            )));
        }
        let attributes = body.credential_preview.map(|p| p.attributes).unwrap_or_default();

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), ctx.connection_id()).await;
        let record = match self.find_by_thread_and_connection_id(ctx.thread_id(), ctx.connection_id()).await? {
            Some(mut record) => {
                assert_role(&record, record.role, CredentialRole::Holder)?;
                assert_state(&record, &[CredentialState::ProposalSent])?;
                assert_bound(ctx, &self.messages, &record.id, record.connection_id.as_deref()).await?;
                if !attributes.is_empty() {
                    record.credential_attributes = attributes;
                }
                self.records.update_state(&mut record, CredentialState::OfferReceived).await?;
                record
            }
            None => {
                let mut record = CredentialExchangeRecord::new(
                    ctx.thread_id(),
                    ctx.connection_id().map(str::to_string),
                    CredentialState::OfferReceived,
                    CredentialRole::Holder,
                    version,
                    self.auto_accept,
                );
                record.credential_attributes = attributes;
                self.records.save(&record).await?;
                record
            }
        };
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        debug!(record_id = %record.id, thread_id = ctx.thread_id(), "credential offer processed");
        Ok(record)
    }

    /// Holder counters an offer: `OfferReceived -> ProposalSent`.
    pub async fn create_proposal_as_response(
        &self,
        record_id: &str,
        options: CredentialProposalOptions,
    ) -> Result<(AgentMessage, CredentialExchangeRecord), ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, CredentialRole::Holder)?;
        assert_state(&record, &[CredentialState::OfferReceived])?;

        let version = record.protocol_version;
        let mut message = AgentMessage::new(
            &CredentialMessageKind::Proposal.message_type(version),
            &ProposeCredentialBody {
                comment: options.comment,
                credential_preview: preview(&options.attributes),
                cred_def_id: options.credential_definition_id,
                supplements: supplements_for(version, options.supplements),
            },
        )?;
        message.set_thread_id(record.thread_id.clone());
        if !options.attributes.is_empty() {
            record.credential_attributes = options.attributes;
        }

        self.records.update_state(&mut record, CredentialState::ProposalSent).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Holder accepts an offer: `OfferReceived -> RequestSent`.
    ///
    /// The request is derived from the stored offer, so repeating the call with
    /// the same options yields the same request payload.
    pub async fn create_request(
        &self,
        record_id: &str,
        options: CredentialRequestOptions,
    ) -> Result<(AgentMessage, CredentialExchangeRecord), ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, CredentialRole::Holder)?;
        assert_state(&record, &[CredentialState::OfferReceived])?;

        let version = record.protocol_version;
        let stored_offer = self
            .messages
            .find_agent_message(&record.id, &CredentialMessageKind::Offer.message_type(version))
            .await?;
        let offer = stored_offer
            .as_ref()
            .map(|m| m.body::<OfferCredentialBody>())
            .transpose()?;
        let Some(offer_attachment) = offer
            .as_ref()
            .and_then(|o| o.offers_attach.iter().find(|a| a.data.json.is_some() || a.data.base64.is_some()))
        else {
            return Err(ParleyError::problem_report(
                ISSUANCE_ABANDONED,
                format!(
                    "Missing required base64 or json encoded attachment data for credential offer with thread id {}",
                    record.thread_id
                ),
            ));
        };

        let request = options.request.unwrap_or_else(|| {
            json!({
                "offer_attachment_id": offer_attachment.id,
                "thread_id": record.thread_id,
            })
        });
        let request_metadata = options.request_metadata.unwrap_or_else(|| {
            json!({
                "offer_attachment_id": offer_attachment.id,
                "offer": offer_attachment.data.json,
            })
        });

        let mut message = AgentMessage::new(
            &CredentialMessageKind::Request.message_type(version),
            &RequestCredentialBody {
                comment: options.comment,
                requests_attach: vec![Attachment::json(request)],
            },
        )?;
        message.set_thread_id(record.thread_id.clone());
        message.service = options.service;

        record.metadata.set(CredentialMetadata::RequestMetadata(request_metadata));
        if let Some(auto_accept) = options.auto_accept {
            record.auto_accept = auto_accept;
        }
        self.records.update_state(&mut record, CredentialState::RequestSent).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Issuer receives the holder's request: `OfferSent -> RequestReceived`.
    pub async fn process_request(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, ParleyError> {
        let body: RequestCredentialBody = ctx.message.body()?;
        if !has_attachment_data(&body.requests_attach) {
            return Err(ParleyError::problem_report(
                ISSUANCE_ABANDONED,
                format!(
                    "Missing required base64 or json encoded attachment data for credential request with thread id {}",
                    ctx.thread_id()
                ),
            ));
        }

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), ctx.connection_id()).await;
        let mut record = self
            .get_by_thread_and_connection_id(ctx.thread_id(), ctx.connection_id())
            .await?;
        assert_role(&record, record.role, CredentialRole::Issuer)?;
        assert_state(&record, &[CredentialState::OfferSent])?;
        assert_bound(ctx, &self.messages, &record.id, record.connection_id.as_deref()).await?;

        self.records.update_state(&mut record, CredentialState::RequestReceived).await?;
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        Ok(record)
    }

    /// Issuer issues: `RequestReceived -> CredentialIssued`.
    pub async fn create_credential(
        &self,
        record_id: &str,
        options: CredentialIssueOptions,
    ) -> Result<(AgentMessage, CredentialExchangeRecord), ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, CredentialRole::Issuer)?;
        assert_state(&record, &[CredentialState::RequestReceived])?;

        let version = record.protocol_version;
        self.messages
            .get_agent_message(&record.id, &CredentialMessageKind::Request.message_type(version))
            .await?;

        let credential = match options.credential {
            Some(credential) => credential,
            None if record.credential_attributes.is_empty() => {
                return Err(ParleyError::problem_report(
                    ISSUANCE_ABANDONED,
                    format!(
                        "Missing required credential attribute values on credential record with id {}",
                        record.id
                    ),
                ));
            }
            None => {
                let values: BTreeMap<&str, &str> = record
                    .credential_attributes
                    .iter()
                    .map(|a| (a.name.as_str(), a.value.as_str()))
                    .collect();
                let cred_def_id = match record.metadata.get(CredentialMetadataKey::CredentialDefinitionId) {
                    Some(CredentialMetadata::CredentialDefinitionId(id)) => Some(id.clone()),
                    _ => None,
                };
                json!({ "values": values, "cred_def_id": cred_def_id })
            }
        };

        let mut message = AgentMessage::new(
            &CredentialMessageKind::Credential.message_type(version),
            &IssueCredentialBody {
                comment: options.comment,
                credentials_attach: vec![Attachment::json(credential)],
                supplements: supplements_for(version, options.supplements),
            },
        )?;
        message.set_thread_id(record.thread_id.clone());

        self.records.update_state(&mut record, CredentialState::CredentialIssued).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        info!(record_id = %record.id, thread_id = %record.thread_id, "credential issued");
        Ok((message, record))
    }

    /// Holder receives the credential: `RequestSent -> CredentialReceived`.
    pub async fn process_credential(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, ParleyError> {
        let body: IssueCredentialBody = ctx.message.body()?;

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), ctx.connection_id()).await;
        let mut record = self
            .get_by_thread_and_connection_id(ctx.thread_id(), ctx.connection_id())
            .await?;
        assert_role(&record, record.role, CredentialRole::Holder)?;
        assert_state(&record, &[CredentialState::RequestSent])?;
        assert_bound(ctx, &self.messages, &record.id, record.connection_id.as_deref()).await?;

        if record.metadata.get(CredentialMetadataKey::RequestMetadata).is_none() {
            return Err(ParleyError::problem_report(
                ISSUANCE_ABANDONED,
                format!("Missing required request metadata for credential with id {}", record.id),
            ));
        }
        let credential = attachment_json(&body.credentials_attach).cloned().or_else(|| {
            body.credentials_attach
                .iter()
                .find_map(|a| a.data.base64.clone())
                .map(serde_json::Value::String)
        });
        let Some(credential) = credential else {
            return Err(ParleyError::problem_report(
                ISSUANCE_ABANDONED,
                format!(
                    "Missing required base64 or json encoded attachment data for credential with thread id {}",
                    ctx.thread_id()
                ),
            ));
        };

        record.credential = Some(credential);
        self.records.update_state(&mut record, CredentialState::CredentialReceived).await?;
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        Ok(record)
    }

    /// Holder acknowledges the credential: `CredentialReceived -> Done`.
    pub async fn create_ack(
        &self,
        record_id: &str,
    ) -> Result<(AgentMessage, CredentialExchangeRecord), ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, CredentialRole::Holder)?;
        assert_state(&record, &[CredentialState::CredentialReceived])?;

        let message = ack_message(
            &CredentialMessageKind::Ack.message_type(record.protocol_version),
            &record.thread_id,
        )?;
        self.records.update_state(&mut record, CredentialState::Done).await?;
        self.messages
            .save_agent_message(MessageRole::Sender, &message, &record.id)
            .await?;
        Ok((message, record))
    }

    /// Issuer receives the holder's ack: `CredentialIssued -> Done`.
    pub async fn process_ack(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, ParleyError> {
        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), ctx.connection_id()).await;
        let mut record = self
            .get_by_thread_and_connection_id(ctx.thread_id(), ctx.connection_id())
            .await?;
        assert_role(&record, record.role, CredentialRole::Issuer)?;
        assert_state(&record, &[CredentialState::CredentialIssued])?;
        assert_bound(ctx, &self.messages, &record.id, record.connection_id.as_deref()).await?;

        self.records.update_state(&mut record, CredentialState::Done).await?;
        self.messages
            .save_agent_message(MessageRole::Receiver, &ctx.message, &record.id)
            .await?;
        info!(record_id = %record.id, "credential exchange done");
        Ok(record)
    }

    /// Holder walks away from an open exchange: `-> Declined`.
    pub async fn decline_offer(&self, record_id: &str) -> Result<CredentialExchangeRecord, ParleyError> {
        let (_guard, mut record) = self.lock_record(record_id).await?;
        assert_role(&record, record.role, CredentialRole::Holder)?;
        assert_not_terminal(&record, &CredentialState::iter().collect::<Vec<_>>())?;
        self.records.update_state(&mut record, CredentialState::Declined).await?;
        Ok(record)
    }

    /// A peer's problem report: any non-terminal record `-> Abandoned`.
    pub async fn process_problem_report(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<CredentialExchangeRecord, ParleyError> {
        let report: ProblemReportBody = ctx.message.body()?;

        let _guard = self.locks.lock(RECORD_TYPE, ctx.thread_id(), ctx.connection_id()).await;
        let mut record = self
            .get_by_thread_and_connection_id(ctx.thread_id(), ctx.connection_id())
            .await?;
        assert_not_terminal(&record, &CredentialState::iter().collect::<Vec<_>>())?;

        record.error_message = Some(report.error_message());
        self.records.update_state(&mut record, CredentialState::Abandoned).await?;
        Ok(record)
    }

    /// A problem report on the record's thread. The record is left unchanged.
    pub async fn create_problem_report(
        &self,
        record_id: &str,
        description: &str,
    ) -> Result<AgentMessage, ParleyError> {
        let record = self.records.get_by_id(record_id).await?;
        problem_report_message(
            &CredentialMessageKind::ProblemReport.message_type(record.protocol_version),
            &record.thread_id,
            ISSUANCE_ABANDONED,
            description,
        )
    }

    pub async fn get_by_thread_and_connection_id(
        &self,
        thread_id: &str,
        connection_id: Option<&str>,
    ) -> Result<CredentialExchangeRecord, ParleyError> {
        self.records
            .get_single_by_query(&thread_query(thread_id, connection_id))
            .await
    }

    pub async fn find_by_thread_and_connection_id(
        &self,
        thread_id: &str,
        connection_id: Option<&str>,
    ) -> Result<Option<CredentialExchangeRecord>, ParleyError> {
        self.records
            .find_single_by_query(&thread_query(thread_id, connection_id))
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<CredentialExchangeRecord, ParleyError> {
        self.records.get_by_id(id).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<CredentialExchangeRecord>, ParleyError> {
        self.records.find_by_id(id).await
    }

    pub async fn get_all(&self) -> Result<Vec<CredentialExchangeRecord>, ParleyError> {
        self.records.get_all().await
    }

    pub fn messages(&self) -> &DidCommMessageRepository {
        &self.messages
    }

    async fn lock_record(
        &self,
        record_id: &str,
    ) -> Result<(ExchangeGuard, CredentialExchangeRecord), ParleyError> {
        let record = self.records.get_by_id(record_id).await?;
        let guard = self
            .locks
            .lock(RECORD_TYPE, &record.thread_id, record.connection_id.as_deref())
            .await;
        // Another task may have advanced the record while we waited.
        let record = self.records.get_by_id(record_id).await?;
        Ok((guard, record))
    }
}

fn thread_query(thread_id: &str, connection_id: Option<&str>) -> TagQuery {
    TagQuery::new()
        .with("threadId", thread_id)
        .with_opt("connectionId", connection_id)
}

fn inbound_version(ctx: &InboundMessageContext) -> Result<CredentialProtocolVersion, ParleyError> {
    let message_type = ctx.message_type()?;
    CredentialMessageKind::from_type(&message_type)
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

fn preview(attributes: &[CredentialPreviewAttribute]) -> Option<CredentialPreview> {
    (!attributes.is_empty()).then(|| CredentialPreview {
        attributes: attributes.to_vec(),
    })
}

fn supplements_for(version: CredentialProtocolVersion, supplements: Vec<Supplement>) -> Vec<Supplement> {
    if version.supports_supplements() {
        supplements
    } else {
        Vec::new()
    }
}

fn offer_message(
    version: CredentialProtocolVersion,
    options: &CredentialOfferOptions,
    attributes: &[CredentialPreviewAttribute],
) -> Result<AgentMessage, ParleyError> {
    let offer = options.offer.clone().unwrap_or_else(|| {
        json!({
            "cred_def_id": options.credential_definition_id,
            "attribute_names": attributes.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        })
    });
    AgentMessage::new(
        &CredentialMessageKind::Offer.message_type(version),
        &OfferCredentialBody {
            comment: options.comment.clone(),
            credential_preview: preview(attributes),
            offers_attach: vec![Attachment::json(offer)],
            supplements: supplements_for(version, options.supplements.clone()),
        },
    )
}
