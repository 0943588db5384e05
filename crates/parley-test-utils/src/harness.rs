// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory agent network for end-to-end testing.
//!
//! `TestNetwork` builds complete agents (temp SQLite storage, plain-JSON
//! envelope, mock wallet) and connects them through a `mem://{name}`
//! transport. Every delivery runs on its own task, like a real inbound
//! request. A package sent with `response_requested` gets a transport session
//! whose replies flow back to the sender; the session is dropped once the
//! receiving agent has processed the package, as an HTTP exchange would end.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parley_agent::{Agent, AgentBuilder};
use parley_config::model::ParleyConfig;
use parley_core::types::{AdapterType, HealthStatus};
use parley_core::{
    OutboundPackage, OutboundTransport, ParleyError, PluginAdapter, SessionSink, StorageAdapter,
    TransportSession,
};
use parley_storage::SqliteStorage;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::envelope::PlainEnvelope;
use crate::mock_wallet::{MockWallet, StaticResolver};

const SCHEME: &str = "mem";

type Registry = Arc<DashMap<String, Agent>>;

/// A set of agents that can reach each other by name.
#[derive(Clone, Default)]
pub struct TestNetwork {
    agents: Registry,
    resolver: Arc<StaticResolver>,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint under which agent `name` is reachable.
    pub fn endpoint(name: &str) -> String {
        format!("{SCHEME}://{name}")
    }

    /// Resolver shared by every agent on the network.
    pub fn resolver(&self) -> &Arc<StaticResolver> {
        &self.resolver
    }

    /// Builds an agent reachable at `mem://{name}`.
    ///
    /// `configure` runs after the defaults are filled in; clearing
    /// `agent.endpoints` there yields an agent that can only be reached
    /// through a mediator or a return-routed session.
    pub async fn spawn_agent(
        &self,
        name: &str,
        configure: impl FnOnce(&mut ParleyConfig),
    ) -> Result<TestAgent, ParleyError> {
        self.spawn_agent_with(name, configure, |builder| builder).await
    }

    /// Like [`spawn_agent`](Self::spawn_agent), with a hook to extend the
    /// builder (extra transports, a public DID).
    pub async fn spawn_agent_with(
        &self,
        name: &str,
        configure: impl FnOnce(&mut ParleyConfig),
        extend: impl FnOnce(AgentBuilder) -> AgentBuilder,
    ) -> Result<TestAgent, ParleyError> {
        let dir = TempDir::new().map_err(|e| ParleyError::Storage { source: e.into() })?;

        let mut config = ParleyConfig::default();
        config.agent.label = name.to_string();
        config.agent.endpoints = vec![Self::endpoint(name)];
        config.storage.database_path = dir.path().join("agent.db").to_string_lossy().into_owned();
        configure(&mut config);

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        let wallet = Arc::new(MockWallet::new(name));
        let transport = Arc::new(NetworkTransport {
            owner: name.to_string(),
            agents: Arc::clone(&self.agents),
        });
        let builder = Agent::builder(config, storage, Arc::new(PlainEnvelope), wallet.clone())
            .with_resolver(self.resolver.clone())
            .with_outbound_transport(transport);
        let agent = extend(builder).build()?;

        self.agents.insert(name.to_string(), agent.clone());
        debug!(agent = name, "test agent joined the network");
        Ok(TestAgent {
            agent,
            wallet,
            name: name.to_string(),
            _dir: dir,
        })
    }

    /// Takes `name` off the network; deliveries to it fail from now on.
    pub fn disconnect(&self, name: &str) {
        self.agents.remove(name);
    }
}

/// An agent on a [`TestNetwork`], with its wallet and temp storage.
pub struct TestAgent {
    pub agent: Agent,
    pub wallet: Arc<MockWallet>,
    pub name: String,
    _dir: TempDir,
}

impl Deref for TestAgent {
    type Target = Agent;

    fn deref(&self) -> &Agent {
        &self.agent
    }
}

struct NetworkTransport {
    owner: String,
    agents: Registry,
}

#[async_trait]
impl PluginAdapter for NetworkTransport {
    fn name(&self) -> &str {
        "mem"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl OutboundTransport for NetworkTransport {
    fn supported_schemes(&self) -> Vec<String> {
        vec![SCHEME.to_string()]
    }

    async fn send_message(&self, package: OutboundPackage) -> Result<(), ParleyError> {
        let peer_name = package
            .endpoint
            .strip_prefix("mem://")
            .ok_or_else(|| ParleyError::transport(format!("not a mem endpoint: {}", package.endpoint)))?;
        let peer = self
            .agents
            .get(peer_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ParleyError::transport(format!("{peer_name} is unreachable")))?;

        let session = package.response_requested.then(|| {
            let sink = ReturnSink {
                owner: self.owner.clone(),
                agents: Arc::clone(&self.agents),
            };
            TransportSession::new(SCHEME, Arc::new(sink))
        });
        let from = self.owner.clone();
        let to = peer_name.to_string();

        tokio::spawn(async move {
            let session_id = session.as_ref().map(|s| s.id.clone());
            if let Err(e) = peer.receive_message(&package.payload, session).await {
                warn!(%from, %to, error = %e, "inbound message failed");
            }
            if let Some(id) = session_id {
                peer.transport_service().remove_session(&id);
            }
        });
        Ok(())
    }
}

/// Carries replies on a session back to the agent that opened it.
struct ReturnSink {
    owner: String,
    agents: Registry,
}

#[async_trait]
impl SessionSink for ReturnSink {
    async fn send(&self, payload: Vec<u8>) -> Result<(), ParleyError> {
        let owner = self
            .agents
            .get(&self.owner)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ParleyError::transport(format!("{} hung up", self.owner)))?;
        tokio::spawn(async move {
            if let Err(e) = owner.receive_message(&payload, None).await {
                warn!(error = %e, "return-routed message failed");
            }
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

/// Polls `check` until it holds or `timeout` elapses. Returns the last outcome.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
