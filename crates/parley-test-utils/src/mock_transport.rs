// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock outbound transport and session sink for deterministic testing.
//!
//! Both capture what the agent hands them so tests can assert on delivery
//! order and counts, and both can be switched to fail every send.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parley_core::types::{AdapterType, HealthStatus};
use parley_core::{OutboundPackage, OutboundTransport, ParleyError, PluginAdapter, SessionSink};
use tokio::sync::Mutex;

/// A mock outbound transport for a fixed set of schemes.
pub struct MockTransport {
    name: String,
    schemes: Vec<String>,
    fail: AtomicBool,
    attempts: AtomicUsize,
    sent: Mutex<Vec<OutboundPackage>>,
}

impl MockTransport {
    pub fn new(name: &str, schemes: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            schemes: schemes.iter().map(|s| s.to_string()).collect(),
            fail: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// A transport whose every send fails.
    pub fn failing(name: &str, schemes: &[&str]) -> Arc<Self> {
        let transport = Self::new(name, schemes);
        transport.set_failing(true);
        transport
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Packages that were delivered successfully.
    pub async fn sent_packages(&self) -> Vec<OutboundPackage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Sends attempted, including failed ones.
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        &self.name
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
impl OutboundTransport for MockTransport {
    fn supported_schemes(&self) -> Vec<String> {
        self.schemes.clone()
    }

    async fn send_message(&self, package: OutboundPackage) -> Result<(), ParleyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ParleyError::transport(format!(
                "{} refused delivery to {}",
                self.name, package.endpoint
            )));
        }
        self.sent.lock().await.push(package);
        Ok(())
    }
}

/// Write half of a fake inbound connection.
#[derive(Default)]
pub struct MockSessionSink {
    fail: AtomicBool,
    closed: AtomicBool,
    attempts: AtomicUsize,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockSessionSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A sink whose peer has already gone away.
    pub fn broken() -> Arc<Self> {
        let sink = Self::new();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub async fn sent_payloads(&self) -> Vec<Vec<u8>> {
        self.sent.lock().await.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionSink for MockSessionSink {
    async fn send(&self, payload: Vec<u8>) -> Result<(), ParleyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) || self.is_closed() {
            return Err(ParleyError::transport("session peer disconnected"));
        }
        self.sent.lock().await.push(payload);
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(endpoint: &str) -> OutboundPackage {
        OutboundPackage {
            payload: b"{}".to_vec(),
            endpoint: endpoint.into(),
            response_requested: false,
            connection_id: None,
        }
    }

    #[tokio::test]
    async fn send_captures_packages() {
        let transport = MockTransport::new("http", &["http", "https"]);
        transport.send_message(package("http://peer")).await.unwrap();
        assert_eq!(transport.sent_count().await, 1);
        assert_eq!(transport.sent_packages().await[0].endpoint, "http://peer");
        assert_eq!(transport.supported_schemes(), vec!["http", "https"]);
    }

    #[tokio::test]
    async fn failing_transport_counts_attempts_only() {
        let transport = MockTransport::failing("ws", &["ws"]);
        assert!(transport.send_message(package("ws://peer")).await.is_err());
        assert_eq!(transport.attempt_count(), 1);
        assert_eq!(transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn closed_sink_rejects_sends() {
        let sink = MockSessionSink::new();
        sink.send(vec![1]).await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.send(vec![2]).await.is_err());
        assert_eq!(sink.sent_payloads().await, vec![vec![1]]);
        assert_eq!(sink.attempt_count(), 2);
    }
}
