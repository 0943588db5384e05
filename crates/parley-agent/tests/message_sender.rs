// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery order: open session, then services by scheme priority, then the queue.

mod common;

use std::sync::Arc;

use parley_agent::Delivery;
use parley_agent::connections::ConnectionRecord;
use parley_core::{
    AgentMessage, DidDoc, EnvelopeKeys, ParleyError, ReturnRoute, StorageAdapter, TransportSession,
};
use parley_test_utils::{MockSessionSink, MockTransport, TestAgent, TestNetwork};

use common::connect;

async fn ping(agent: &TestAgent, connection: &ConnectionRecord) -> AgentMessage {
    agent
        .connections()
        .create_trust_ping(&connection.id, false)
        .await
        .unwrap()
        .0
}

fn return_routed_session(
    sink: Arc<MockSessionSink>,
    connection: &ConnectionRecord,
    inbound: &AgentMessage,
) -> TransportSession {
    let mut inbound = inbound.clone();
    inbound.set_return_routing(ReturnRoute::All);
    let mut session = TransportSession::new("ws", sink);
    session.keys = Some(EnvelopeKeys {
        recipient_keys: vec![connection.their_key.clone().unwrap()],
        routing_keys: Vec::new(),
        sender_key: Some(connection.verkey.clone()),
    });
    session.inbound_message = Some(inbound);
    session.connection_id = Some(connection.id.clone());
    session
}

/// `connection` with the peer advertising `endpoints` instead of its real services.
fn with_peer_endpoints(connection: &ConnectionRecord, endpoints: &[&str]) -> ConnectionRecord {
    let mut connection = connection.clone();
    let endpoints: Vec<String> = endpoints.iter().map(|e| e.to_string()).collect();
    connection.their_did_doc = Some(DidDoc::for_endpoints(
        "did:peer:remote",
        connection.their_key.as_deref().unwrap(),
        &endpoints,
        &[],
    ));
    connection
}

#[tokio::test]
async fn open_session_is_used_before_any_transport() {
    let network = TestNetwork::new();
    let alice = network.spawn_agent("alice", |_| {}).await.unwrap();
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();
    let (alice_conn, _) = connect(&alice, &bob).await;

    let message = ping(&alice, &alice_conn).await;
    let sink = MockSessionSink::new();
    let session = return_routed_session(sink.clone(), &alice_conn, &message);
    let session_id = session.id.clone();
    alice.transport_service().save_session(session);

    let delivery = alice
        .message_sender()
        .send_to_connection(&message, &alice_conn)
        .await
        .unwrap();
    assert_eq!(delivery, Delivery::Session { session_id });
    assert_eq!(sink.sent_payloads().await.len(), 1);
}

#[tokio::test]
async fn failing_session_falls_through_to_services() {
    let network = TestNetwork::new();
    let alice = network.spawn_agent("alice", |_| {}).await.unwrap();
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();
    let (alice_conn, _) = connect(&alice, &bob).await;

    let message = ping(&alice, &alice_conn).await;
    let sink = MockSessionSink::broken();
    let session = return_routed_session(sink.clone(), &alice_conn, &message);
    let session_id = session.id.clone();
    alice.transport_service().save_session(session);

    let delivery = alice
        .message_sender()
        .send_to_connection(&message, &alice_conn)
        .await
        .unwrap();
    assert_eq!(
        delivery,
        Delivery::Transport {
            endpoint: "mem://bob".into()
        }
    );
    assert_eq!(sink.attempt_count(), 1);
    assert!(alice.transport_service().find_session_by_id(&session_id).is_none());
}

#[tokio::test]
async fn preferred_scheme_is_tried_first() {
    let network = TestNetwork::new();
    let ws = MockTransport::new("ws", &["ws"]);
    let http = MockTransport::new("http", &["http"]);
    let alice = network
        .spawn_agent_with(
            "alice",
            |c| c.transport.priority = vec!["ws".into(), "http".into()],
            |b| {
                b.with_outbound_transport(http.clone())
                    .with_outbound_transport(ws.clone())
            },
        )
        .await
        .unwrap();
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();
    let (alice_conn, _) = connect(&alice, &bob).await;
    let peer = with_peer_endpoints(&alice_conn, &["http://bob", "ws://bob"]);

    let message = ping(&alice, &alice_conn).await;
    let delivery = alice.message_sender().send_to_connection(&message, &peer).await.unwrap();
    assert_eq!(
        delivery,
        Delivery::Transport {
            endpoint: "ws://bob".into()
        }
    );
    assert_eq!(ws.sent_count().await, 1);
    assert_eq!(http.attempt_count(), 0);

    ws.set_failing(true);
    let delivery = alice.message_sender().send_to_connection(&message, &peer).await.unwrap();
    assert_eq!(
        delivery,
        Delivery::Transport {
            endpoint: "http://bob".into()
        }
    );
    assert_eq!(ws.attempt_count(), 2);
    assert_eq!(http.sent_count().await, 1);
}

#[tokio::test]
async fn restrictive_priority_drops_unlisted_schemes() {
    let network = TestNetwork::new();
    let http = MockTransport::new("http", &["http"]);
    let alice = network
        .spawn_agent_with(
            "alice",
            |c| {
                c.transport.priority = vec!["mem".into()];
                c.transport.restrictive = true;
            },
            |b| b.with_outbound_transport(http.clone()),
        )
        .await
        .unwrap();
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();
    let (alice_conn, _) = connect(&alice, &bob).await;
    let peer = with_peer_endpoints(&alice_conn, &["http://bob"]);

    let message = ping(&alice, &alice_conn).await;
    let err = alice
        .message_sender()
        .send_to_connection(&message, &peer)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Undeliverable { .. }));
    assert_eq!(http.attempt_count(), 0);
}

#[tokio::test]
async fn peer_without_endpoints_gets_the_message_queued() {
    let network = TestNetwork::new();
    let http = MockTransport::new("http", &["http"]);
    let alice = network
        .spawn_agent_with("alice", |_| {}, |b| b.with_outbound_transport(http.clone()))
        .await
        .unwrap();
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();
    let (alice_conn, _) = connect(&alice, &bob).await;
    let peer = with_peer_endpoints(&alice_conn, &[]);

    let message = ping(&alice, &alice_conn).await;
    let delivery = alice.message_sender().send_to_connection(&message, &peer).await.unwrap();
    assert_eq!(delivery, Delivery::Queued);
    assert_eq!(
        alice.storage().queued_message_count(&alice_conn.id).await.unwrap(),
        1
    );
    assert_eq!(http.attempt_count(), 0);
}
