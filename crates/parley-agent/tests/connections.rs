// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end handshakes between two agents on an in-memory network.

use std::time::Duration;

use parley_agent::connections::{ConnectionRole, ConnectionState, HandshakeProtocol};
use parley_agent::oob::{CreateInvitationOptions, OutOfBandState};
use parley_agent::{Agent, ReceiveInvitationOptions};
use parley_core::ParleyError;
use parley_test_utils::{TestNetwork, eventually};

const WAIT: Duration = Duration::from_secs(5);

async fn connection_state(agent: &Agent, id: &str) -> Option<ConnectionState> {
    agent.connections().find_by_id(id).await.ok().flatten().map(|c| c.state)
}

#[tokio::test]
async fn legacy_invitation_completes_on_both_sides() {
    let network = TestNetwork::new();
    let alice = network.spawn_agent("alice", |_| {}).await.unwrap();
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();

    let (alice_conn, invitation) = alice.create_connection_invitation(None).await.unwrap();
    assert_eq!(alice_conn.state, ConnectionState::Invited);
    assert_eq!(alice_conn.role, ConnectionRole::Inviter);

    let bob_conn = bob.receive_connection_invitation(invitation, None).await.unwrap();
    assert_eq!(bob_conn.state, ConnectionState::Requested);

    assert!(
        eventually(WAIT, || async {
            connection_state(&alice, &alice_conn.id).await == Some(ConnectionState::Complete)
                && connection_state(&bob, &bob_conn.id).await == Some(ConnectionState::Complete)
        })
        .await
    );

    let alice_side = alice.connections().get_by_id(&alice_conn.id).await.unwrap();
    let bob_side = bob.connections().get_by_id(&bob_conn.id).await.unwrap();
    assert_eq!(alice_side.their_did.as_deref(), Some(bob_side.did.as_str()));
    assert_eq!(bob_side.their_key.as_deref(), Some(alice_side.verkey.as_str()));
    assert_eq!(bob_side.their_label.as_deref(), Some("alice"));
}

#[tokio::test]
async fn manual_acceptance_waits_for_the_invitee() {
    let network = TestNetwork::new();
    let alice = network.spawn_agent("alice", |_| {}).await.unwrap();
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();

    let (_, invitation) = alice.create_connection_invitation(None).await.unwrap();
    let bob_conn = bob
        .receive_connection_invitation(invitation, Some(false))
        .await
        .unwrap();
    assert_eq!(bob_conn.state, ConnectionState::Invited);

    // Nothing is sent until the invitee accepts.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        connection_state(&bob, &bob_conn.id).await,
        Some(ConnectionState::Invited)
    );

    let requested = bob.accept_invitation(&bob_conn.id).await.unwrap();
    assert_eq!(requested.state, ConnectionState::Requested);
    assert!(
        eventually(WAIT, || async {
            connection_state(&bob, &bob_conn.id).await == Some(ConnectionState::Complete)
        })
        .await
    );
}

#[tokio::test]
async fn out_of_band_did_exchange_completes() {
    let network = TestNetwork::new();
    let alice = network.spawn_agent("alice", |_| {}).await.unwrap();
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();

    let alice_oob = alice
        .create_out_of_band_invitation(&[HandshakeProtocol::DidExchange], CreateInvitationOptions::default())
        .await
        .unwrap();
    assert_eq!(alice_oob.state, OutOfBandState::AwaitResponse);

    let (bob_oob, bob_conn) = bob
        .receive_invitation_and_connect(alice_oob.invitation.clone(), ReceiveInvitationOptions::default())
        .await
        .unwrap();
    let bob_conn = bob_conn.expect("handshake invitation yields a connection");
    assert_eq!(bob_conn.protocol, HandshakeProtocol::DidExchange);
    assert_eq!(bob_oob.state, OutOfBandState::Done);

    assert!(
        eventually(WAIT, || async {
            let Ok(found) = alice.connections().find_by_out_of_band_id(&alice_oob.id).await else {
                return false;
            };
            found.first().is_some_and(|c| c.state == ConnectionState::Complete)
                && connection_state(&bob, &bob_conn.id).await == Some(ConnectionState::Complete)
        })
        .await
    );

    let alice_oob = alice.out_of_band().get_by_id(&alice_oob.id).await.unwrap();
    assert_eq!(alice_oob.state, OutOfBandState::Done);
}

#[tokio::test]
async fn invitation_without_protocols_or_requests_is_rejected() {
    let network = TestNetwork::new();
    let alice = network.spawn_agent("alice", |_| {}).await.unwrap();

    let err = alice
        .create_out_of_band_invitation(&[], CreateInvitationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::InvalidMessage(_)));
}
