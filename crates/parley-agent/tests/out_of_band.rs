// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Out-of-band invitations published under a public DID, with connection reuse.

mod common;

use parley_agent::ReceiveInvitationOptions;
use parley_agent::connections::{ConnectionState, HandshakeProtocol};
use parley_agent::oob::{CreateInvitationOptions, OutOfBandRecord, OutOfBandState};
use parley_core::{DidDoc, DidInfo};
use parley_test_utils::{TestAgent, TestNetwork, eventually};

use common::WAIT;

const PUBLIC_DID: &str = "did:sov:alice";
const PUBLIC_KEY: &str = "alice-public";

async fn spawn_public_inviter(network: &TestNetwork) -> TestAgent {
    network
        .resolver()
        .insert(DidDoc::for_endpoints(
            PUBLIC_DID,
            PUBLIC_KEY,
            &[TestNetwork::endpoint("alice")],
            &[],
        ))
        .await;
    network
        .spawn_agent_with(
            "alice",
            |_| {},
            |b| {
                b.with_public_did(DidInfo {
                    did: PUBLIC_DID.into(),
                    verkey: PUBLIC_KEY.into(),
                })
            },
        )
        .await
        .unwrap()
}

async fn public_invitation(alice: &TestAgent) -> OutOfBandRecord {
    alice
        .create_out_of_band_invitation(
            &[HandshakeProtocol::DidExchange],
            CreateInvitationOptions {
                public_did: Some(PUBLIC_DID.into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

async fn complete_count(agent: &TestAgent) -> usize {
    agent
        .connections()
        .get_all()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|c| c.state == ConnectionState::Complete)
        .count()
}

#[tokio::test]
async fn second_invitation_reuses_the_existing_connection() {
    let network = TestNetwork::new();
    let alice = spawn_public_inviter(&network).await;
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();

    let first = public_invitation(&alice).await;
    assert_eq!(first.invitation.dids(), vec![PUBLIC_DID]);
    let (_, existing) = bob
        .receive_invitation_and_connect(first.invitation.clone(), ReceiveInvitationOptions::default())
        .await
        .unwrap();
    let existing = existing.unwrap();
    assert_eq!(existing.invitation_did.as_deref(), Some(PUBLIC_DID));
    assert!(
        eventually(WAIT, || async {
            complete_count(&alice).await == 1 && complete_count(&bob).await == 1
        })
        .await
    );

    let second = public_invitation(&alice).await;
    let (bob_oob, reused) = bob
        .receive_invitation_and_connect(second.invitation.clone(), ReceiveInvitationOptions::default())
        .await
        .unwrap();
    assert_eq!(reused.unwrap().id, existing.id);
    assert_eq!(bob_oob.state, OutOfBandState::Done);
    assert_eq!(bob_oob.reuse_connection_id.as_deref(), Some(existing.id.as_str()));

    assert!(
        eventually(WAIT, || async {
            alice
                .out_of_band()
                .get_by_id(&second.id)
                .await
                .is_ok_and(|r| r.state == OutOfBandState::Done && r.reuse_connection_id.is_some())
        })
        .await
    );
    assert_eq!(alice.connections().get_all().await.unwrap().len(), 1);
    assert_eq!(bob.connections().get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn reuse_can_be_turned_off() {
    let network = TestNetwork::new();
    let alice = spawn_public_inviter(&network).await;
    let bob = network.spawn_agent("bob", |_| {}).await.unwrap();

    let first = public_invitation(&alice).await;
    bob.receive_invitation_and_connect(first.invitation.clone(), ReceiveInvitationOptions::default())
        .await
        .unwrap();
    assert!(eventually(WAIT, || async { complete_count(&bob).await == 1 }).await);
    // Only one public-DID invitation may be open for requests at a time.
    alice.out_of_band().delete(&first).await.unwrap();

    let second = public_invitation(&alice).await;
    let (_, fresh) = bob
        .receive_invitation_and_connect(
            second.invitation.clone(),
            ReceiveInvitationOptions {
                reuse_connection: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let fresh = fresh.unwrap();
    assert!(fresh.out_of_band_id.is_some());
    assert!(eventually(WAIT, || async { complete_count(&bob).await == 2 }).await);
}

#[tokio::test]
async fn unanswered_reuse_falls_back_to_a_new_connection() {
    let network = TestNetwork::new();
    let alice = spawn_public_inviter(&network).await;
    let bob = network
        .spawn_agent("bob", |c| c.out_of_band.reuse_timeout_ms = 200)
        .await
        .unwrap();

    let first = public_invitation(&alice).await;
    let (_, existing) = bob
        .receive_invitation_and_connect(first.invitation.clone(), ReceiveInvitationOptions::default())
        .await
        .unwrap();
    let existing = existing.unwrap();
    assert!(
        eventually(WAIT, || async {
            complete_count(&alice).await == 1 && complete_count(&bob).await == 1
        })
        .await
    );

    // Alice forgets the relationship, so she cannot accept bob's reuse.
    alice.out_of_band().delete(&first).await.unwrap();
    for connection in alice.connections().get_all().await.unwrap() {
        alice.connections().repository().delete(&connection).await.unwrap();
    }

    let second = public_invitation(&alice).await;
    let (bob_oob, fresh) = bob
        .receive_invitation_and_connect(second.invitation.clone(), ReceiveInvitationOptions::default())
        .await
        .unwrap();
    let fresh = fresh.unwrap();
    assert_ne!(fresh.id, existing.id);
    assert_eq!(bob_oob.state, OutOfBandState::Done);
    assert!(bob_oob.reuse_connection_id.is_none());

    assert!(
        eventually(WAIT, || async {
            complete_count(&alice).await == 1
                && bob
                    .connections()
                    .get_by_id(&fresh.id)
                    .await
                    .is_ok_and(|c| c.state == ConnectionState::Complete)
        })
        .await
    );
}
