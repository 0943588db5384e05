// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound messages the agent cannot use are logged and dropped.

use parley_test_utils::TestNetwork;
use serde_json::json;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn undecryptable_message_is_dropped() {
    let network = TestNetwork::new();
    let alice = network.spawn_agent("alice", |_| {}).await.unwrap();

    alice.receive_message(b"\x00not an envelope", None).await.unwrap();

    assert!(logs_contain("dropping inbound message"));
}

#[tokio::test]
#[traced_test]
async fn unknown_message_type_is_dropped() {
    let network = TestNetwork::new();
    let alice = network.spawn_agent("alice", |_| {}).await.unwrap();

    let wire = json!({
        "recipientKeys": ["someone"],
        "message": {
            "@id": "a1",
            "@type": "https://didcomm.org/unknown_protocol/1.0/whatever",
        },
    });
    alice
        .receive_message(&serde_json::to_vec(&wire).unwrap(), None)
        .await
        .unwrap();

    assert!(logs_contain("no handler for message, dropping"));
}
