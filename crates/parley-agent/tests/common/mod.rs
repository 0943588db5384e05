// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared setup for the end-to-end suites.

#![allow(dead_code)]

use std::time::Duration;

use parley_agent::connections::{ConnectionRecord, ConnectionState, HandshakeProtocol};
use parley_agent::oob::CreateInvitationOptions;
use parley_agent::{Agent, ReceiveInvitationOptions};
use parley_test_utils::eventually;

pub const WAIT: Duration = Duration::from_secs(5);

/// Connects `inviter` and `invitee` over an out-of-band DID exchange and
/// waits until both sides are complete. Returns (inviter side, invitee side).
pub async fn connect(inviter: &Agent, invitee: &Agent) -> (ConnectionRecord, ConnectionRecord) {
    let invitation = inviter
        .create_out_of_band_invitation(&[HandshakeProtocol::DidExchange], CreateInvitationOptions::default())
        .await
        .unwrap();
    let (_, invitee_conn) = invitee
        .receive_invitation_and_connect(invitation.invitation.clone(), ReceiveInvitationOptions::default())
        .await
        .unwrap();
    let invitee_conn = invitee_conn.unwrap();

    let complete = eventually(WAIT, || async {
        let inviter_done = inviter
            .connections()
            .find_by_out_of_band_id(&invitation.id)
            .await
            .unwrap_or_default()
            .iter()
            .any(|c| c.state == ConnectionState::Complete);
        let invitee_done = invitee
            .connections()
            .get_by_id(&invitee_conn.id)
            .await
            .is_ok_and(|c| c.state == ConnectionState::Complete);
        inviter_done && invitee_done
    })
    .await;
    assert!(complete, "handshake did not complete");

    let inviter_conn = inviter
        .connections()
        .find_by_out_of_band_id(&invitation.id)
        .await
        .unwrap()
        .remove(0);
    let invitee_conn = invitee.connections().get_by_id(&invitee_conn.id).await.unwrap();
    (inviter_conn, invitee_conn)
}
