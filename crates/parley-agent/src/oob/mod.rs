// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Out-of-band invitations and connection reuse.

pub mod handler;
pub mod messages;
pub mod record;
pub mod service;

pub use handler::OutOfBandHandler;
pub use messages::{OutOfBandInvitation, OutOfBandMessageKind, ServiceEntry};
pub use record::{OutOfBandRecord, OutOfBandRole, OutOfBandState};
pub use service::{CreateInvitationOptions, OutOfBandService};
