// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mediation: coordinate-mediation 1.0, message pickup 1.0 and routing 1.0.

pub mod handler;
pub mod mediator;
pub mod messages;
pub mod recipient;
pub mod record;

pub use handler::MediationHandler;
pub use mediator::{ForwardDelivery, MediatorService};
pub use messages::{KeylistAction, MediationMessageKind};
pub use recipient::MediationRecipientService;
pub use record::{MediationRecord, MediationRole, MediationState};
