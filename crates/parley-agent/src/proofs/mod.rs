// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Present-proof 1.0 and 2.0.

pub mod handler;
pub mod messages;
pub mod record;
pub mod service;

pub use handler::ProofHandler;
pub use messages::{ProofMessageKind, ProofProtocolVersion};
pub use record::{ProofExchangeRecord, ProofRole, ProofState};
pub use service::{PresentationOptions, ProofProposalOptions, ProofRequestOptions, ProofService};
