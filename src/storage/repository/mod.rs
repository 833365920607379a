// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the voting database.
//!
//! Each repository borrows the shared [`VotingDb`](super::VotingDb) and
//! exposes CRUD operations for one entity family. Updates return the number
//! of rows affected so callers can insist on exactly one.

pub mod accounts;
pub mod candidates;
pub mod elections;
pub mod intents;
pub mod participations;
pub mod wallets;

pub use accounts::{
    normalize_key, Account, AccountRepository, Credentials, NewAccount, Registration, ResetState,
};
pub use candidates::{CandidateProfile, CandidateRepository, ElectionCandidate};
pub use elections::{Election, ElectionPhase, ElectionRepository};
pub use intents::{
    IntentRepository, IntentStatus, OperationIntent, OperationKind, OperationPayload,
};
pub use participations::{Participation, ParticipationRepository};
pub use wallets::{StoredWallet, WalletRepository, WalletResponse};
