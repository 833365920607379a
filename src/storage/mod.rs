// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! All voting state lives in one embedded redb database under `DATA_DIR`.
//!
//! ## Layout
//!
//! ```text
//! $DATA_DIR/
//!   ballot.redb     # accounts, credentials, wallets, elections,
//!                   # assignments, participations, operation intents
//! $PUBLIC_DIR/
//!   <millis>-<name> # uploaded candidate images, served at /public
//! ```
//!
//! Wallet private keys and one-time codes are encrypted before they reach
//! the database; see [`crate::auth::SecretBox`].

pub mod database;
pub mod repository;
pub mod uploads;

pub use database::{DbError, DbResult, VotingDb};
pub use repository::{
    normalize_key, Account, AccountRepository, CandidateProfile, CandidateRepository,
    Credentials, Election, ElectionCandidate, ElectionPhase, ElectionRepository,
    IntentRepository, IntentStatus, NewAccount, OperationIntent, OperationKind,
    OperationPayload, Participation, ParticipationRepository, Registration, ResetState,
    StoredWallet, WalletRepository, WalletResponse,
};
pub use uploads::{ImageUpload, UploadError, UploadStore};
