// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ballot Chain - Voting Backend with On-Chain Mirroring
//!
//! Voters, candidates and admins register and authenticate locally.
//! Participant registration, election creation and activation, candidate
//! assignment and vote casting are mirrored to an EVM voting contract
//! through a durable operation-intent log.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Accounts, password hashing and HS256 session tokens
//! - `blockchain` - Custodial wallets and the voting contract client
//! - `ledger` - Dual-write executor and reconciler
//! - `storage` - Embedded redb database and image uploads

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mailer;
pub mod models;
pub mod state;
pub mod storage;
pub mod tally;
