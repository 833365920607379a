// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for the EVM voting contract.
//!
//! This module provides:
//! - Custodial wallet generation and key handling
//! - The [`ChainGateway`] seam used by the dual-write executor
//! - An alloy-backed [`ChainClient`] that signs each call with the acting wallet

pub mod artifact;
pub mod client;
pub mod contract;
pub mod gateway;
pub mod signing;
pub mod types;
pub mod wallet;

pub use artifact::ContractArtifact;
pub use client::{ChainClient, ChainError};
pub use gateway::ChainGateway;
pub use types::{ChainCall, ChainReceipt, MAX_VOTES_PER_PARTICIPANT};
pub use wallet::{generate_keypair, WalletError, WalletProvider};
