// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Seam between the dual-write executor and the chain.

use async_trait::async_trait;

use super::{client::ChainError, types::{ChainCall, ChainReceipt}};

/// Submits one contract call signed by the given wallet and waits for its receipt.
///
/// `Ok` with `success == false` means the transaction was mined but reverted.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn submit(&self, signer_pem: &[u8], call: &ChainCall) -> Result<ChainReceipt, ChainError>;
}
