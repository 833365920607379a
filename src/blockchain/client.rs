// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM client for the voting contract.

use std::{str::FromStr, time::Duration};

use alloy::{
    network::{EthereumWallet, ReceiptResponse},
    primitives::{Address, U256},
    providers::ProviderBuilder,
};
use async_trait::async_trait;

use super::{
    artifact::ContractArtifact,
    contract::ITaswit,
    gateway::ChainGateway,
    signing::signer_from_pem,
    types::{ChainCall, ChainReceipt},
};
use crate::config::ChainSettings;

/// Errors that can occur during contract calls.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Chain call timed out after {0:?}")]
    Timeout(Duration),

    /// Broadcast succeeded but no receipt came back.
    #[error("Transaction {tx_hash} sent but not confirmed: {reason}")]
    Unconfirmed { tx_hash: String, reason: String },

    #[error("Contract artifact error: {0}")]
    Artifact(String),
}

impl ChainError {
    /// The call may have reached the chain; only a later look can tell.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unconfirmed { .. })
    }

    /// Hash of a transaction that was broadcast without a receipt.
    pub fn pending_tx_hash(&self) -> Option<&str> {
        match self {
            Self::Unconfirmed { tx_hash, .. } => Some(tx_hash),
            _ => None,
        }
    }
}

/// Voting contract client.
///
/// Holds no provider: each call builds one bound to the signing wallet, so
/// concurrent calls from different wallets never share nonce state.
#[derive(Debug, Clone)]
pub struct ChainClient {
    rpc_url: url::Url,
    contract: Address,
    timeout: Duration,
}

impl ChainClient {
    pub fn new(rpc_url: url::Url, contract: Address, timeout: Duration) -> Self {
        Self {
            rpc_url,
            contract,
            timeout,
        }
    }

    /// Load the artifact, check its ABI and resolve the deployment address.
    pub fn from_settings(settings: &ChainSettings) -> Result<Self, ChainError> {
        let artifact = ContractArtifact::load(&settings.artifact_path)?;
        artifact.check_methods()?;
        let contract =
            artifact.address_for(settings.chain_id, settings.contract_address.as_deref())?;
        Ok(Self::new(settings.rpc_url.clone(), contract, settings.timeout))
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    async fn send(&self, signer_pem: &[u8], call: &ChainCall) -> Result<ChainReceipt, ChainError> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let signer = signer_from_pem(signer_pem)?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(self.rpc_url.clone());
        let contract = ITaswit::new(self.contract, provider);

        let broadcast = async {
            let sent = match call {
                ChainCall::AddVoteEvent {
                    name,
                    description,
                    start_ts,
                    end_ts,
                    max_participant_vote,
                } => contract
                    .addNewVoteEvent(
                        name.clone(),
                        description.clone(),
                        U256::from(*start_ts),
                        U256::from(*end_ts),
                        U256::from(*max_participant_vote),
                    )
                    .send()
                    .await,
                ChainCall::ActivateVoteEvent { election_index } => contract
                    .activateVoteEvent(U256::from(*election_index))
                    .send()
                    .await,
                ChainCall::AddVoteCandidate {
                    candidate_address,
                    name,
                    party,
                    bio,
                    election_index,
                } => contract
                    .addVoteCandidate(
                        parse_address(candidate_address)?,
                        name.clone(),
                        party.clone(),
                        bio.clone(),
                        true,
                        U256::from(*election_index),
                    )
                    .send()
                    .await,
                ChainCall::AddParticipant {
                    participant_id,
                    participant_address,
                } => contract
                    .addNewParticipant(
                        U256::from(*participant_id),
                        parse_address(participant_address)?,
                        true,
                    )
                    .send()
                    .await,
                ChainCall::Participate {
                    election_index,
                    candidate_address,
                    voter_address,
                } => contract
                    .participateInVoteEvent(
                        U256::from(*election_index),
                        parse_address(candidate_address)?,
                        parse_address(voter_address)?,
                    )
                    .send()
                    .await,
            };
            let pending = sent.map_err(|e| ChainError::Contract(e.to_string()))?;
            Ok::<_, ChainError>(pending)
        };
        let pending = tokio::time::timeout_at(deadline, broadcast)
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))??;

        // From here on the transaction may land even if we stop waiting
        let tx_hash = pending.tx_hash().to_string();
        let receipt = match tokio::time::timeout_at(deadline, pending.get_receipt()).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                return Err(ChainError::Unconfirmed {
                    tx_hash,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ChainError::Unconfirmed {
                    tx_hash,
                    reason: format!("no receipt within {:?}", self.timeout),
                })
            }
        };

        Ok(ChainReceipt {
            success: receipt.status(),
            tx_hash: receipt.transaction_hash().to_string(),
            block_number: receipt.block_number(),
        })
    }
}

#[async_trait]
impl ChainGateway for ChainClient {
    async fn submit(&self, signer_pem: &[u8], call: &ChainCall) -> Result<ChainReceipt, ChainError> {
        self.send(signer_pem, call).await
    }
}

fn parse_address(raw: &str) -> Result<Address, ChainError> {
    Address::from_str(raw).map_err(|e| ChainError::InvalidAddress(format!("{raw}: {e}")))
}
