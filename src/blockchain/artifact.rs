// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compiled contract artifact loading.
//!
//! The artifact is the Truffle-style JSON produced by the contract build:
//! `{ "abi": [...], "networks": { "<chainId>": { "address": "0x.." } } }`.
//! It is read once at start-up; the ABI is only used to confirm that the
//! deployed contract exposes every method the server calls.

use std::{collections::HashMap, path::Path, str::FromStr};

use alloy::{json_abi::JsonAbi, primitives::Address};
use serde::Deserialize;

use super::client::ChainError;
use super::types::REQUIRED_METHODS;

#[derive(Debug, Deserialize)]
struct NetworkEntry {
    address: String,
}

#[derive(Debug, Deserialize)]
pub struct ContractArtifact {
    abi: JsonAbi,
    #[serde(default)]
    networks: HashMap<String, NetworkEntry>,
}

impl ContractArtifact {
    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ChainError::Artifact(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ChainError> {
        serde_json::from_str(raw).map_err(|e| ChainError::Artifact(e.to_string()))
    }

    /// Fail unless every bound method is present in the ABI.
    pub fn check_methods(&self) -> Result<(), ChainError> {
        let missing: Vec<&str> = REQUIRED_METHODS
            .iter()
            .copied()
            .filter(|name| self.abi.function(name).is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ChainError::Artifact(format!(
                "ABI is missing methods: {}",
                missing.join(", ")
            )))
        }
    }

    /// Deployment address for `chain_id`, or `override_address` when set.
    pub fn address_for(
        &self,
        chain_id: u64,
        override_address: Option<&str>,
    ) -> Result<Address, ChainError> {
        let raw = match override_address {
            Some(address) => address,
            None => self
                .networks
                .get(&chain_id.to_string())
                .map(|n| n.address.as_str())
                .ok_or_else(|| {
                    ChainError::Artifact(format!("no deployment for chain id {chain_id}"))
                })?,
        };
        Address::from_str(raw).map_err(|e| ChainError::InvalidAddress(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "name": name,
            "inputs": [],
            "outputs": [],
            "stateMutability": "nonpayable"
        })
    }

    fn artifact(methods: &[&str]) -> String {
        let abi: Vec<serde_json::Value> = methods.iter().map(|m| function(m)).collect();
        serde_json::json!({
            "abi": abi,
            "networks": {
                "1337": { "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3" }
            }
        })
        .to_string()
    }

    #[test]
    fn complete_abi_passes_check() {
        let parsed = ContractArtifact::from_json(&artifact(REQUIRED_METHODS)).unwrap();
        parsed.check_methods().unwrap();
    }

    #[test]
    fn missing_method_is_reported() {
        let parsed =
            ContractArtifact::from_json(&artifact(&["addNewVoteEvent", "activateVoteEvent"]))
                .unwrap();
        let err = parsed.check_methods().unwrap_err().to_string();
        assert!(err.contains("addVoteCandidate"));
        assert!(err.contains("participateInVoteEvent"));
    }

    #[test]
    fn address_comes_from_network_or_override() {
        let parsed = ContractArtifact::from_json(&artifact(REQUIRED_METHODS)).unwrap();
        let from_network = parsed.address_for(1337, None).unwrap();
        assert_eq!(
            from_network,
            Address::from_str("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap()
        );

        let overridden = parsed
            .address_for(1337, Some("0x1111111111111111111111111111111111111111"))
            .unwrap();
        assert_ne!(overridden, from_network);

        assert!(matches!(parsed.address_for(5, None), Err(ChainError::Artifact(_))));
        assert!(matches!(
            parsed.address_for(1337, Some("not-an-address")),
            Err(ChainError::InvalidAddress(_))
        ));
    }
}
