// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signer construction from stored wallet keys.
//!
//! Wallet keys are stored as PKCS#8 PEM (after decryption). Older SEC1
//! `EC PRIVATE KEY` blocks are accepted too.

use alloy::signers::local::PrivateKeySigner;
use k256::{pkcs8::DecodePrivateKey, SecretKey};

use super::client::ChainError;

/// Parse a PEM private key into a secp256k1 secret key.
pub fn secret_key_from_pem(pem_bytes: &[u8]) -> Result<SecretKey, ChainError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid UTF-8: {e}")))?;

    let pem = pem::parse(pem_str)
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid PEM: {e}")))?;

    SecretKey::from_pkcs8_der(pem.contents())
        .or_else(|_| SecretKey::from_sec1_der(pem.contents()))
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid key format: {e}")))
}

/// Create a transaction signer from a PEM private key.
pub fn signer_from_pem(pem_bytes: &[u8]) -> Result<PrivateKeySigner, ChainError> {
    let secret_key = secret_key_from_pem(pem_bytes)?;
    PrivateKeySigner::from_slice(&secret_key.to_bytes())
        .map_err(|e| ChainError::InvalidPrivateKey(e.to_string()))
}
