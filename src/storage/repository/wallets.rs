// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodial wallet records.
//!
//! One wallet per account, created at verification time and never rotated.
//! The private key is stored as AES-GCM ciphertext of its PKCS#8 PEM.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{get_row, DbError, DbResult, VotingDb, WALLETS};

/// Wallet row. `encrypted_private_key` never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWallet {
    pub user_id: u64,
    /// Checksum-free lowercase `0x` EVM address.
    pub address: String,
    /// Uncompressed SEC1 public key, hex.
    pub public_key: String,
    pub encrypted_private_key: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    pub address: String,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredWallet> for WalletResponse {
    fn from(wallet: &StoredWallet) -> Self {
        Self {
            address: wallet.address.clone(),
            public_key: wallet.public_key.clone(),
            created_at: wallet.created_at,
        }
    }
}

pub struct WalletRepository<'a> {
    db: &'a VotingDb,
}

impl<'a> WalletRepository<'a> {
    pub fn new(db: &'a VotingDb) -> Self {
        Self { db }
    }

    pub fn get(&self, user_id: u64) -> DbResult<Option<StoredWallet>> {
        get_row(self.db.inner(), WALLETS, user_id)
    }

    /// Persist a new wallet. An account never gets a second one.
    pub fn insert(&self, wallet: &StoredWallet) -> DbResult<usize> {
        let json = serde_json::to_vec(wallet)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(WALLETS)?;
            if table.get(wallet.user_id)?.is_some() {
                return Err(DbError::Conflict(format!(
                    "Wallet for user {} already exists",
                    wallet.user_id
                )));
            }
            table.insert(wallet.user_id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(1)
    }
}
