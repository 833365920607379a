// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded voting database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: user_id → serialized Account
//! - `user_name_index` / `email_index`: normalized key → user_id
//! - `credentials`: user_id → serialized Credentials
//! - `wallets`: user_id → serialized StoredWallet
//! - `candidate_profiles`: user_id → serialized CandidateProfile
//! - `elections`: election_id → serialized Election
//! - `election_candidates`: assignment_id → serialized ElectionCandidate
//! - `assignment_index`: (election_id, candidate_id) → assignment_id
//! - `participations`: (election_id, voter_id) → serialized Participation
//! - `intents`: intent_id → serialized OperationIntent
//! - `intent_keys`: dedupe key → intent_id (only while the intent is open)
//! - `sequences`: sequence name → last issued id
//!
//! redb serializes write transactions, so every uniqueness check that happens
//! inside the same write transaction as its insert cannot race.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const ACCOUNTS: TableDefinition<u64, &[u8]> = TableDefinition::new("accounts");
pub(crate) const USER_NAME_INDEX: TableDefinition<&str, u64> =
    TableDefinition::new("user_name_index");
pub(crate) const EMAIL_INDEX: TableDefinition<&str, u64> = TableDefinition::new("email_index");
pub(crate) const CREDENTIALS: TableDefinition<u64, &[u8]> = TableDefinition::new("credentials");
pub(crate) const WALLETS: TableDefinition<u64, &[u8]> = TableDefinition::new("wallets");
pub(crate) const CANDIDATE_PROFILES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("candidate_profiles");
pub(crate) const ELECTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("elections");
pub(crate) const ELECTION_CANDIDATES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("election_candidates");
pub(crate) const ASSIGNMENT_INDEX: TableDefinition<(u64, u64), u64> =
    TableDefinition::new("assignment_index");
pub(crate) const PARTICIPATIONS: TableDefinition<(u64, u64), &[u8]> =
    TableDefinition::new("participations");
pub(crate) const INTENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("intents");
pub(crate) const INTENT_KEYS: TableDefinition<&str, &str> = TableDefinition::new("intent_keys");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule rejected the write. The message is user-facing.
    #[error("{0}")]
    Conflict(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// VotingDb
// =============================================================================

/// Embedded ACID store for all voting state.
pub struct VotingDb {
    db: Database,
}

impl VotingDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(USER_NAME_INDEX)?;
            let _ = write_txn.open_table(EMAIL_INDEX)?;
            let _ = write_txn.open_table(CREDENTIALS)?;
            let _ = write_txn.open_table(WALLETS)?;
            let _ = write_txn.open_table(CANDIDATE_PROFILES)?;
            let _ = write_txn.open_table(ELECTIONS)?;
            let _ = write_txn.open_table(ELECTION_CANDIDATES)?;
            let _ = write_txn.open_table(ASSIGNMENT_INDEX)?;
            let _ = write_txn.open_table(PARTICIPATIONS)?;
            let _ = write_txn.open_table(INTENTS)?;
            let _ = write_txn.open_table(INTENT_KEYS)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn inner(&self) -> &Database {
        &self.db
    }

    /// Issue the next id from a named sequence in its own transaction.
    pub fn next_sequence(&self, name: &str) -> DbResult<u64> {
        let write_txn = self.db.begin_write()?;
        let id = next_id(&write_txn, name)?;
        write_txn.commit()?;
        Ok(id)
    }
}

/// Issue the next id from a named sequence inside an open write transaction.
pub(crate) fn next_id(write_txn: &WriteTransaction, name: &str) -> DbResult<u64> {
    let mut table = write_txn.open_table(SEQUENCES)?;
    let current = table.get(name)?.map(|v| v.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(name, next)?;
    Ok(next)
}

/// Deserialize a JSON row.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read-modify-write a JSON row keyed by `u64`.
///
/// Returns the number of rows affected (0 when the key is absent).
pub(crate) fn update_row<T, F>(
    db: &Database,
    table_def: TableDefinition<'_, u64, &'static [u8]>,
    id: u64,
    mutate: F,
) -> DbResult<usize>
where
    T: DeserializeOwned + serde::Serialize,
    F: FnOnce(&mut T),
{
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(table_def)?;

        // Read existing value and deserialize before mutating
        let existing_bytes = match table.get(id)? {
            Some(existing) => existing.value().to_vec(),
            None => return Ok(0),
        };

        let mut row: T = decode(&existing_bytes)?;
        mutate(&mut row);

        let json = serde_json::to_vec(&row)?;
        table.insert(id, json.as_slice())?;
    }
    write_txn.commit()?;
    Ok(1)
}

/// Load a JSON row keyed by `u64`.
pub(crate) fn get_row<T: DeserializeOwned>(
    db: &Database,
    table_def: TableDefinition<'_, u64, &'static [u8]>,
    id: u64,
) -> DbResult<Option<T>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(table_def)?;
    match table.get(id)? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

/// Load every JSON row of a `u64`-keyed table in key order.
pub(crate) fn scan_rows<T: DeserializeOwned>(
    db: &Database,
    table_def: TableDefinition<'_, u64, &'static [u8]>,
) -> DbResult<Vec<T>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(table_def)?;
    let mut rows = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        rows.push(decode(value.value())?);
    }
    Ok(rows)
}

// =============================================================================
// Tests
// =============================================================================
