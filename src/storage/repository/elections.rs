// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Election repository.
//!
//! Election ids double as on-chain vote-event indices (`id - 1`), so ids are
//! allocated densely: the next id is always one past the highest stored id.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    get_row, scan_rows, update_row, DbError, DbResult, VotingDb, ELECTIONS,
};

/// Read-time lifecycle phase of an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ElectionPhase {
    /// Not activated by an admin.
    Inactive,
    /// Active, before `start_date`.
    Upcoming,
    /// Active, between `start_date` and `end_date`.
    Ongoing,
    /// `end_date` has passed.
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Election {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    /// Set once the admin has tallied the result.
    pub results_generated: bool,
    pub created_by: u64,
    /// Hash of the vote-event creation transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_tx_hash: Option<String>,
    /// Hash of the activation transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Election {
    /// Phase at `now`. An election never activated stays `Inactive` for good.
    pub fn phase(&self, now: DateTime<Utc>) -> ElectionPhase {
        if !self.is_active {
            ElectionPhase::Inactive
        } else if self.has_ended(now) {
            ElectionPhase::Completed
        } else if now < self.start_date {
            ElectionPhase::Upcoming
        } else {
            ElectionPhase::Ongoing
        }
    }

    pub fn is_completed(&self, now: DateTime<Utc>) -> bool {
        self.phase(now) == ElectionPhase::Completed
    }

    /// End date reached, whatever the activation flag.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_date
    }

    /// Index of the mirrored vote event on the contract.
    pub fn chain_index(id: u64) -> u64 {
        id.saturating_sub(1)
    }
}

pub struct ElectionRepository<'a> {
    db: &'a VotingDb,
}

impl<'a> ElectionRepository<'a> {
    pub fn new(db: &'a VotingDb) -> Self {
        Self { db }
    }

    /// One past the highest stored election id.
    pub fn next_id(&self) -> DbResult<u64> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(ELECTIONS)?;
        let last = table.last()?.map(|(k, _)| k.value()).unwrap_or(0);
        Ok(last + 1)
    }

    /// Insert a new election under its pre-allocated id.
    pub fn insert(&self, election: &Election) -> DbResult<usize> {
        let json = serde_json::to_vec(election)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(ELECTIONS)?;
            if table.get(election.id)?.is_some() {
                return Err(DbError::Conflict(format!(
                    "Election {} already exists",
                    election.id
                )));
            }
            table.insert(election.id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    pub fn get(&self, id: u64) -> DbResult<Option<Election>> {
        get_row(self.db.inner(), ELECTIONS, id)
    }

    /// All elections, newest first.
    pub fn list(&self) -> DbResult<Vec<Election>> {
        let mut elections: Vec<Election> = scan_rows(self.db.inner(), ELECTIONS)?;
        elections.reverse();
        Ok(elections)
    }

    /// Elections currently in `phase`, newest first.
    pub fn list_in_phase(&self, phase: ElectionPhase, now: DateTime<Utc>) -> DbResult<Vec<Election>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|e| e.phase(now) == phase)
            .collect())
    }

    pub fn count(&self) -> DbResult<usize> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(ELECTIONS)?;
        Ok(table.len()? as usize)
    }

    pub fn set_active(&self, id: u64, active: bool) -> DbResult<usize> {
        update_row::<Election, _>(self.db.inner(), ELECTIONS, id, |e| {
            e.is_active = active;
            e.updated_at = Utc::now();
        })
    }

    pub fn stamp_chain_hash(&self, id: u64, tx_hash: &str) -> DbResult<usize> {
        update_row::<Election, _>(self.db.inner(), ELECTIONS, id, |e| {
            e.chain_tx_hash = Some(tx_hash.to_string());
            e.updated_at = Utc::now();
        })
    }

    pub fn stamp_activation_hash(&self, id: u64, tx_hash: &str) -> DbResult<usize> {
        update_row::<Election, _>(self.db.inner(), ELECTIONS, id, |e| {
            e.activation_tx_hash = Some(tx_hash.to_string());
            e.updated_at = Utc::now();
        })
    }

    pub fn mark_results_generated(&self, id: u64) -> DbResult<usize> {
        update_row::<Election, _>(self.db.inner(), ELECTIONS, id, |e| {
            e.results_generated = true;
            e.updated_at = Utc::now();
        })
    }
}
