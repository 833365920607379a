// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cast votes, one row per (election, voter).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{decode, DbError, DbResult, VotingDb, PARTICIPATIONS};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Participation {
    pub election_id: u64,
    pub voter_id: u64,
    /// Election-candidate assignment voted for.
    pub assignment_id: u64,
    /// Candidate account voted for.
    pub candidate_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct ParticipationRepository<'a> {
    db: &'a VotingDb,
}

impl<'a> ParticipationRepository<'a> {
    pub fn new(db: &'a VotingDb) -> Self {
        Self { db }
    }

    /// Record a vote. A second vote for the same pair is rejected.
    pub fn insert(&self, participation: &Participation) -> DbResult<usize> {
        let key = (participation.election_id, participation.voter_id);
        let json = serde_json::to_vec(participation)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(PARTICIPATIONS)?;
            if table.get(key)?.is_some() {
                return Err(DbError::Conflict(
                    "You have already voted in this election".to_string(),
                ));
            }
            table.insert(key, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    pub fn get(&self, election_id: u64, voter_id: u64) -> DbResult<Option<Participation>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(PARTICIPATIONS)?;
        match table.get((election_id, voter_id))? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn stamp_chain_hash(&self, election_id: u64, voter_id: u64, tx_hash: &str) -> DbResult<usize> {
        let key = (election_id, voter_id);
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(PARTICIPATIONS)?;
            let bytes = match table.get(key)? {
                Some(value) => value.value().to_vec(),
                None => return Ok(0),
            };
            let mut row: Participation = decode(&bytes)?;
            row.chain_tx_hash = Some(tx_hash.to_string());
            table.insert(key, serde_json::to_vec(&row)?.as_slice())?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    /// Votes cast in one election, in voter order.
    pub fn list_for_election(&self, election_id: u64) -> DbResult<Vec<Participation>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(PARTICIPATIONS)?;
        let mut rows = Vec::new();
        for entry in table.range((election_id, 0u64)..=(election_id, u64::MAX))? {
            let (_, value) = entry?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }

    /// Votes cast by one voter across elections.
    pub fn list_for_voter(&self, voter_id: u64) -> DbResult<Vec<Participation>> {
        self.scan(|p| p.voter_id == voter_id)
    }

    /// Votes received by one candidate across elections.
    pub fn list_for_candidate(&self, candidate_id: u64) -> DbResult<Vec<Participation>> {
        self.scan(|p| p.candidate_id == candidate_id)
    }

    /// Vote count per assignment for one election.
    pub fn tally(&self, election_id: u64) -> DbResult<HashMap<u64, u64>> {
        let mut counts = HashMap::new();
        for vote in self.list_for_election(election_id)? {
            *counts.entry(vote.assignment_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn scan<F>(&self, keep: F) -> DbResult<Vec<Participation>>
    where
        F: Fn(&Participation) -> bool,
    {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(PARTICIPATIONS)?;
        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let row: Participation = decode(value.value())?;
            if keep(&row) {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}
