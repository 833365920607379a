// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Candidate profiles and election-candidate assignments.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    decode, get_row, scan_rows, update_row, DbError, DbResult, VotingDb, ASSIGNMENT_INDEX,
    CANDIDATE_PROFILES, ELECTION_CANDIDATES,
};

/// Self-maintained profile of a candidate account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CandidateProfile {
    pub user_id: u64,
    /// Party or designation.
    pub designation: String,
    pub description: String,
    /// File name under the public directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A candidate standing in one election.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ElectionCandidate {
    pub id: u64,
    pub election_id: u64,
    pub candidate_id: u64,
    pub designation: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Set by tallying for every candidate tied at the top.
    pub has_won: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct CandidateRepository<'a> {
    db: &'a VotingDb,
}

impl<'a> CandidateRepository<'a> {
    pub fn new(db: &'a VotingDb) -> Self {
        Self { db }
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    pub fn profile(&self, user_id: u64) -> DbResult<Option<CandidateProfile>> {
        get_row(self.db.inner(), CANDIDATE_PROFILES, user_id)
    }

    /// Create the profile once; later edits go through assignments.
    pub fn create_profile(&self, profile: &CandidateProfile) -> DbResult<usize> {
        let json = serde_json::to_vec(profile)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(CANDIDATE_PROFILES)?;
            if table.get(profile.user_id)?.is_some() {
                return Err(DbError::Conflict(
                    "Candidate description already exist".to_string(),
                ));
            }
            table.insert(profile.user_id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    // =========================================================================
    // Assignments
    // =========================================================================

    /// Insert an assignment, rejecting a second one for the same pair.
    pub fn insert_assignment(&self, assignment: &ElectionCandidate) -> DbResult<usize> {
        let json = serde_json::to_vec(assignment)?;
        let key = (assignment.election_id, assignment.candidate_id);
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut index = write_txn.open_table(ASSIGNMENT_INDEX)?;
            if index.get(key)?.is_some() {
                return Err(DbError::Conflict(
                    "Candidate is already assigned to this election".to_string(),
                ));
            }
            let mut table = write_txn.open_table(ELECTION_CANDIDATES)?;
            table.insert(assignment.id, json.as_slice())?;
            index.insert(key, assignment.id)?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    pub fn assignment(&self, id: u64) -> DbResult<Option<ElectionCandidate>> {
        get_row(self.db.inner(), ELECTION_CANDIDATES, id)
    }

    pub fn find_assignment(
        &self,
        election_id: u64,
        candidate_id: u64,
    ) -> DbResult<Option<ElectionCandidate>> {
        let read_txn = self.db.inner().begin_read()?;
        let index = read_txn.open_table(ASSIGNMENT_INDEX)?;
        let Some(id) = index.get((election_id, candidate_id))?.map(|v| v.value()) else {
            return Ok(None);
        };
        let table = read_txn.open_table(ELECTION_CANDIDATES)?;
        match table.get(id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Assignments of one election in assignment order.
    pub fn list_for_election(&self, election_id: u64) -> DbResult<Vec<ElectionCandidate>> {
        let read_txn = self.db.inner().begin_read()?;
        let index = read_txn.open_table(ASSIGNMENT_INDEX)?;
        let table = read_txn.open_table(ELECTION_CANDIDATES)?;

        let mut rows = Vec::new();
        for entry in index.range((election_id, 0u64)..=(election_id, u64::MAX))? {
            let (_, id) = entry?;
            if let Some(value) = table.get(id.value())? {
                rows.push(decode::<ElectionCandidate>(value.value())?);
            }
        }
        rows.sort_by_key(|a| a.id);
        Ok(rows)
    }

    /// Every assignment of one candidate across elections.
    pub fn list_for_candidate(&self, candidate_id: u64) -> DbResult<Vec<ElectionCandidate>> {
        let rows: Vec<ElectionCandidate> = scan_rows(self.db.inner(), ELECTION_CANDIDATES)?;
        Ok(rows
            .into_iter()
            .filter(|a| a.candidate_id == candidate_id)
            .collect())
    }

    pub fn stamp_chain_hash(&self, assignment_id: u64, tx_hash: &str) -> DbResult<usize> {
        update_row::<ElectionCandidate, _>(
            self.db.inner(),
            ELECTION_CANDIDATES,
            assignment_id,
            |a| a.chain_tx_hash = Some(tx_hash.to_string()),
        )
    }

    pub fn set_image(&self, assignment_id: u64, image: &str) -> DbResult<usize> {
        update_row::<ElectionCandidate, _>(
            self.db.inner(),
            ELECTION_CANDIDATES,
            assignment_id,
            |a| a.image = Some(image.to_string()),
        )
    }

    /// Flag the given assignments as winners in one transaction.
    ///
    /// Returns how many rows were flagged; already-flagged rows count too.
    pub fn mark_winners(&self, assignment_ids: &[u64]) -> DbResult<usize> {
        let write_txn = self.db.inner().begin_write()?;
        let mut affected = 0;
        {
            let mut table = write_txn.open_table(ELECTION_CANDIDATES)?;
            for id in assignment_ids {
                let bytes = match table.get(*id)? {
                    Some(value) => value.value().to_vec(),
                    None => continue,
                };
                let mut row: ElectionCandidate = decode(&bytes)?;
                row.has_won = true;
                table.insert(*id, serde_json::to_vec(&row)?.as_slice())?;
                affected += 1;
            }
        }
        write_txn.commit()?;
        Ok(affected)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::database::tests::temp_db;

    pub(crate) fn assignment(id: u64, election_id: u64, candidate_id: u64) -> ElectionCandidate {
        ElectionCandidate {
            id,
            election_id,
            candidate_id,
            designation: "Party".to_string(),
            description: "Bio".to_string(),
            image: None,
            has_won: false,
            chain_tx_hash: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn profile_is_created_once() {
        let (db, _dir) = temp_db();
        let repo = CandidateRepository::new(&db);
        let profile = CandidateProfile {
            user_id: 3,
            designation: "Green".to_string(),
            description: "Bio".to_string(),
            image: Some("1-photo.png".to_string()),
            created_at: Utc::now(),
        };
        assert_eq!(repo.create_profile(&profile).unwrap(), 1);
        assert!(matches!(repo.create_profile(&profile), Err(DbError::Conflict(_))));
        assert_eq!(repo.profile(3).unwrap().unwrap(), profile);
    }

    #[test]
    fn assignment_pair_is_unique() {
        let (db, _dir) = temp_db();
        let repo = CandidateRepository::new(&db);
        repo.insert_assignment(&assignment(1, 10, 3)).unwrap();
        assert!(matches!(
            repo.insert_assignment(&assignment(2, 10, 3)),
            Err(DbError::Conflict(_))
        ));
        assert!(repo.assignment(2).unwrap().is_none());
        assert_eq!(repo.find_assignment(10, 3).unwrap().unwrap().id, 1);
        assert!(repo.find_assignment(11, 3).unwrap().is_none());
    }

    #[test]
    fn listing_by_election_and_candidate() {
        let (db, _dir) = temp_db();
        let repo = CandidateRepository::new(&db);
        repo.insert_assignment(&assignment(1, 10, 3)).unwrap();
        repo.insert_assignment(&assignment(2, 10, 4)).unwrap();
        repo.insert_assignment(&assignment(3, 11, 3)).unwrap();

        let ids: Vec<u64> = repo.list_for_election(10).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
        let ids: Vec<u64> = repo.list_for_candidate(3).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn mark_winners_flags_each_row() {
        let (db, _dir) = temp_db();
        let repo = CandidateRepository::new(&db);
        repo.insert_assignment(&assignment(1, 10, 3)).unwrap();
        repo.insert_assignment(&assignment(2, 10, 4)).unwrap();

        assert_eq!(repo.mark_winners(&[1, 2, 99]).unwrap(), 2);
        assert!(repo.assignment(1).unwrap().unwrap().has_won);
        assert!(repo.assignment(2).unwrap().unwrap().has_won);
    }
}
