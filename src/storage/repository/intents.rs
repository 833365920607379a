// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable operation intents for on-chain mirrored writes.
//!
//! An intent is written `pending` before the contract call and walks
//! `pending → chain_confirmed → committed`, or ends `failed` / `abandoned`.
//! While an intent is open (`pending` or `chain_confirmed`) it holds its
//! dedupe key, so a second operation on the same record is refused.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{decode, DbError, DbResult, VotingDb, INTENTS, INTENT_KEYS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Recorded; chain call not yet confirmed.
    Pending,
    /// Chain call succeeded; local commit outstanding.
    ChainConfirmed,
    /// Both sides applied.
    Committed,
    /// Chain call failed or was rejected; nothing applied.
    Failed,
    /// Stuck `pending` past the grace period; chain outcome unknown.
    Abandoned,
}

impl IntentStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, IntentStatus::Pending | IntentStatus::ChainConfirmed)
    }

}

impl std::str::FromStr for IntentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "chain_confirmed" => Ok(Self::ChainConfirmed),
            "committed" => Ok(Self::Committed),
            "failed" => Ok(Self::Failed),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(format!("Unknown intent status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    RegisterParticipant,
    CreateElection,
    ActivateElection,
    AssignCandidate,
    CastVote,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::RegisterParticipant => "register_participant",
            OperationKind::CreateElection => "create_election",
            OperationKind::ActivateElection => "activate_election",
            OperationKind::AssignCandidate => "assign_candidate",
            OperationKind::CastVote => "cast_vote",
        };
        f.write_str(name)
    }
}

/// Everything needed to run (or replay) both halves of one operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationPayload {
    RegisterParticipant {
        user_id: u64,
    },
    CreateElection {
        election_id: u64,
        name: String,
        description: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        created_by: u64,
    },
    ActivateElection {
        election_id: u64,
    },
    AssignCandidate {
        assignment_id: u64,
        election_id: u64,
        candidate_id: u64,
        designation: String,
        description: String,
        image: Option<String>,
    },
    CastVote {
        election_id: u64,
        voter_id: u64,
        assignment_id: u64,
        candidate_id: u64,
    },
}

impl OperationPayload {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationPayload::RegisterParticipant { .. } => OperationKind::RegisterParticipant,
            OperationPayload::CreateElection { .. } => OperationKind::CreateElection,
            OperationPayload::ActivateElection { .. } => OperationKind::ActivateElection,
            OperationPayload::AssignCandidate { .. } => OperationKind::AssignCandidate,
            OperationPayload::CastVote { .. } => OperationKind::CastVote,
        }
    }

    /// Key that must not be held by another open intent.
    ///
    /// Election creation uses one global key: election ids map onto contract
    /// event indices, so creations must not interleave.
    pub fn dedupe_key(&self) -> String {
        match self {
            OperationPayload::RegisterParticipant { user_id } => format!("participant:{user_id}"),
            OperationPayload::CreateElection { .. } => "election:create".to_string(),
            OperationPayload::ActivateElection { election_id } => {
                format!("election:{election_id}:activate")
            }
            OperationPayload::AssignCandidate {
                election_id,
                candidate_id,
                ..
            } => format!("assign:{election_id}:{candidate_id}"),
            OperationPayload::CastVote {
                election_id,
                voter_id,
                ..
            } => format!("vote:{election_id}:{voter_id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OperationIntent {
    pub id: String,
    pub kind: OperationKind,
    pub payload: OperationPayload,
    pub dedupe_key: String,
    /// Account whose wallet signs the contract call.
    pub signer_id: u64,
    /// Account that requested the operation.
    pub actor_id: u64,
    pub status: IntentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Local commit attempts after chain confirmation.
    pub commit_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct IntentRepository<'a> {
    db: &'a VotingDb,
}

impl<'a> IntentRepository<'a> {
    pub fn new(db: &'a VotingDb) -> Self {
        Self { db }
    }

    /// Record a `pending` intent, claiming its dedupe key.
    pub fn begin(
        &self,
        payload: OperationPayload,
        signer_id: u64,
        actor_id: u64,
    ) -> DbResult<OperationIntent> {
        let now = Utc::now();
        let intent = OperationIntent {
            id: uuid::Uuid::new_v4().to_string(),
            kind: payload.kind(),
            dedupe_key: payload.dedupe_key(),
            payload,
            signer_id,
            actor_id,
            status: IntentStatus::Pending,
            chain_tx_hash: None,
            last_error: None,
            commit_attempts: 0,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_vec(&intent)?;

        let write_txn = self.db.inner().begin_write()?;
        {
            let mut keys = write_txn.open_table(INTENT_KEYS)?;
            if keys.get(intent.dedupe_key.as_str())?.is_some() {
                return Err(DbError::Conflict(
                    "Another operation on this record is still in progress".to_string(),
                ));
            }
            keys.insert(intent.dedupe_key.as_str(), intent.id.as_str())?;

            let mut table = write_txn.open_table(INTENTS)?;
            table.insert(intent.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(intent)
    }

    pub fn get(&self, id: &str) -> DbResult<Option<OperationIntent>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(INTENTS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Intents, newest first, optionally filtered by status.
    pub fn list(&self, status: Option<IntentStatus>) -> DbResult<Vec<OperationIntent>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(INTENTS)?;
        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let intent: OperationIntent = decode(value.value())?;
            if status.is_none_or(|s| s == intent.status) {
                rows.push(intent);
            }
        }
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Open intents not touched since `cutoff`, oldest first.
    pub fn list_stale(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<OperationIntent>> {
        let mut rows: Vec<OperationIntent> = self
            .list(None)?
            .into_iter()
            .filter(|i| i.status.is_open() && i.updated_at < cutoff)
            .collect();
        rows.reverse();
        Ok(rows)
    }

    pub fn mark_chain_confirmed(&self, id: &str, tx_hash: &str) -> DbResult<usize> {
        self.transition(id, |intent| {
            intent.status = IntentStatus::ChainConfirmed;
            intent.chain_tx_hash = Some(tx_hash.to_string());
            intent.last_error = None;
        })
    }

    pub fn mark_committed(&self, id: &str) -> DbResult<usize> {
        self.transition(id, |intent| {
            intent.status = IntentStatus::Committed;
            intent.last_error = None;
        })
    }

    pub fn mark_failed(&self, id: &str, error: &str) -> DbResult<usize> {
        self.transition(id, |intent| {
            intent.status = IntentStatus::Failed;
            intent.last_error = Some(error.to_string());
        })
    }

    pub fn mark_abandoned(&self, id: &str, reason: &str) -> DbResult<usize> {
        self.transition(id, |intent| {
            intent.status = IntentStatus::Abandoned;
            intent.last_error = Some(reason.to_string());
        })
    }

    /// Record a chain call whose outcome is unknown. The intent stays `pending`
    /// and keeps its key until the reconciler abandons it.
    pub fn record_unconfirmed(&self, id: &str, tx_hash: Option<&str>, error: &str) -> DbResult<usize> {
        self.transition(id, |intent| {
            if let Some(hash) = tx_hash {
                intent.chain_tx_hash = Some(hash.to_string());
            }
            intent.last_error = Some(error.to_string());
        })
    }

    /// Record a failed local commit attempt; the intent stays open.
    pub fn record_commit_failure(&self, id: &str, error: &str) -> DbResult<usize> {
        self.transition(id, |intent| {
            intent.commit_attempts += 1;
            intent.last_error = Some(error.to_string());
        })
    }

    /// Mutate one intent, releasing its dedupe key if it leaves the open states.
    fn transition<F>(&self, id: &str, mutate: F) -> DbResult<usize>
    where
        F: FnOnce(&mut OperationIntent),
    {
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(INTENTS)?;
            let bytes = match table.get(id)? {
                Some(value) => value.value().to_vec(),
                None => return Ok(0),
            };
            let mut intent: OperationIntent = decode(&bytes)?;
            mutate(&mut intent);
            intent.updated_at = Utc::now();
            table.insert(id, serde_json::to_vec(&intent)?.as_slice())?;

            if !intent.status.is_open() {
                let mut keys = write_txn.open_table(INTENT_KEYS)?;
                let held_by_this = keys
                    .get(intent.dedupe_key.as_str())?
                    .is_some_and(|holder| holder.value() == id);
                if held_by_this {
                    keys.remove(intent.dedupe_key.as_str())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_db;

    fn vote_payload(voter_id: u64) -> OperationPayload {
        OperationPayload::CastVote {
            election_id: 1,
            voter_id,
            assignment_id: 2,
            candidate_id: 3,
        }
    }

    #[test]
    fn open_intent_holds_its_key() {
        let (db, _dir) = temp_db();
        let repo = IntentRepository::new(&db);

        let first = repo.begin(vote_payload(5), 5, 5).unwrap();
        assert_eq!(first.status, IntentStatus::Pending);
        assert_eq!(first.dedupe_key, "vote:1:5");
        assert!(matches!(
            repo.begin(vote_payload(5), 5, 5),
            Err(DbError::Conflict(_))
        ));
        // Different voter is independent
        repo.begin(vote_payload(6), 6, 6).unwrap();

        repo.mark_chain_confirmed(&first.id, "0xabc").unwrap();
        assert!(repo.begin(vote_payload(5), 5, 5).is_err());
    }

    #[test]
    fn terminal_states_release_the_key() {
        let (db, _dir) = temp_db();
        let repo = IntentRepository::new(&db);

        let first = repo.begin(vote_payload(5), 5, 5).unwrap();
        repo.mark_failed(&first.id, "rpc down").unwrap();
        let second = repo.begin(vote_payload(5), 5, 5).unwrap();

        let stored = repo.get(&first.id).unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("rpc down"));

        repo.mark_chain_confirmed(&second.id, "0x1").unwrap();
        repo.mark_committed(&second.id).unwrap();
        let stored = repo.get(&second.id).unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Committed);
        assert_eq!(stored.chain_tx_hash.as_deref(), Some("0x1"));
    }

    #[test]
    fn commit_failures_keep_intent_open() {
        let (db, _dir) = temp_db();
        let repo = IntentRepository::new(&db);
        let intent = repo.begin(vote_payload(5), 5, 5).unwrap();
        repo.mark_chain_confirmed(&intent.id, "0x1").unwrap();
        repo.record_commit_failure(&intent.id, "disk full").unwrap();

        let stored = repo.get(&intent.id).unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::ChainConfirmed);
        assert_eq!(stored.commit_attempts, 1);
        assert_eq!(repo.list(Some(IntentStatus::ChainConfirmed)).unwrap().len(), 1);
    }

    #[test]
    fn stale_listing_only_returns_open_intents() {
        let (db, _dir) = temp_db();
        let repo = IntentRepository::new(&db);
        let open = repo.begin(vote_payload(5), 5, 5).unwrap();
        let done = repo.begin(vote_payload(6), 6, 6).unwrap();
        repo.mark_failed(&done.id, "x").unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let stale = repo.list_stale(cutoff).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, open.id);

        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(repo.list_stale(past).unwrap().is_empty());
    }

    #[test]
    fn status_parsing() {
        assert_eq!("chain_confirmed".parse::<IntentStatus>(), Ok(IntentStatus::ChainConfirmed));
        assert_eq!(
            "bogus".parse::<IntentStatus>(),
            Err("Unknown intent status: bogus".to_string())
        );
        assert!(IntentStatus::Pending.is_open());
        assert!(!IntentStatus::Abandoned.is_open());
    }
}
