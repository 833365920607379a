// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Executes one mirrored operation against the chain and the local store.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::auth::SecretBox;
use crate::blockchain::{
    ChainCall, ChainError, ChainGateway, ChainReceipt, WalletError, WalletProvider,
    MAX_VOTES_PER_PARTICIPANT,
};
use crate::storage::{
    AccountRepository, CandidateRepository, DbError, Election, ElectionCandidate,
    ElectionRepository, IntentRepository, OperationPayload, Participation,
    ParticipationRepository, VotingDb,
};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Another open intent holds the same dedupe key.
    #[error("{0}")]
    InFlight(String),

    /// The record changed between the handler's checks and the intent claim.
    #[error("{0}")]
    Precondition(String),

    #[error("chain call failed for intent {intent_id}: {source}")]
    Chain {
        intent_id: String,
        #[source]
        source: ChainError,
    },

    #[error("chain transaction {tx_hash} reverted (intent {intent_id})")]
    Rejected { intent_id: String, tx_hash: String },

    /// Chain succeeded, local commit did not. The intent stays open.
    #[error("local commit failed for intent {intent_id}: {cause}")]
    PartialCommit { intent_id: String, cause: String },

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("{step} affected {affected} rows, expected 1")]
    RowCount { step: &'static str, affected: usize },

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result of a fully applied operation.
#[derive(Debug, Clone)]
pub struct Committed {
    pub intent_id: String,
    pub receipt: ChainReceipt,
}

/// Dual-write executor bound to the shared store, chain and key box.
pub struct DualWrite<'a> {
    db: &'a VotingDb,
    chain: &'a dyn ChainGateway,
    secrets: &'a SecretBox,
}

impl<'a> DualWrite<'a> {
    pub fn new(db: &'a VotingDb, chain: &'a dyn ChainGateway, secrets: &'a SecretBox) -> Self {
        Self { db, chain, secrets }
    }

    /// Run `payload` on chain (signed by `signer_id`'s wallet), then locally.
    pub async fn execute(
        &self,
        payload: OperationPayload,
        signer_id: u64,
        actor_id: u64,
    ) -> Result<Committed, LedgerError> {
        let wallets = WalletProvider::new(self.db, self.secrets);
        let call = chain_call(self.db, &wallets, &payload)?;
        let signer_key = wallets.signer_key(signer_id)?;

        let intents = IntentRepository::new(self.db);
        let intent = intents
            .begin(payload, signer_id, actor_id)
            .map_err(|e| match e {
                DbError::Conflict(msg) => LedgerError::InFlight(msg),
                other => LedgerError::Db(other),
            })?;
        let intent_id = intent.id.clone();

        // Re-check under the claimed key; closes check-then-act races
        if let Some(reason) = claim_conflict(self.db, &intent.payload)? {
            log_status_error(intents.mark_failed(&intent_id, &reason), &intent_id);
            return Err(LedgerError::Precondition(reason));
        }

        info!(
            intent_id = %intent_id,
            kind = %intent.kind,
            method = call.method(),
            signer_id,
            "Submitting chain call"
        );

        let receipt = match self.chain.submit(&signer_key, &call).await {
            Ok(receipt) => receipt,
            Err(e) if e.outcome_unknown() => {
                // Key stays held so the same call cannot be broadcast twice
                warn!(
                    intent_id = %intent_id,
                    kind = %intent.kind,
                    tx_hash = e.pending_tx_hash().unwrap_or("-"),
                    error = %e,
                    "Chain outcome unknown; intent left pending"
                );
                log_status_error(
                    intents.record_unconfirmed(&intent_id, e.pending_tx_hash(), &format!("chain: {e}")),
                    &intent_id,
                );
                return Err(LedgerError::Chain {
                    intent_id,
                    source: e,
                });
            }
            Err(e) => {
                warn!(intent_id = %intent_id, kind = %intent.kind, error = %e, "Chain call failed");
                log_status_error(intents.mark_failed(&intent_id, &format!("chain: {e}")), &intent_id);
                return Err(LedgerError::Chain {
                    intent_id,
                    source: e,
                });
            }
        };

        if !receipt.success {
            warn!(intent_id = %intent_id, tx_hash = %receipt.tx_hash, "Chain transaction reverted");
            log_status_error(
                intents.mark_failed(&intent_id, &format!("chain: {} reverted", receipt.tx_hash)),
                &intent_id,
            );
            return Err(LedgerError::Rejected {
                intent_id,
                tx_hash: receipt.tx_hash,
            });
        }

        intents.mark_chain_confirmed(&intent_id, &receipt.tx_hash)?;

        if let Err(e) = commit_local(self.db, &intent.payload, &receipt.tx_hash) {
            error!(
                intent_id = %intent_id,
                kind = %intent.kind,
                tx_hash = %receipt.tx_hash,
                error = %e,
                "Local commit failed after chain success; left for reconciliation"
            );
            log_status_error(intents.record_commit_failure(&intent_id, &e.to_string()), &intent_id);
            return Err(LedgerError::PartialCommit {
                intent_id,
                cause: e.to_string(),
            });
        }

        // Both sides are applied; a failed status write is repaired by the reconciler
        log_status_error(intents.mark_committed(&intent_id), &intent_id);
        info!(intent_id = %intent_id, kind = %intent.kind, tx_hash = %receipt.tx_hash, "Operation committed");

        Ok(Committed { intent_id, receipt })
    }
}

fn log_status_error(result: Result<usize, DbError>, intent_id: &str) {
    if let Err(e) = result {
        error!(intent_id = %intent_id, error = %e, "Failed to update intent status");
    }
}

fn wallet_address(wallets: &WalletProvider<'_>, user_id: u64) -> Result<String, LedgerError> {
    match wallets.get(user_id) {
        Ok(wallet) => Ok(wallet.address),
        Err(WalletError::Missing(id)) => Err(LedgerError::Precondition(format!(
            "User {id} has no wallet yet"
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Derive the contract call for a payload.
pub(crate) fn chain_call(
    db: &VotingDb,
    wallets: &WalletProvider<'_>,
    payload: &OperationPayload,
) -> Result<ChainCall, LedgerError> {
    let call = match payload {
        OperationPayload::RegisterParticipant { user_id } => ChainCall::AddParticipant {
            participant_id: *user_id,
            participant_address: wallet_address(wallets, *user_id)?,
        },
        OperationPayload::CreateElection {
            name,
            description,
            start_date,
            end_date,
            ..
        } => ChainCall::AddVoteEvent {
            name: name.clone(),
            description: description.clone(),
            start_ts: start_date.timestamp().max(0) as u64,
            end_ts: end_date.timestamp().max(0) as u64,
            max_participant_vote: MAX_VOTES_PER_PARTICIPANT,
        },
        OperationPayload::ActivateElection { election_id } => ChainCall::ActivateVoteEvent {
            election_index: Election::chain_index(*election_id),
        },
        OperationPayload::AssignCandidate {
            election_id,
            candidate_id,
            designation,
            description,
            ..
        } => {
            let candidate = AccountRepository::new(db)
                .get(*candidate_id)?
                .ok_or_else(|| LedgerError::Precondition("Candidate not exists".to_string()))?;
            ChainCall::AddVoteCandidate {
                candidate_address: wallet_address(wallets, *candidate_id)?,
                name: candidate.name,
                party: designation.clone(),
                bio: description.clone(),
                election_index: Election::chain_index(*election_id),
            }
        }
        OperationPayload::CastVote {
            election_id,
            voter_id,
            candidate_id,
            ..
        } => ChainCall::Participate {
            election_index: Election::chain_index(*election_id),
            candidate_address: wallet_address(wallets, *candidate_id)?,
            voter_address: wallet_address(wallets, *voter_id)?,
        },
    };
    Ok(call)
}

/// Reason the claimed operation can no longer proceed, if any.
fn claim_conflict(db: &VotingDb, payload: &OperationPayload) -> Result<Option<String>, DbError> {
    let reason = match payload {
        OperationPayload::RegisterParticipant { user_id } => AccountRepository::new(db)
            .get(*user_id)?
            .filter(|a| a.is_verified)
            .map(|_| "Your account is already verified".to_string()),
        OperationPayload::CreateElection { election_id, .. } => {
            let next = ElectionRepository::new(db).next_id()?;
            (next != *election_id)
                .then(|| "Another election was created at the same time, please retry".to_string())
        }
        OperationPayload::ActivateElection { election_id } => ElectionRepository::new(db)
            .get(*election_id)?
            .filter(|e| e.is_active)
            .map(|_| "Election is already active".to_string()),
        OperationPayload::AssignCandidate {
            election_id,
            candidate_id,
            ..
        } => CandidateRepository::new(db)
            .find_assignment(*election_id, *candidate_id)?
            .map(|_| "Candidate already exists".to_string()),
        OperationPayload::CastVote {
            election_id,
            voter_id,
            ..
        } => ParticipationRepository::new(db)
            .get(*election_id, *voter_id)?
            .map(|_| "Vote already casted in this election".to_string()),
    };
    Ok(reason)
}

fn expect_one(step: &'static str, affected: usize) -> Result<(), CommitError> {
    if affected == 1 {
        Ok(())
    } else {
        Err(CommitError::RowCount { step, affected })
    }
}

/// Apply the local half of an operation and stamp its transaction hash.
///
/// Idempotent: replaying a payload whose row already exists only re-stamps.
pub(crate) fn commit_local(
    db: &VotingDb,
    payload: &OperationPayload,
    tx_hash: &str,
) -> Result<(), CommitError> {
    let now = Utc::now();
    match payload {
        OperationPayload::RegisterParticipant { user_id } => {
            let accounts = AccountRepository::new(db);
            expect_one("mark_verified", accounts.mark_verified(*user_id)?)?;
            expect_one("stamp_account", accounts.stamp_chain_hash(*user_id, tx_hash)?)?;
        }
        OperationPayload::CreateElection {
            election_id,
            name,
            description,
            start_date,
            end_date,
            created_by,
        } => {
            let elections = ElectionRepository::new(db);
            if elections.get(*election_id)?.is_none() {
                elections.insert(&Election {
                    id: *election_id,
                    name: name.clone(),
                    description: description.clone(),
                    start_date: *start_date,
                    end_date: *end_date,
                    is_active: false,
                    results_generated: false,
                    created_by: *created_by,
                    chain_tx_hash: None,
                    activation_tx_hash: None,
                    created_at: now,
                    updated_at: now,
                })?;
            }
            expect_one("stamp_election", elections.stamp_chain_hash(*election_id, tx_hash)?)?;
        }
        OperationPayload::ActivateElection { election_id } => {
            let elections = ElectionRepository::new(db);
            expect_one("set_active", elections.set_active(*election_id, true)?)?;
            expect_one(
                "stamp_activation",
                elections.stamp_activation_hash(*election_id, tx_hash)?,
            )?;
        }
        OperationPayload::AssignCandidate {
            assignment_id,
            election_id,
            candidate_id,
            designation,
            description,
            image,
        } => {
            let candidates = CandidateRepository::new(db);
            if candidates.assignment(*assignment_id)?.is_none() {
                candidates.insert_assignment(&ElectionCandidate {
                    id: *assignment_id,
                    election_id: *election_id,
                    candidate_id: *candidate_id,
                    designation: designation.clone(),
                    description: description.clone(),
                    image: image.clone(),
                    has_won: false,
                    chain_tx_hash: None,
                    created_at: now,
                })?;
            }
            expect_one(
                "stamp_assignment",
                candidates.stamp_chain_hash(*assignment_id, tx_hash)?,
            )?;
        }
        OperationPayload::CastVote {
            election_id,
            voter_id,
            assignment_id,
            candidate_id,
        } => {
            let participations = ParticipationRepository::new(db);
            if participations.get(*election_id, *voter_id)?.is_none() {
                participations.insert(&Participation {
                    election_id: *election_id,
                    voter_id: *voter_id,
                    assignment_id: *assignment_id,
                    candidate_id: *candidate_id,
                    chain_tx_hash: None,
                    created_at: now,
                })?;
            }
            expect_one(
                "stamp_participation",
                participations.stamp_chain_hash(*election_id, *voter_id, tx_hash)?,
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::Role;
    use crate::blockchain::gateway::mock::{MockChain, Outcome};
    use crate::storage::database::tests::temp_db;
    use crate::storage::repository::accounts::tests::voter;
    use crate::storage::repository::elections::tests::election;
    use crate::storage::IntentStatus;

    fn secrets() -> SecretBox {
        SecretBox::new(&[1u8; 32]).unwrap()
    }

    fn admin_with_wallet(db: &VotingDb, secrets: &SecretBox) -> u64 {
        let admin = AccountRepository::new(db)
            .ensure_admin("admin", "Admin", "admin@example.com", "hash")
            .unwrap();
        WalletProvider::new(db, secrets).get_or_create(admin.id).unwrap();
        admin.id
    }

    #[tokio::test]
    async fn activation_applies_only_after_chain_success() {
        let (db, _dir) = temp_db();
        let secrets = secrets();
        let chain = MockChain::default();
        let admin_id = admin_with_wallet(&db, &secrets);
        ElectionRepository::new(&db).insert(&election(1, 1, 2, false)).unwrap();

        let ledger = DualWrite::new(&db, &chain, &secrets);
        let payload = OperationPayload::ActivateElection { election_id: 1 };

        chain.push(Outcome::Error(ChainError::Rpc("connection refused".into())));
        let err = ledger.execute(payload.clone(), admin_id, admin_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Chain { .. }));
        assert!(!ElectionRepository::new(&db).get(1).unwrap().unwrap().is_active);

        chain.push(Outcome::Reverted);
        let err = ledger.execute(payload.clone(), admin_id, admin_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { .. }));
        assert!(!ElectionRepository::new(&db).get(1).unwrap().unwrap().is_active);

        let done = ledger.execute(payload, admin_id, admin_id).await.unwrap();
        let stored = ElectionRepository::new(&db).get(1).unwrap().unwrap();
        assert!(stored.is_active);
        assert_eq!(stored.activation_tx_hash.as_deref(), Some(done.receipt.tx_hash.as_str()));

        let intents = IntentRepository::new(&db);
        assert_eq!(intents.list(Some(IntentStatus::Failed)).unwrap().len(), 2);
        assert_eq!(intents.list(Some(IntentStatus::Committed)).unwrap().len(), 1);
        assert_eq!(
            chain.calls()[0],
            ChainCall::ActivateVoteEvent { election_index: 0 }
        );
    }

    #[tokio::test]
    async fn vote_is_signed_by_voter_and_recorded_once() {
        let (db, _dir) = temp_db();
        let secrets = secrets();
        let chain = MockChain::default();
        let wallets = WalletProvider::new(&db, &secrets);
        admin_with_wallet(&db, &secrets);

        let accounts = AccountRepository::new(&db);
        let voter_id = accounts.register(&voter("ada", "ada@example.com"), "h", "c").unwrap().account.id;
        let mut cand = voter("bob", "bob@example.com");
        cand.role = Role::Candidate;
        let candidate_id = accounts.register(&cand, "h", "c").unwrap().account.id;
        let voter_wallet = wallets.get_or_create(voter_id).unwrap();
        let candidate_wallet = wallets.get_or_create(candidate_id).unwrap();

        let payload = OperationPayload::CastVote {
            election_id: 3,
            voter_id,
            assignment_id: 1,
            candidate_id,
        };
        let ledger = DualWrite::new(&db, &chain, &secrets);
        ledger.execute(payload.clone(), voter_id, voter_id).await.unwrap();

        assert_eq!(
            chain.calls()[0],
            ChainCall::Participate {
                election_index: 2,
                candidate_address: candidate_wallet.address,
                voter_address: voter_wallet.address,
            }
        );
        let vote = ParticipationRepository::new(&db).get(3, voter_id).unwrap().unwrap();
        assert!(vote.chain_tx_hash.is_some());

        let err = ledger.execute(payload, voter_id, voter_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
        assert_eq!(chain.calls().len(), 1);
        assert_eq!(ParticipationRepository::new(&db).list_for_election(3).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn open_intent_blocks_a_second_operation() {
        let (db, _dir) = temp_db();
        let secrets = secrets();
        let chain = MockChain::default();
        let admin_id = admin_with_wallet(&db, &secrets);
        ElectionRepository::new(&db).insert(&election(1, 1, 2, false)).unwrap();

        IntentRepository::new(&db)
            .begin(OperationPayload::ActivateElection { election_id: 1 }, admin_id, admin_id)
            .unwrap();

        let ledger = DualWrite::new(&db, &chain, &secrets);
        let err = ledger
            .execute(OperationPayload::ActivateElection { election_id: 1 }, admin_id, admin_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InFlight(_)));
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_local_commit_keeps_intent_chain_confirmed() {
        let (db, _dir) = temp_db();
        let secrets = secrets();
        let chain = Arc::new(MockChain::default());
        let admin_id = admin_with_wallet(&db, &secrets);
        // Wallet for an account id that does not exist yet
        WalletProvider::new(&db, &secrets).get_or_create(99).unwrap();

        let ledger = DualWrite::new(&db, chain.as_ref(), &secrets);
        let err = ledger
            .execute(OperationPayload::RegisterParticipant { user_id: 99 }, admin_id, 99)
            .await
            .unwrap_err();
        let LedgerError::PartialCommit { intent_id, .. } = err else {
            panic!("expected partial commit, got {err:?}");
        };

        let intent = IntentRepository::new(&db).get(&intent_id).unwrap().unwrap();
        assert_eq!(intent.status, IntentStatus::ChainConfirmed);
        assert_eq!(intent.commit_attempts, 1);
        assert!(intent.chain_tx_hash.is_some());
        assert!(intent.last_error.unwrap().contains("mark_verified"));
    }

    #[tokio::test]
    async fn unknown_chain_outcome_keeps_the_key_claimed() {
        let (db, _dir) = temp_db();
        let secrets = secrets();
        let chain = MockChain::default();
        let admin_id = admin_with_wallet(&db, &secrets);
        let payload = OperationPayload::CreateElection {
            election_id: 1,
            name: "General".to_string(),
            description: "Vote".to_string(),
            start_date: Utc::now() + chrono::Duration::hours(1),
            end_date: Utc::now() + chrono::Duration::hours(2),
            created_by: admin_id,
        };
        let ledger = DualWrite::new(&db, &chain, &secrets);

        chain.push(Outcome::Error(ChainError::Timeout(std::time::Duration::from_secs(30))));
        let err = ledger.execute(payload.clone(), admin_id, admin_id).await.unwrap_err();
        let LedgerError::Chain { intent_id, .. } = err else {
            panic!("expected chain error, got {err:?}");
        };
        let intent = IntentRepository::new(&db).get(&intent_id).unwrap().unwrap();
        assert_eq!(intent.status, IntentStatus::Pending);
        assert!(intent.last_error.unwrap().contains("timed out"));

        let err = ledger.execute(payload.clone(), admin_id, admin_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::InFlight(_)));
        assert_eq!(chain.calls().len(), 1);
        assert!(ElectionRepository::new(&db).get(1).unwrap().is_none());
    }

    #[tokio::test]
    async fn unconfirmed_broadcast_records_its_hash() {
        let (db, _dir) = temp_db();
        let secrets = secrets();
        let chain = MockChain::default();
        let admin_id = admin_with_wallet(&db, &secrets);
        ElectionRepository::new(&db).insert(&election(1, 1, 2, false)).unwrap();
        let ledger = DualWrite::new(&db, &chain, &secrets);

        chain.push(Outcome::Error(ChainError::Unconfirmed {
            tx_hash: "0xbeef".into(),
            reason: "receipt request failed".into(),
        }));
        let err = ledger
            .execute(OperationPayload::ActivateElection { election_id: 1 }, admin_id, admin_id)
            .await
            .unwrap_err();
        let LedgerError::Chain { intent_id, .. } = err else {
            panic!("expected chain error, got {err:?}");
        };

        let intent = IntentRepository::new(&db).get(&intent_id).unwrap().unwrap();
        assert_eq!(intent.status, IntentStatus::Pending);
        assert_eq!(intent.chain_tx_hash.as_deref(), Some("0xbeef"));
        assert!(!ElectionRepository::new(&db).get(1).unwrap().unwrap().is_active);

        let err = ledger
            .execute(OperationPayload::ActivateElection { election_id: 1 }, admin_id, admin_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InFlight(_)));
        assert_eq!(chain.calls().len(), 1);
    }

    #[test]
    fn commit_local_is_idempotent() {
        let (db, _dir) = temp_db();
        let payload = OperationPayload::CreateElection {
            election_id: 1,
            name: "General".to_string(),
            description: "Vote".to_string(),
            start_date: Utc::now(),
            end_date: Utc::now() + chrono::Duration::hours(1),
            created_by: 1,
        };
        commit_local(&db, &payload, "0xaaa").unwrap();
        commit_local(&db, &payload, "0xaaa").unwrap();

        let elections = ElectionRepository::new(&db);
        assert_eq!(elections.count().unwrap(), 1);
        assert_eq!(elections.get(1).unwrap().unwrap().chain_tx_hash.as_deref(), Some("0xaaa"));
    }
}
