// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Intent Reconciler
//!
//! Background task that repairs operations left half-applied.
//!
//! ## Strategy
//!
//! Every `interval` (default 60 s) the reconciler:
//! 1. Replays the local commit of each `chain_confirmed` intent whose
//!    request already gave up (`commit_attempts > 0`) or which has not been
//!    touched for the grace period. Local commits are idempotent.
//! 2. Marks `pending` intents older than the grace period `abandoned`.
//!    Their chain outcome is unknown, so they are logged for manual review
//!    and never retried automatically.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::executor::commit_local;
use crate::storage::{DbResult, IntentRepository, IntentStatus, VotingDb};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    /// `chain_confirmed` intents now committed
    pub committed: usize,
    /// `chain_confirmed` intents whose replay failed again
    pub still_failing: usize,
    /// `pending` intents given up on
    pub abandoned: usize,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Run one reconciliation pass.
pub fn reconcile_once(db: &VotingDb, grace: Duration) -> DbResult<ReconcileReport> {
    let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(grace)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let intents = IntentRepository::new(db);
    let mut report = ReconcileReport::default();

    for intent in intents.list(Some(IntentStatus::ChainConfirmed))?.into_iter().rev() {
        // The originating request may still be finishing this one
        if intent.commit_attempts == 0 && intent.updated_at >= cutoff {
            continue;
        }
        let Some(tx_hash) = intent.chain_tx_hash.as_deref() else {
            intents.record_commit_failure(&intent.id, "chain_confirmed without tx hash")?;
            report.still_failing += 1;
            continue;
        };

        match commit_local(db, &intent.payload, tx_hash) {
            Ok(()) => {
                intents.mark_committed(&intent.id)?;
                report.committed += 1;
                info!(
                    intent_id = %intent.id,
                    kind = %intent.kind,
                    tx_hash = %tx_hash,
                    "Reconciled chain-confirmed intent"
                );
            }
            Err(e) => {
                intents.record_commit_failure(&intent.id, &e.to_string())?;
                report.still_failing += 1;
                warn!(
                    intent_id = %intent.id,
                    kind = %intent.kind,
                    attempts = intent.commit_attempts + 1,
                    error = %e,
                    "Reconciliation replay failed"
                );
            }
        }
    }

    for intent in intents.list_stale(cutoff)? {
        if intent.status != IntentStatus::Pending {
            continue;
        }
        intents.mark_abandoned(
            &intent.id,
            "pending past grace period; chain outcome unknown",
        )?;
        report.abandoned += 1;
        warn!(
            intent_id = %intent.id,
            kind = %intent.kind,
            dedupe_key = %intent.dedupe_key,
            created_at = %intent.created_at,
            "Abandoned stuck intent; needs manual review against the chain"
        );
    }

    Ok(report)
}

/// Periodic reconciliation loop.
pub struct Reconciler {
    db: Arc<VotingDb>,
    interval: Duration,
    grace: Duration,
}

impl Reconciler {
    pub fn new(db: Arc<VotingDb>, interval: Duration, grace: Duration) -> Self {
        Self { db, interval, grace }
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            grace_secs = self.grace.as_secs(),
            "Intent reconciler starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Intent reconciler shutting down");
                return;
            }

            match reconcile_once(&self.db, self.grace) {
                Ok(report) if report.is_empty() => {}
                Ok(report) => info!(
                    committed = report.committed,
                    still_failing = report.still_failing,
                    abandoned = report.abandoned,
                    "Reconciliation pass finished"
                ),
                Err(e) => error!(error = %e, "Reconciliation pass failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Intent reconciler shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SecretBox;
    use crate::blockchain::{gateway::mock::MockChain, WalletProvider};
    use crate::ledger::{DualWrite, LedgerError};
    use crate::storage::database::tests::temp_db;
    use crate::storage::repository::accounts::tests::voter;
    use crate::storage::{AccountRepository, OperationPayload};

    #[tokio::test]
    async fn one_pass_repairs_a_failed_local_commit() {
        let (db, _dir) = temp_db();
        let secrets = SecretBox::new(&[1u8; 32]).unwrap();
        let chain = MockChain::default();
        let wallets = WalletProvider::new(&db, &secrets);
        // First registered account will get id 1
        wallets.get_or_create(1).unwrap();

        let ledger = DualWrite::new(&db, &chain, &secrets);
        let err = ledger
            .execute(OperationPayload::RegisterParticipant { user_id: 1 }, 1, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PartialCommit { .. }));

        // Still failing while the row is missing
        let report = reconcile_once(&db, Duration::from_secs(300)).unwrap();
        assert_eq!(report.still_failing, 1);

        let account = AccountRepository::new(&db)
            .register(&voter("ada", "ada@example.com"), "hash", "code")
            .unwrap()
            .account;
        assert_eq!(account.id, 1);

        let report = reconcile_once(&db, Duration::from_secs(300)).unwrap();
        assert_eq!(report.committed, 1);

        let repaired = AccountRepository::new(&db).get(1).unwrap().unwrap();
        assert!(repaired.is_verified);
        assert!(repaired.chain_tx_hash.is_some());
        let intents = IntentRepository::new(&db);
        assert_eq!(intents.list(Some(IntentStatus::Committed)).unwrap().len(), 1);

        // Nothing left to do
        assert!(reconcile_once(&db, Duration::from_secs(300)).unwrap().is_empty());
    }

    #[test]
    fn stuck_pending_intents_are_abandoned_after_grace() {
        let (db, _dir) = temp_db();
        let intents = IntentRepository::new(&db);
        let intent = intents
            .begin(OperationPayload::ActivateElection { election_id: 4 }, 1, 1)
            .unwrap();

        // Inside the grace period nothing happens
        assert!(reconcile_once(&db, Duration::from_secs(300)).unwrap().is_empty());
        assert_eq!(intents.get(&intent.id).unwrap().unwrap().status, IntentStatus::Pending);

        std::thread::sleep(Duration::from_millis(5));
        let report = reconcile_once(&db, Duration::ZERO).unwrap();
        assert_eq!(report.abandoned, 1);
        assert_eq!(intents.get(&intent.id).unwrap().unwrap().status, IntentStatus::Abandoned);

        // The key is released
        intents
            .begin(OperationPayload::ActivateElection { election_id: 4 }, 1, 1)
            .unwrap();
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let (db, _dir) = temp_db();
        let token = CancellationToken::new();
        let reconciler = Reconciler::new(Arc::new(db), Duration::from_secs(3600), Duration::ZERO);
        let handle = tokio::spawn(reconciler.run(token.clone()));
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
