// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Dual-Write Ledger
//!
//! Every state change that is mirrored to the voting contract runs through
//! [`DualWrite::execute`]:
//!
//! 1. record a `pending` [`OperationIntent`](crate::storage::OperationIntent)
//!    holding the operation's dedupe key
//! 2. submit the contract call signed by the intent's wallet
//! 3. mark the intent `chain_confirmed` with the transaction hash
//! 4. apply the local write and stamp the hash on the row
//! 5. mark the intent `committed`
//!
//! A failure in step 2 ends the intent `failed` with local state untouched.
//! A failure in step 4 leaves it `chain_confirmed`; the [`Reconciler`]
//! replays the (idempotent) local write later.

pub mod executor;
pub mod reconciler;

pub use executor::{CommitError, Committed, DualWrite, LedgerError};
pub use reconciler::{reconcile_once, ReconcileReport, Reconciler};
