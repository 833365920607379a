// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Election result tallying.
//!
//! Every assignment tied at the highest count wins. When every count is
//! zero there is no winner.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::ElectionCandidate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyOutcome {
    /// No assignment received a vote.
    NoVotes,
    /// Assignment ids tied at the maximum, in assignment order.
    Winners { assignment_ids: Vec<u64>, votes: u64 },
}

/// Per-assignment count, for responses.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct CandidateTally {
    pub assignment_id: u64,
    pub candidate_id: u64,
    pub votes: u64,
}

/// Pair every assignment with its count (missing counts are zero).
pub fn count_votes(
    assignments: &[ElectionCandidate],
    counts: &HashMap<u64, u64>,
) -> Vec<CandidateTally> {
    assignments
        .iter()
        .map(|a| CandidateTally {
            assignment_id: a.id,
            candidate_id: a.candidate_id,
            votes: counts.get(&a.id).copied().unwrap_or(0),
        })
        .collect()
}

pub fn decide(tallies: &[CandidateTally]) -> TallyOutcome {
    let max = tallies.iter().map(|t| t.votes).max().unwrap_or(0);
    if max == 0 {
        return TallyOutcome::NoVotes;
    }
    TallyOutcome::Winners {
        assignment_ids: tallies
            .iter()
            .filter(|t| t.votes == max)
            .map(|t| t.assignment_id)
            .collect(),
        votes: max,
    }
}
