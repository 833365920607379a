// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain call and receipt types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `maxParticipantVote` passed when creating a vote event.
pub const MAX_VOTES_PER_PARTICIPANT: u64 = 1;

/// Outcome of a mined contract transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChainReceipt {
    /// Receipt status; `false` means the transaction reverted
    pub success: bool,
    /// `0x`-prefixed transaction hash
    pub tx_hash: String,
    /// Block the transaction was included in, if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

/// One contract method invocation with its arguments.
///
/// Election indices are contract-side (`election id - 1`). Addresses are
/// `0x` hex strings and are parsed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    /// `addNewVoteEvent(name, description, startTs, endTs, maxParticipantVote)`
    AddVoteEvent {
        name: String,
        description: String,
        start_ts: u64,
        end_ts: u64,
        max_participant_vote: u64,
    },
    /// `activateVoteEvent(electionIndex)`
    ActivateVoteEvent { election_index: u64 },
    /// `addVoteCandidate(candidateAddr, name, party, bio, true, electionIndex)`
    AddVoteCandidate {
        candidate_address: String,
        name: String,
        party: String,
        bio: String,
        election_index: u64,
    },
    /// `addNewParticipant(participantId, participantAddr, true)`
    AddParticipant {
        participant_id: u64,
        participant_address: String,
    },
    /// `participateInVoteEvent(electionIndex, candidateAddr, voterAddr)`
    Participate {
        election_index: u64,
        candidate_address: String,
        voter_address: String,
    },
}

impl ChainCall {
    /// Solidity method name, for logs and ABI checks.
    pub fn method(&self) -> &'static str {
        match self {
            ChainCall::AddVoteEvent { .. } => "addNewVoteEvent",
            ChainCall::ActivateVoteEvent { .. } => "activateVoteEvent",
            ChainCall::AddVoteCandidate { .. } => "addVoteCandidate",
            ChainCall::AddParticipant { .. } => "addNewParticipant",
            ChainCall::Participate { .. } => "participateInVoteEvent",
        }
    }
}

/// Methods the deployed contract must expose.
pub const REQUIRED_METHODS: &[&str] = &[
    "addNewVoteEvent",
    "activateVoteEvent",
    "addVoteCandidate",
    "addNewParticipant",
    "participateInVoteEvent",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_call_names_a_required_method() {
        let calls = [
            ChainCall::AddVoteEvent {
                name: String::new(),
                description: String::new(),
                start_ts: 0,
                end_ts: 0,
                max_participant_vote: MAX_VOTES_PER_PARTICIPANT,
            },
            ChainCall::ActivateVoteEvent { election_index: 0 },
            ChainCall::AddVoteCandidate {
                candidate_address: String::new(),
                name: String::new(),
                party: String::new(),
                bio: String::new(),
                election_index: 0,
            },
            ChainCall::AddParticipant {
                participant_id: 1,
                participant_address: String::new(),
            },
            ChainCall::Participate {
                election_index: 0,
                candidate_address: String::new(),
                voter_address: String::new(),
            },
        ];
        for call in &calls {
            assert!(REQUIRED_METHODS.contains(&call.method()));
        }
    }
}
