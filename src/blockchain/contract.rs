// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Voting contract bindings.

use alloy::sol;

// Only the write methods the server calls are bound here
sol! {
    #[sol(rpc)]
    interface ITaswit {
        function addNewVoteEvent(
            string name,
            string description,
            uint256 startTime,
            uint256 endTime,
            uint256 maxParticipantVote
        ) external;

        function activateVoteEvent(uint256 eventIndex) external;

        function addVoteCandidate(
            address candidateAddress,
            string name,
            string party,
            string bio,
            bool isActive,
            uint256 eventIndex
        ) external;

        function addNewParticipant(
            uint256 participantId,
            address participantAddress,
            bool isActive
        ) external;

        function participateInVoteEvent(
            uint256 eventIndex,
            address candidateAddress,
            address voterAddress
        ) external;
    }
}
