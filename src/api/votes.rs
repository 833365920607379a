// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vote casting. The only contract call signed by the voter's own wallet.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    api::elections::load_election,
    auth::VoterOnly,
    error::ApiError,
    models::{respond, CastVoteRequest, Envelope},
    state::AppState,
    storage::{
        AccountRepository, CandidateRepository, ElectionPhase, OperationPayload, Participation,
        ParticipationRepository,
    },
};

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    pub participation: Participation,
}

/// Cast the caller's single vote in an ongoing election.
///
/// `candidate_id` is the candidate's account id.
#[utoipa::path(
    post,
    path = "/v1/votes",
    tag = "Votes",
    security(("bearer_auth" = [])),
    request_body = CastVoteRequest,
    responses(
        (status = 201, description = "Vote has casted", body = VoteResponse),
        (status = 403, description = "Voter is blocked"),
        (status = 404, description = "Election or candidate not found"),
        (status = 409, description = "Already voted or election not open"),
        (status = 502, description = "Chain call failed")
    )
)]
pub async fn cast_vote(
    VoterOnly(user): VoterOnly,
    State(state): State<AppState>,
    Json(req): Json<CastVoteRequest>,
) -> Result<(StatusCode, Json<Envelope<VoteResponse>>), ApiError> {
    // The token flag may predate a block
    let voter = AccountRepository::new(&state.db)
        .get(user.user_id)?
        .ok_or_else(|| ApiError::not_found("User not exists"))?;
    if voter.is_blocked {
        return Err(ApiError::forbidden("Can't Vote, You are blocked by Admin"));
    }

    let election = load_election(&state, req.election_id)?;
    match election.phase(Utc::now()) {
        ElectionPhase::Ongoing => {}
        ElectionPhase::Completed => return Err(ApiError::conflict("Election has completed")),
        ElectionPhase::Upcoming => return Err(ApiError::conflict("Election has not started yet")),
        ElectionPhase::Inactive => return Err(ApiError::conflict("Election is not active")),
    }

    let assignment = CandidateRepository::new(&state.db)
        .find_assignment(req.election_id, req.candidate_id)?
        .ok_or_else(|| ApiError::not_found("Candidate not exists in this election"))?;

    let participations = ParticipationRepository::new(&state.db);
    if participations.get(req.election_id, voter.id)?.is_some() {
        return Err(ApiError::conflict("Vote already casted in this election"));
    }

    let payload = OperationPayload::CastVote {
        election_id: req.election_id,
        voter_id: voter.id,
        assignment_id: assignment.id,
        candidate_id: req.candidate_id,
    };
    let committed = state.ledger().execute(payload, voter.id, voter.id).await?;

    let participation = participations
        .get(req.election_id, voter.id)?
        .ok_or_else(|| ApiError::internal("participation missing after commit"))?;
    info!(
        election_id = req.election_id,
        voter_id = voter.id,
        tx_hash = %committed.receipt.tx_hash,
        "Vote cast"
    );

    Ok((
        StatusCode::CREATED,
        respond("Vote has casted", VoteResponse { participation }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::blockchain::gateway::mock::Outcome;
    use crate::blockchain::{ChainCall, WalletProvider};
    use crate::state::test_support::{seed_account, test_context};
    use crate::storage::repository::{
        candidates::tests::assignment, elections::tests::election,
    };
    use crate::storage::{Account, ElectionRepository};

    fn voter_token(state: &AppState, account: &Account) -> VoterOnly {
        let token = state.jwt.issue(account).unwrap();
        VoterOnly(state.jwt.verify(&token).unwrap())
    }

    /// Election 1 ongoing with candidate `cara` assigned as assignment 1.
    fn ongoing(state: &AppState) -> Account {
        let cara = seed_account(state, "cara", Role::Candidate, true);
        ElectionRepository::new(&state.db)
            .insert(&election(1, -1, 48, true))
            .unwrap();
        CandidateRepository::new(&state.db)
            .insert_assignment(&assignment(1, 1, cara.id))
            .unwrap();
        cara
    }

    fn ballot(candidate_id: u64) -> Json<CastVoteRequest> {
        Json(CastVoteRequest {
            election_id: 1,
            candidate_id,
        })
    }

    #[tokio::test]
    async fn vote_is_signed_by_the_voter() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let cara = ongoing(&state);
        let vic = seed_account(&state, "vic", Role::Voter, true);

        let (status, Json(body)) = cast_vote(voter_token(&state, &vic), State(state.clone()), ballot(cara.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.msg, "Vote has casted");
        assert_eq!(body.body.participation.assignment_id, 1);
        assert!(body.body.participation.chain_tx_hash.is_some());

        let wallets = WalletProvider::new(&state.db, &state.secrets);
        assert_eq!(
            ctx.chain.calls()[0],
            ChainCall::Participate {
                election_index: 0,
                candidate_address: wallets.get(cara.id).unwrap().address,
                voter_address: wallets.get(vic.id).unwrap().address,
            }
        );
    }

    #[tokio::test]
    async fn second_vote_is_refused_without_chain_call() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let cara = ongoing(&state);
        let vic = seed_account(&state, "vic", Role::Voter, true);

        let (status, _) = cast_vote(voter_token(&state, &vic), State(state.clone()), ballot(cara.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let err = cast_vote(voter_token(&state, &vic), State(state.clone()), ballot(cara.id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "Vote already casted in this election");
        assert_eq!(ctx.chain.calls().len(), 1);
        assert_eq!(
            ParticipationRepository::new(&state.db).list_for_election(1).unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn blocked_voter_cannot_vote() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let cara = ongoing(&state);
        let vic = seed_account(&state, "vic", Role::Voter, true);
        // Token issued before the block still carries is_blocked = false
        let stale = voter_token(&state, &vic);
        AccountRepository::new(&state.db).set_blocked(vic.id, true).unwrap();

        let err = cast_vote(stale, State(state.clone()), ballot(cara.id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(ctx.chain.calls().is_empty());
    }

    #[tokio::test]
    async fn election_must_be_ongoing() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let cara = seed_account(&state, "cara", Role::Candidate, true);
        let vic = seed_account(&state, "vic", Role::Voter, true);
        let elections = ElectionRepository::new(&state.db);
        elections.insert(&election(1, -48, -1, true)).unwrap();
        elections.insert(&election(2, 1, 48, true)).unwrap();
        elections.insert(&election(3, -1, 48, false)).unwrap();

        for (id, msg) in [
            (1, "Election has completed"),
            (2, "Election has not started yet"),
            (3, "Election is not active"),
        ] {
            let req = Json(CastVoteRequest {
                election_id: id,
                candidate_id: cara.id,
            });
            let err = cast_vote(voter_token(&state, &vic), State(state.clone()), req)
                .await
                .unwrap_err();
            assert_eq!(err.status, StatusCode::CONFLICT);
            assert_eq!(err.message, msg);
        }

        let err = cast_vote(
            voter_token(&state, &vic),
            State(state.clone()),
            Json(CastVoteRequest {
                election_id: 9,
                candidate_id: cara.id,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejected_vote_records_nothing() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let cara = ongoing(&state);
        let vic = seed_account(&state, "vic", Role::Voter, true);

        ctx.chain.push(Outcome::Reverted);
        let err = cast_vote(voter_token(&state, &vic), State(state.clone()), ballot(cara.id))
            .await
            .unwrap_err();
        assert_eq!(err.code, "chain_rejected");
        assert!(ParticipationRepository::new(&state.db).get(1, vic.id).unwrap().is_none());

        // A failed intent does not block the retry
        let (status, _) = cast_vote(voter_token(&state, &vic), State(state.clone()), ballot(cara.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }
}
