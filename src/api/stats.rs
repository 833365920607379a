// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Dashboard counters for voters, candidates and admins.

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    api::users::candidate_elections_of,
    auth::{AdminOnly, Auth, CandidateOnly, Role, VoterOnly},
    error::ApiError,
    models::{respond, ApiResult, CountResponse},
    state::AppState,
    storage::{
        AccountRepository, CandidateRepository, ElectionPhase, ElectionRepository,
        ParticipationRepository,
    },
};

/// Votes one candidate received in one election.
#[derive(Debug, Serialize, ToSchema)]
pub struct ElectionVotes {
    pub election_id: u64,
    pub name: String,
    pub phase: ElectionPhase,
    pub votes: u64,
    pub has_won: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ElectionVotesResponse {
    pub elections: Vec<ElectionVotes>,
}

fn count(msg: &str, count: usize) -> ApiResult<CountResponse> {
    Ok(respond(msg, CountResponse { count }))
}

#[utoipa::path(
    get,
    path = "/v1/stats/my-votes",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Votes record found", body = CountResponse))
)]
pub async fn my_votes(VoterOnly(user): VoterOnly, State(state): State<AppState>) -> ApiResult<CountResponse> {
    let votes = ParticipationRepository::new(&state.db).list_for_voter(user.user_id)?;
    count("Votes record found", votes.len())
}

#[utoipa::path(
    get,
    path = "/v1/stats/voters",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Registered Voters record found", body = CountResponse))
)]
pub async fn voters(AdminOnly(_admin): AdminOnly, State(state): State<AppState>) -> ApiResult<CountResponse> {
    let total = AccountRepository::new(&state.db).count_verified(Role::Voter)?;
    count("Registered Voters record found", total)
}

#[utoipa::path(
    get,
    path = "/v1/stats/candidates",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Registered Candidates record found", body = CountResponse))
)]
pub async fn candidates(AdminOnly(_admin): AdminOnly, State(state): State<AppState>) -> ApiResult<CountResponse> {
    let total = AccountRepository::new(&state.db).count_verified(Role::Candidate)?;
    count("Registered Candidates record found", total)
}

#[utoipa::path(
    get,
    path = "/v1/stats/elections",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Elections record found", body = CountResponse))
)]
pub async fn elections(AdminOnly(_admin): AdminOnly, State(state): State<AppState>) -> ApiResult<CountResponse> {
    count("Elections record found", ElectionRepository::new(&state.db).count()?)
}

/// Elections an admin has activated and that have not ended.
#[utoipa::path(
    get,
    path = "/v1/stats/elections/active",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Elections record found", body = CountResponse))
)]
pub async fn active_elections(_auth: Auth, State(state): State<AppState>) -> ApiResult<CountResponse> {
    let now = Utc::now();
    let active = ElectionRepository::new(&state.db)
        .list()?
        .iter()
        .filter(|e| matches!(e.phase(now), ElectionPhase::Upcoming | ElectionPhase::Ongoing))
        .count();
    count("Elections record found", active)
}

#[utoipa::path(
    get,
    path = "/v1/stats/elections/ongoing",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Ongoing Elections record found", body = CountResponse))
)]
pub async fn ongoing_elections(_auth: Auth, State(state): State<AppState>) -> ApiResult<CountResponse> {
    let ongoing = ElectionRepository::new(&state.db).list_in_phase(ElectionPhase::Ongoing, Utc::now())?;
    count("Ongoing Elections record found", ongoing.len())
}

#[utoipa::path(
    get,
    path = "/v1/stats/candidate/elections",
    operation_id = "count_candidate_elections",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Votes record found", body = CountResponse))
)]
pub async fn candidate_elections(
    CandidateOnly(user): CandidateOnly,
    State(state): State<AppState>,
) -> ApiResult<CountResponse> {
    let standing = CandidateRepository::new(&state.db).list_for_candidate(user.user_id)?;
    count("Votes record found", standing.len())
}

#[utoipa::path(
    get,
    path = "/v1/stats/candidate/votes",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Votes record found", body = CountResponse))
)]
pub async fn candidate_votes(
    CandidateOnly(user): CandidateOnly,
    State(state): State<AppState>,
) -> ApiResult<CountResponse> {
    let votes = ParticipationRepository::new(&state.db).list_for_candidate(user.user_id)?;
    count("Votes record found", votes.len())
}

#[utoipa::path(
    get,
    path = "/v1/stats/candidate/wins",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Winning record found", body = CountResponse))
)]
pub async fn candidate_wins(
    CandidateOnly(user): CandidateOnly,
    State(state): State<AppState>,
) -> ApiResult<CountResponse> {
    let wins = CandidateRepository::new(&state.db)
        .list_for_candidate(user.user_id)?
        .iter()
        .filter(|a| a.has_won)
        .count();
    count("Winning record found", wins)
}

/// Vote totals per election the calling candidate stands in.
#[utoipa::path(
    get,
    path = "/v1/stats/candidate/election-votes",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Elections record found", body = ElectionVotesResponse),
        (status = 404, description = "No Elections record Found")
    )
)]
pub async fn candidate_election_votes(
    CandidateOnly(user): CandidateOnly,
    State(state): State<AppState>,
) -> ApiResult<ElectionVotesResponse> {
    let rows = candidate_elections_of(&state, user.user_id)?;
    if rows.is_empty() {
        return Err(ApiError::not_found("No Elections record Found"));
    }
    let elections = rows
        .into_iter()
        .map(|row| ElectionVotes {
            election_id: row.election.election.id,
            name: row.election.election.name,
            phase: row.election.phase,
            votes: row.votes,
            has_won: row.assignment.has_won,
        })
        .collect();
    Ok(respond("Elections record found", ElectionVotesResponse { elections }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;

    use crate::auth::AuthenticatedUser;
    use crate::state::test_support::{admin_account, seed_account, test_context};
    use crate::storage::repository::{
        candidates::tests::assignment, elections::tests::election,
    };
    use crate::storage::{Account, Participation};

    fn user(state: &AppState, account: &Account) -> AuthenticatedUser {
        let token = state.jwt.issue(account).unwrap();
        state.jwt.verify(&token).unwrap()
    }

    fn vote(state: &AppState, election_id: u64, voter_id: u64, assignment_id: u64, candidate_id: u64) {
        ParticipationRepository::new(&state.db)
            .insert(&Participation {
                election_id,
                voter_id,
                assignment_id,
                candidate_id,
                chain_tx_hash: None,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn counters_reflect_store() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let admin = user(&state, &admin_account(&state));
        let vic = seed_account(&state, "vic", Role::Voter, true);
        let val = seed_account(&state, "val", Role::Voter, true);
        seed_account(&state, "pending", Role::Voter, false);
        let cara = seed_account(&state, "cara", Role::Candidate, true);

        let election_repo = ElectionRepository::new(&state.db);
        election_repo.insert(&election(1, -1, 48, true)).unwrap();
        election_repo.insert(&election(2, 1, 48, true)).unwrap();
        election_repo.insert(&election(3, -48, -1, true)).unwrap();
        election_repo.insert(&election(4, -1, 48, false)).unwrap();
        let assignments = CandidateRepository::new(&state.db);
        assignments.insert_assignment(&assignment(1, 1, cara.id)).unwrap();
        assignments.insert_assignment(&assignment(2, 3, cara.id)).unwrap();
        assignments.mark_winners(&[2]).unwrap();
        vote(&state, 1, vic.id, 1, cara.id);
        vote(&state, 1, val.id, 1, cara.id);
        vote(&state, 3, vic.id, 2, cara.id);

        let Json(body) = voters(AdminOnly(admin.clone()), State(state.clone())).await.unwrap();
        assert_eq!(body.body.count, 2);
        let Json(body) = elections(AdminOnly(admin.clone()), State(state.clone())).await.unwrap();
        assert_eq!(body.body.count, 4);
        let Json(body) = active_elections(Auth(admin.clone()), State(state.clone())).await.unwrap();
        assert_eq!(body.body.count, 2);
        let Json(body) = ongoing_elections(Auth(admin), State(state.clone())).await.unwrap();
        assert_eq!(body.body.count, 1);

        let Json(body) = my_votes(VoterOnly(user(&state, &vic)), State(state.clone())).await.unwrap();
        assert_eq!(body.body.count, 2);

        let cand = user(&state, &cara);
        let Json(body) = candidate_votes(CandidateOnly(cand.clone()), State(state.clone())).await.unwrap();
        assert_eq!(body.body.count, 3);
        let Json(body) = candidate_wins(CandidateOnly(cand.clone()), State(state.clone())).await.unwrap();
        assert_eq!(body.body.count, 1);
        let Json(body) = candidate_elections(CandidateOnly(cand.clone()), State(state.clone())).await.unwrap();
        assert_eq!(body.body.count, 2);

        let Json(body) = candidate_election_votes(CandidateOnly(cand), State(state.clone())).await.unwrap();
        let rows: Vec<(u64, u64, bool)> = body
            .body
            .elections
            .iter()
            .map(|e| (e.election_id, e.votes, e.has_won))
            .collect();
        assert_eq!(rows, vec![(3, 1, true), (1, 2, false)]);
    }

    #[tokio::test]
    async fn election_votes_needs_an_assignment() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let cara = seed_account(&state, "cara", Role::Candidate, true);
        let err = candidate_election_votes(CandidateOnly(user(&state, &cara)), State(state.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }
}
