// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User lookups and admin-side account management.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    api::assignments::AccountListResponse,
    auth::{AdminOnly, Auth, Role},
    error::ApiError,
    models::{message, respond, ApiResult, BlockUserRequest, ElectionView, Empty},
    state::AppState,
    storage::{
        Account, AccountRepository, CandidateProfile, CandidateRepository, ElectionCandidate,
        ElectionRepository, Participation, ParticipationRepository,
    },
};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub user: Account,
    /// Present for candidates who have filled in their profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<CandidateProfile>,
}

/// An election a voter took part in, with the ballot they cast.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoterElection {
    pub election: ElectionView,
    pub participation: Participation,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoterElectionsResponse {
    pub elections: Vec<VoterElection>,
    pub total: usize,
}

/// An election a candidate stands in, with their vote count.
#[derive(Debug, Serialize, ToSchema)]
pub struct CandidateElection {
    pub election: ElectionView,
    pub assignment: ElectionCandidate,
    pub votes: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CandidateElectionsResponse {
    pub elections: Vec<CandidateElection>,
    pub total: usize,
}

fn load_account(state: &AppState, id: u64, role: Option<Role>) -> Result<Account, ApiError> {
    AccountRepository::new(&state.db)
        .get(id)?
        .filter(|a| role.is_none_or(|r| a.role == r))
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Elections one candidate stands in, newest first.
pub(crate) fn candidate_elections_of(
    state: &AppState,
    candidate_id: u64,
) -> Result<Vec<CandidateElection>, ApiError> {
    let now = Utc::now();
    let elections = ElectionRepository::new(&state.db);
    let participations = ParticipationRepository::new(&state.db);
    let mut rows = Vec::new();
    for assignment in CandidateRepository::new(&state.db).list_for_candidate(candidate_id)? {
        let Some(election) = elections.get(assignment.election_id)? else {
            continue;
        };
        let votes = participations
            .tally(election.id)?
            .get(&assignment.id)
            .copied()
            .unwrap_or(0);
        rows.push(CandidateElection {
            election: ElectionView::at(election, now),
            assignment,
            votes,
        });
    }
    rows.sort_by(|a, b| b.election.election.id.cmp(&a.election.election.id));
    Ok(rows)
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Account id")),
    responses(
        (status = 200, description = "User record found", body = UserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    _auth: Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<UserResponse> {
    let user = load_account(&state, id, None)?;
    let profile = match user.role {
        Role::Candidate => CandidateRepository::new(&state.db).profile(user.id)?,
        _ => None,
    };
    Ok(respond("User record found", UserResponse { user, profile }))
}

#[utoipa::path(
    get,
    path = "/v1/voters/{id}/elections",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Voter account id")),
    responses(
        (status = 200, description = "Voter record found", body = VoterElectionsResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn voter_elections(
    _auth: Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<VoterElectionsResponse> {
    let voter = load_account(&state, id, Some(Role::Voter))?;
    let now = Utc::now();
    let elections = ElectionRepository::new(&state.db);

    let mut rows = Vec::new();
    for participation in ParticipationRepository::new(&state.db).list_for_voter(voter.id)? {
        if let Some(election) = elections.get(participation.election_id)? {
            rows.push(VoterElection {
                election: ElectionView::at(election, now),
                participation,
            });
        }
    }
    rows.sort_by(|a, b| b.election.election.id.cmp(&a.election.election.id));
    let total = rows.len();
    Ok(respond(
        "Voter record found",
        VoterElectionsResponse {
            elections: rows,
            total,
        },
    ))
}

#[utoipa::path(
    get,
    path = "/v1/candidates/{id}/elections",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Candidate account id")),
    responses(
        (status = 200, description = "Candidate record found", body = CandidateElectionsResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn candidate_elections(
    _auth: Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<CandidateElectionsResponse> {
    let candidate = load_account(&state, id, Some(Role::Candidate))?;
    let elections = candidate_elections_of(&state, candidate.id)?;
    let total = elections.len();
    Ok(respond(
        "Candidate record found",
        CandidateElectionsResponse { elections, total },
    ))
}

fn accounts_with_role(state: &AppState, role: Role) -> Result<AccountListResponse, ApiError> {
    let users = AccountRepository::new(&state.db).list_by_role(role)?;
    let total = users.len();
    Ok(AccountListResponse { users, total })
}

#[utoipa::path(
    get,
    path = "/v1/admin/voters",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Voters record found", body = AccountListResponse),
        (status = 403, description = "Not an Admin")
    )
)]
pub async fn list_voters(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> ApiResult<AccountListResponse> {
    Ok(respond("Voters record found", accounts_with_role(&state, Role::Voter)?))
}

#[utoipa::path(
    get,
    path = "/v1/admin/candidates",
    operation_id = "list_candidate_accounts",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Candidates record found", body = AccountListResponse),
        (status = 403, description = "Not an Admin")
    )
)]
pub async fn list_candidates(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> ApiResult<AccountListResponse> {
    Ok(respond(
        "Candidates record found",
        accounts_with_role(&state, Role::Candidate)?,
    ))
}

/// Block or unblock a voter or candidate.
///
/// A blocked voter cannot log in or vote. Tokens issued before the change
/// are still refused at vote time.
#[utoipa::path(
    put,
    path = "/v1/admin/users/{id}/block",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Account id")),
    request_body = BlockUserRequest,
    responses(
        (status = 200, description = "User Status updated", body = Empty),
        (status = 400, description = "Admin accounts cannot be blocked"),
        (status = 404, description = "User not exist")
    )
)]
pub async fn set_blocked(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<BlockUserRequest>,
) -> ApiResult<Empty> {
    let accounts = AccountRepository::new(&state.db);
    let user = accounts
        .get(id)?
        .ok_or_else(|| ApiError::not_found("User not exist"))?;
    if user.role == Role::Admin {
        return Err(ApiError::bad_request("Admin accounts cannot be blocked"));
    }

    if accounts.set_blocked(id, req.is_blocked)? != 1 {
        return Err(ApiError::internal(format!("block update for user {id} touched no row")));
    }
    info!(user_id = id, blocked = req.is_blocked, by = admin.user_id, "User block status changed");
    Ok(message("User Status updated"))
}
