// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Election lifecycle endpoints.
//!
//! Creation and activation are mirrored to the contract. Deactivation,
//! result tallying and every read stay local. Phases are evaluated per
//! request from the stored dates.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    models::{respond, ApiResult, CreateElectionRequest, ElectionView, Envelope, SetActiveRequest},
    state::AppState,
    storage::{
        CandidateRepository, Election, ElectionPhase, ElectionRepository, OperationPayload,
        ParticipationRepository,
    },
    tally::{count_votes, decide, CandidateTally, TallyOutcome},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ElectionResponse {
    pub election: ElectionView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ElectionListResponse {
    pub elections: Vec<ElectionView>,
    pub total: usize,
}

/// Outcome of tallying a completed election.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultsResponse {
    pub results: Vec<CandidateTally>,
    /// Assignment ids marked won; empty when nobody received a vote.
    pub winners: Vec<u64>,
}

/// Per-election summary row.
#[derive(Debug, Serialize, ToSchema)]
pub struct ElectionStat {
    pub election_id: u64,
    pub name: String,
    pub phase: ElectionPhase,
    pub candidates: usize,
    pub votes: usize,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ElectionStatsResponse {
    pub total: usize,
    pub inactive: usize,
    pub upcoming: usize,
    pub ongoing: usize,
    pub completed: usize,
    pub elections: Vec<ElectionStat>,
}

pub(crate) fn load_election(state: &AppState, id: u64) -> Result<Election, ApiError> {
    ElectionRepository::new(&state.db)
        .get(id)?
        .ok_or_else(|| ApiError::not_found("No Election found"))
}

fn view(election: Election) -> ElectionView {
    ElectionView::at(election, Utc::now())
}

/// Create an election and its mirrored vote event.
#[utoipa::path(
    post,
    path = "/v1/elections",
    tag = "Elections",
    security(("bearer_auth" = [])),
    request_body = CreateElectionRequest,
    responses(
        (status = 201, description = "Election successfully created", body = ElectionResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not an Admin"),
        (status = 409, description = "Another creation in progress"),
        (status = 502, description = "Chain call failed")
    )
)]
pub async fn create_election(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<CreateElectionRequest>,
) -> Result<(StatusCode, Json<Envelope<ElectionResponse>>), ApiError> {
    request.validate()?;

    let elections = ElectionRepository::new(&state.db);
    let election_id = elections.next_id()?;
    let payload = OperationPayload::CreateElection {
        election_id,
        name: request.name.trim().to_string(),
        description: request.description.trim().to_string(),
        start_date: request.start_date,
        end_date: request.end_date,
        created_by: admin.user_id,
    };
    let committed = state
        .ledger()
        .execute(payload, state.admin_id, admin.user_id)
        .await?;

    let election = load_election(&state, election_id)?;
    info!(
        election_id,
        tx_hash = %committed.receipt.tx_hash,
        "Election created"
    );
    Ok((
        StatusCode::CREATED,
        respond(
            "Election successfully created",
            ElectionResponse {
                election: view(election),
            },
        ),
    ))
}

/// All elections, newest first.
#[utoipa::path(
    get,
    path = "/v1/elections",
    tag = "Elections",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Elections record found", body = ElectionListResponse))
)]
pub async fn list_elections(_auth: Auth, State(state): State<AppState>) -> ApiResult<ElectionListResponse> {
    let elections: Vec<ElectionView> = ElectionRepository::new(&state.db)
        .list()?
        .into_iter()
        .map(view)
        .collect();
    let total = elections.len();
    Ok(respond(
        "Elections record found",
        ElectionListResponse { elections, total },
    ))
}

#[utoipa::path(
    get,
    path = "/v1/elections/{id}",
    tag = "Elections",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    responses(
        (status = 200, description = "Election record found", body = ElectionResponse),
        (status = 404, description = "No Election found")
    )
)]
pub async fn get_election(
    _auth: Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<ElectionResponse> {
    let election = load_election(&state, id)?;
    Ok(respond(
        "Election record found",
        ElectionResponse {
            election: view(election),
        },
    ))
}

fn list_phase(state: &AppState, phase: ElectionPhase) -> ApiResult<ElectionListResponse> {
    let now = Utc::now();
    let elections: Vec<ElectionView> = ElectionRepository::new(&state.db)
        .list_in_phase(phase, now)?
        .into_iter()
        .map(|e| ElectionView::at(e, now))
        .collect();
    let total = elections.len();
    Ok(respond(
        "Elections record found",
        ElectionListResponse { elections, total },
    ))
}

fn get_in_phase(state: &AppState, id: u64, phase: ElectionPhase) -> ApiResult<ElectionResponse> {
    let now = Utc::now();
    let election = load_election(state, id)?;
    if election.phase(now) != phase {
        return Err(ApiError::not_found("No Election found"));
    }
    Ok(respond(
        "Election record found",
        ElectionResponse {
            election: ElectionView::at(election, now),
        },
    ))
}

#[utoipa::path(
    get,
    path = "/v1/elections/upcoming",
    tag = "Elections",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Active elections not yet started", body = ElectionListResponse))
)]
pub async fn list_upcoming(_auth: Auth, State(state): State<AppState>) -> ApiResult<ElectionListResponse> {
    list_phase(&state, ElectionPhase::Upcoming)
}

#[utoipa::path(
    get,
    path = "/v1/elections/ongoing",
    tag = "Elections",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Elections open for voting", body = ElectionListResponse))
)]
pub async fn list_ongoing(_auth: Auth, State(state): State<AppState>) -> ApiResult<ElectionListResponse> {
    list_phase(&state, ElectionPhase::Ongoing)
}

#[utoipa::path(
    get,
    path = "/v1/elections/completed",
    tag = "Elections",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Elections past their end date", body = ElectionListResponse))
)]
pub async fn list_completed(_auth: Auth, State(state): State<AppState>) -> ApiResult<ElectionListResponse> {
    list_phase(&state, ElectionPhase::Completed)
}

#[utoipa::path(
    get,
    path = "/v1/elections/inactive",
    tag = "Elections",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Elections not activated", body = ElectionListResponse))
)]
pub async fn list_inactive(_auth: Auth, State(state): State<AppState>) -> ApiResult<ElectionListResponse> {
    list_phase(&state, ElectionPhase::Inactive)
}

#[utoipa::path(
    get,
    path = "/v1/elections/ongoing/{id}",
    tag = "Elections",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    responses(
        (status = 200, description = "Election record found", body = ElectionResponse),
        (status = 404, description = "No ongoing election with this id")
    )
)]
pub async fn get_ongoing(
    _auth: Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<ElectionResponse> {
    get_in_phase(&state, id, ElectionPhase::Ongoing)
}

#[utoipa::path(
    get,
    path = "/v1/elections/inactive/{id}",
    tag = "Elections",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    responses(
        (status = 200, description = "Election record found", body = ElectionResponse),
        (status = 404, description = "No inactive election with this id")
    )
)]
pub async fn get_inactive(
    _auth: Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<ElectionResponse> {
    get_in_phase(&state, id, ElectionPhase::Inactive)
}

/// Activate (mirrored) or deactivate (local only) an election.
#[utoipa::path(
    put,
    path = "/v1/elections/{id}/active",
    tag = "Elections",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Election Status updated", body = ElectionResponse),
        (status = 404, description = "No Election found"),
        (status = 409, description = "Already active or completed"),
        (status = 502, description = "Chain call failed"),
        (status = 504, description = "Chain call timed out")
    )
)]
pub async fn set_active(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<SetActiveRequest>,
) -> ApiResult<ElectionResponse> {
    let election = load_election(&state, id)?;

    if request.is_active {
        if election.is_active {
            return Err(ApiError::conflict("Election is already active"));
        }
        if election.has_ended(Utc::now()) {
            return Err(ApiError::conflict("Election has completed"));
        }
        state
            .ledger()
            .execute(
                OperationPayload::ActivateElection { election_id: id },
                state.admin_id,
                admin.user_id,
            )
            .await?;
    } else if election.is_active {
        if ElectionRepository::new(&state.db).set_active(id, false)? != 1 {
            return Err(ApiError::internal(format!("deactivation missed election {id}")));
        }
        info!(election_id = id, "Election deactivated");
    }

    let election = load_election(&state, id)?;
    Ok(respond(
        "Election Status updated",
        ElectionResponse {
            election: view(election),
        },
    ))
}

/// Tally a completed election and mark every top-scoring candidate won.
#[utoipa::path(
    post,
    path = "/v1/elections/{id}/results",
    tag = "Elections",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    responses(
        (status = 200, description = "Results generated", body = ResultsResponse),
        (status = 404, description = "Election or candidates not found"),
        (status = 409, description = "Election is not completed yet")
    )
)]
pub async fn generate_results(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<ResultsResponse> {
    let election = load_election(&state, id)?;
    if !election.is_completed(Utc::now()) {
        return Err(ApiError::conflict("Election is not completed yet"));
    }

    let candidates = CandidateRepository::new(&state.db);
    let assignments = candidates.list_for_election(id)?;
    if assignments.is_empty() {
        return Err(ApiError::not_found("No Election Candidates record Found"));
    }

    let counts = ParticipationRepository::new(&state.db).tally(id)?;
    let results = count_votes(&assignments, &counts);
    ElectionRepository::new(&state.db).mark_results_generated(id)?;

    match decide(&results) {
        TallyOutcome::NoVotes => Ok(respond(
            "All candidates have 0 votes",
            ResultsResponse {
                results,
                winners: Vec::new(),
            },
        )),
        TallyOutcome::Winners {
            assignment_ids,
            votes,
        } => {
            candidates.mark_winners(&assignment_ids)?;
            info!(election_id = id, winners = ?assignment_ids, votes, "Election results generated");
            Ok(respond(
                format!(
                    "Winning result generated for {} candidate(s) with {votes} votes",
                    assignment_ids.len()
                ),
                ResultsResponse {
                    results,
                    winners: assignment_ids,
                },
            ))
        }
    }
}

/// Phase counts and per-election candidate and vote totals.
#[utoipa::path(
    get,
    path = "/v1/elections/stats",
    tag = "Elections",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Elections record found", body = ElectionStatsResponse))
)]
pub async fn election_stats(_auth: Auth, State(state): State<AppState>) -> ApiResult<ElectionStatsResponse> {
    let now = Utc::now();
    let candidates = CandidateRepository::new(&state.db);
    let participations = ParticipationRepository::new(&state.db);

    let mut stats = ElectionStatsResponse::default();
    for election in ElectionRepository::new(&state.db).list()? {
        let phase = election.phase(now);
        match phase {
            ElectionPhase::Inactive => stats.inactive += 1,
            ElectionPhase::Upcoming => stats.upcoming += 1,
            ElectionPhase::Ongoing => stats.ongoing += 1,
            ElectionPhase::Completed => stats.completed += 1,
        }
        stats.elections.push(ElectionStat {
            election_id: election.id,
            name: election.name,
            phase,
            candidates: candidates.list_for_election(election.id)?.len(),
            votes: participations.list_for_election(election.id)?.len(),
        });
    }
    stats.total = stats.elections.len();
    Ok(respond("Elections record found", stats))
}
