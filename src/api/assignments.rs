// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Candidates standing in elections.
//!
//! Assigning a candidate is mirrored to the contract; the image is stored
//! before the chain call and removed again if the operation fails before
//! the chain confirms it.

use std::collections::HashSet;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    api::{elections::load_election, multipart::ImageForm},
    auth::{AdminOnly, Auth, Role},
    error::ApiError,
    ledger::LedgerError,
    models::{message, respond, ApiResult, Empty, Envelope},
    state::AppState,
    storage::{
        Account, AccountRepository, CandidateRepository, ElectionCandidate, ImageUpload,
        OperationPayload, ParticipationRepository,
    },
};

/// Assignment joined with the candidate's account and its vote count.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: ElectionCandidate,
    pub name: String,
    pub user_name: String,
    pub votes: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub candidate: AssignmentView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentListResponse {
    pub candidates: Vec<AssignmentView>,
    pub total_votes: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountListResponse {
    pub users: Vec<Account>,
    pub total: usize,
}

fn views(
    state: &AppState,
    election_id: u64,
    assignments: Vec<ElectionCandidate>,
) -> Result<Vec<AssignmentView>, ApiError> {
    let counts = ParticipationRepository::new(&state.db).tally(election_id)?;
    let accounts = AccountRepository::new(&state.db);
    let mut views = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let (name, user_name) = accounts
            .get(assignment.candidate_id)?
            .map(|a| (a.name, a.user_name))
            .unwrap_or_default();
        let votes = counts.get(&assignment.id).copied().unwrap_or(0);
        views.push(AssignmentView {
            assignment,
            name,
            user_name,
            votes,
        });
    }
    Ok(views)
}

fn accounts_by_id(
    state: &AppState,
    ids: impl IntoIterator<Item = u64>,
) -> Result<Vec<Account>, ApiError> {
    let accounts = AccountRepository::new(&state.db);
    let mut users = Vec::new();
    for id in ids {
        if let Some(account) = accounts.get(id)? {
            users.push(account);
        }
    }
    Ok(users)
}

/// Assign a registered candidate to an election.
///
/// Multipart fields: `candidate_id`, `designation`, `description`, `file`.
#[utoipa::path(
    post,
    path = "/v1/elections/{id}/candidates",
    tag = "Candidates",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    responses(
        (status = 201, description = "Candidate created for election", body = AssignmentResponse),
        (status = 400, description = "Missing field or bad image"),
        (status = 404, description = "Election or candidate not found"),
        (status = 409, description = "Already assigned, completed election or unverified candidate"),
        (status = 502, description = "Chain call failed")
    )
)]
pub async fn assign_candidate(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(election_id): Path<u64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Envelope<AssignmentResponse>>), ApiError> {
    let form = ImageForm::read(multipart).await?;
    let candidate = assign(&state, admin.user_id, election_id, form).await?;
    Ok((
        StatusCode::CREATED,
        respond("Candidate created for election", AssignmentResponse { candidate }),
    ))
}

pub(crate) async fn assign(
    state: &AppState,
    actor_id: u64,
    election_id: u64,
    mut form: ImageForm,
) -> Result<AssignmentView, ApiError> {
    let candidate_id = form.number("candidate_id")?;
    let designation = form.text("designation")?;
    let description = form.text("description")?;
    let upload = form.require_file()?;
    upload.validate()?;

    let election = load_election(state, election_id)?;
    if election.has_ended(Utc::now()) {
        return Err(ApiError::conflict("Election has completed"));
    }

    let candidate = AccountRepository::new(&state.db)
        .get(candidate_id)?
        .filter(|a| a.role == Role::Candidate)
        .ok_or_else(|| ApiError::not_found("Candidate not registered Yet"))?;
    if !candidate.is_verified {
        return Err(ApiError::conflict("Candidate is not verified yet"));
    }
    if candidate.is_blocked {
        return Err(ApiError::conflict("Candidate is blocked by Admin"));
    }

    let candidates = CandidateRepository::new(&state.db);
    if candidates.find_assignment(election_id, candidate_id)?.is_some() {
        return Err(ApiError::conflict("Candidate already exists"));
    }

    let assignment_id = state.db.next_sequence("election_candidates")?;
    let image = state.uploads.save(&upload).await?;
    let payload = OperationPayload::AssignCandidate {
        assignment_id,
        election_id,
        candidate_id,
        designation,
        description,
        image: Some(image.clone()),
    };

    if let Err(e) = state.ledger().execute(payload, state.admin_id, actor_id).await {
        // A partial commit will be replayed and still needs the file
        if !matches!(e, LedgerError::PartialCommit { .. }) {
            if let Err(remove) = state.uploads.remove(&image).await {
                warn!(error = %remove, file = %image, "Failed to remove orphaned upload");
            }
        }
        return Err(e.into());
    }

    let assignment = candidates
        .assignment(assignment_id)?
        .ok_or_else(|| ApiError::internal(format!("assignment {assignment_id} missing after commit")))?;
    info!(election_id, candidate_id, assignment_id, "Candidate assigned to election");

    views(state, election_id, vec![assignment])?
        .pop()
        .ok_or_else(|| ApiError::internal("assignment view missing"))
}

/// Candidates of one election with their vote counts.
#[utoipa::path(
    get,
    path = "/v1/elections/{id}/candidates",
    tag = "Candidates",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    responses(
        (status = 200, description = "Election Candidates record found", body = AssignmentListResponse),
        (status = 404, description = "No Election found")
    )
)]
pub async fn list_candidates(
    _auth: Auth,
    State(state): State<AppState>,
    Path(election_id): Path<u64>,
) -> ApiResult<AssignmentListResponse> {
    load_election(&state, election_id)?;
    let assignments = CandidateRepository::new(&state.db).list_for_election(election_id)?;
    let candidates = views(&state, election_id, assignments)?;
    let total_votes = candidates.iter().map(|c| c.votes).sum();
    Ok(respond(
        "Election Candidates record found",
        AssignmentListResponse {
            candidates,
            total_votes,
        },
    ))
}

/// Per-candidate vote counts of one election.
#[utoipa::path(
    get,
    path = "/v1/elections/{id}/votes",
    tag = "Candidates",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    responses(
        (status = 200, description = "Election Candidates record found", body = AssignmentListResponse),
        (status = 404, description = "No Election Candidates record Found")
    )
)]
pub async fn election_votes(
    _auth: Auth,
    State(state): State<AppState>,
    Path(election_id): Path<u64>,
) -> ApiResult<AssignmentListResponse> {
    load_election(&state, election_id)?;
    let assignments = CandidateRepository::new(&state.db).list_for_election(election_id)?;
    if assignments.is_empty() {
        return Err(ApiError::not_found("No Election Candidates record Found"));
    }
    let mut candidates = views(&state, election_id, assignments)?;
    candidates.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.assignment.id.cmp(&b.assignment.id)));
    let total_votes = candidates.iter().map(|c| c.votes).sum();
    Ok(respond(
        "Election Candidates record found",
        AssignmentListResponse {
            candidates,
            total_votes,
        },
    ))
}

/// Replace the image of an existing assignment.
#[utoipa::path(
    put,
    path = "/v1/elections/{id}/candidates/{candidate_id}/image",
    tag = "Candidates",
    security(("bearer_auth" = [])),
    params(
        ("id" = u64, Path, description = "Election id"),
        ("candidate_id" = u64, Path, description = "Candidate account id")
    ),
    responses(
        (status = 200, description = "File uploaded successfully on server", body = Empty),
        (status = 400, description = "Missing or bad image"),
        (status = 404, description = "Candidate not exists")
    )
)]
pub async fn update_image(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Path((election_id, candidate_id)): Path<(u64, u64)>,
    multipart: Multipart,
) -> ApiResult<Empty> {
    let form = ImageForm::read(multipart).await?;
    replace_image(&state, election_id, candidate_id, form).await?;
    Ok(message("File uploaded successfully on server"))
}

pub(crate) async fn replace_image(
    state: &AppState,
    election_id: u64,
    candidate_id: u64,
    mut form: ImageForm,
) -> Result<String, ApiError> {
    let assignment = CandidateRepository::new(&state.db)
        .find_assignment(election_id, candidate_id)?
        .ok_or_else(|| ApiError::not_found("Candidate not exists"))?;
    let upload = form.require_file()?;
    swap_image(state, &assignment, &upload).await
}

/// Store `upload` and point `assignment` at it. The previous file is only
/// removed once the row references the new one.
async fn swap_image(
    state: &AppState,
    assignment: &ElectionCandidate,
    upload: &ImageUpload,
) -> Result<String, ApiError> {
    let image = state.uploads.save(upload).await?;
    let updated = CandidateRepository::new(&state.db).set_image(assignment.id, &image);
    let failure = match updated {
        Ok(1) => None,
        Ok(affected) => Some(ApiError::internal(format!(
            "set_image touched {affected} rows for assignment {}",
            assignment.id
        ))),
        Err(e) => Some(e.into()),
    };
    if let Some(err) = failure {
        if let Err(e) = state.uploads.remove(&image).await {
            warn!(error = %e, file = %image, "Failed to remove unused image");
        }
        return Err(err);
    }

    if let Some(old) = &assignment.image {
        if let Err(e) = state.uploads.remove(old).await {
            warn!(error = %e, file = %old, "Failed to remove replaced image");
        }
    }
    Ok(image)
}

/// Voters who chose one candidate in one election.
#[utoipa::path(
    get,
    path = "/v1/elections/{id}/candidates/{candidate_id}/voters",
    tag = "Candidates",
    security(("bearer_auth" = [])),
    params(
        ("id" = u64, Path, description = "Election id"),
        ("candidate_id" = u64, Path, description = "Candidate account id")
    ),
    responses(
        (status = 200, description = "Candidate Voters record found", body = AccountListResponse),
        (status = 404, description = "Candidate not exists")
    )
)]
pub async fn candidate_voters(
    _auth: Auth,
    State(state): State<AppState>,
    Path((election_id, candidate_id)): Path<(u64, u64)>,
) -> ApiResult<AccountListResponse> {
    CandidateRepository::new(&state.db)
        .find_assignment(election_id, candidate_id)?
        .ok_or_else(|| ApiError::not_found("Candidate not exists"))?;

    let voter_ids = ParticipationRepository::new(&state.db)
        .list_for_election(election_id)?
        .into_iter()
        .filter(|p| p.candidate_id == candidate_id)
        .map(|p| p.voter_id);
    let users = accounts_by_id(&state, voter_ids)?;
    let total = users.len();
    Ok(respond("Candidate Voters record found", AccountListResponse { users, total }))
}

/// Every voter who has voted in one election.
#[utoipa::path(
    get,
    path = "/v1/elections/{id}/voters",
    tag = "Candidates",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    responses(
        (status = 200, description = "Voters record found", body = AccountListResponse),
        (status = 404, description = "No Election found")
    )
)]
pub async fn election_voters(
    _auth: Auth,
    State(state): State<AppState>,
    Path(election_id): Path<u64>,
) -> ApiResult<AccountListResponse> {
    load_election(&state, election_id)?;
    let voter_ids = ParticipationRepository::new(&state.db)
        .list_for_election(election_id)?
        .into_iter()
        .map(|p| p.voter_id);
    let users = accounts_by_id(&state, voter_ids)?;
    let total = users.len();
    Ok(respond("Voters record found", AccountListResponse { users, total }))
}

/// Verified, unblocked candidates not yet standing in this election.
#[utoipa::path(
    get,
    path = "/v1/elections/{id}/unassigned-candidates",
    tag = "Candidates",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Election id")),
    responses(
        (status = 200, description = "Candidates record found", body = AccountListResponse),
        (status = 403, description = "Not an Admin")
    )
)]
pub async fn unassigned_candidates(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Path(election_id): Path<u64>,
) -> ApiResult<AccountListResponse> {
    load_election(&state, election_id)?;
    let assigned: HashSet<u64> = CandidateRepository::new(&state.db)
        .list_for_election(election_id)?
        .into_iter()
        .map(|a| a.candidate_id)
        .collect();
    let users: Vec<Account> = AccountRepository::new(&state.db)
        .list_by_role(Role::Candidate)?
        .into_iter()
        .filter(|a| a.is_verified && !a.is_blocked && !assigned.contains(&a.id))
        .collect();
    let total = users.len();
    Ok(respond("Candidates record found", AccountListResponse { users, total }))
}

#[utoipa::path(
    get,
    path = "/v1/election-candidates/{id}",
    tag = "Candidates",
    security(("bearer_auth" = [])),
    params(("id" = u64, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Candidate record found", body = AssignmentResponse),
        (status = 404, description = "Candidate Detail not found")
    )
)]
pub async fn get_assignment(
    _auth: Auth,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<AssignmentResponse> {
    let assignment = CandidateRepository::new(&state.db)
        .assignment(id)?
        .ok_or_else(|| ApiError::not_found("Candidate Detail not found"))?;
    let election_id = assignment.election_id;
    let candidate = views(&state, election_id, vec![assignment])?
        .pop()
        .ok_or_else(|| ApiError::internal("assignment view missing"))?;
    Ok(respond("Candidate record found", AssignmentResponse { candidate }))
}
