// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    models::{
        message, ApiResult, BlockUserRequest, CastVoteRequest, CountResponse,
        CreateElectionRequest, Empty, ForgotPasswordRequest, LoginRequest, LoginResponse,
        RegisterRequest, ResetPasswordRequest, SetActiveRequest, VerifyCodeRequest,
    },
    state::AppState,
    storage::uploads::MAX_IMAGE_BYTES,
    storage::{
        Account, CandidateProfile, Election, ElectionCandidate, ElectionPhase, IntentStatus,
        OperationIntent, OperationKind, OperationPayload, Participation, WalletResponse,
    },
};

pub mod assignments;
pub mod auth;
pub mod candidates;
pub mod elections;
pub mod health;
pub mod intents;
pub mod multipart;
pub mod stats;
pub mod users;
pub mod votes;

/// Multipart bodies carry one image plus a few text fields.
const MULTIPART_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

pub fn router(state: AppState) -> Router {
    let public_dir = state.uploads.dir().to_path_buf();

    let v1_routes = Router::new()
        // Voter auth
        .route("/voters/register", post(auth::register_voter))
        .route("/voters/verify", post(auth::verify_voter))
        .route("/voters/login", post(auth::login_voter))
        .route("/voters/forgot-password", post(auth::forgot_password_voter))
        .route("/voters/forgot-password/verify", post(auth::verify_reset_voter))
        .route("/voters/reset-password", post(auth::reset_password_voter))
        // Candidate auth
        .route("/candidates/register", post(auth::register_candidate))
        .route("/candidates/verify", post(auth::verify_candidate))
        .route("/candidates/login", post(auth::login_candidate))
        .route("/candidates/forgot-password", post(auth::forgot_password_candidate))
        .route(
            "/candidates/forgot-password/verify",
            post(auth::verify_reset_candidate),
        )
        .route("/candidates/reset-password", post(auth::reset_password_candidate))
        .route("/candidates/profile", post(candidates::create_profile))
        .route("/admin/login", post(auth::login_admin))
        .route("/me", get(auth::me))
        // Elections
        .route(
            "/elections",
            get(elections::list_elections).post(elections::create_election),
        )
        .route("/elections/stats", get(elections::election_stats))
        .route("/elections/upcoming", get(elections::list_upcoming))
        .route("/elections/ongoing", get(elections::list_ongoing))
        .route("/elections/completed", get(elections::list_completed))
        .route("/elections/inactive", get(elections::list_inactive))
        .route("/elections/ongoing/{id}", get(elections::get_ongoing))
        .route("/elections/inactive/{id}", get(elections::get_inactive))
        .route("/elections/{id}", get(elections::get_election))
        .route("/elections/{id}/active", put(elections::set_active))
        .route("/elections/{id}/results", post(elections::generate_results))
        // Candidates in elections
        .route(
            "/elections/{id}/candidates",
            get(assignments::list_candidates).post(assignments::assign_candidate),
        )
        .route(
            "/elections/{id}/candidates/{candidate_id}/image",
            put(assignments::update_image),
        )
        .route(
            "/elections/{id}/candidates/{candidate_id}/voters",
            get(assignments::candidate_voters),
        )
        .route("/elections/{id}/votes", get(assignments::election_votes))
        .route("/elections/{id}/voters", get(assignments::election_voters))
        .route(
            "/elections/{id}/unassigned-candidates",
            get(assignments::unassigned_candidates),
        )
        .route("/election-candidates/{id}", get(assignments::get_assignment))
        // Votes
        .route("/votes", post(votes::cast_vote))
        // Users
        .route("/users/{id}", get(users::get_user))
        .route("/voters/{id}/elections", get(users::voter_elections))
        .route("/candidates/{id}/elections", get(users::candidate_elections))
        .route("/admin/voters", get(users::list_voters))
        .route("/admin/candidates", get(users::list_candidates))
        .route("/admin/users/{id}/block", put(users::set_blocked))
        // Stats
        .route("/stats/my-votes", get(stats::my_votes))
        .route("/stats/voters", get(stats::voters))
        .route("/stats/candidates", get(stats::candidates))
        .route("/stats/elections", get(stats::elections))
        .route("/stats/elections/active", get(stats::active_elections))
        .route("/stats/elections/ongoing", get(stats::ongoing_elections))
        .route("/stats/candidate/elections", get(stats::candidate_elections))
        .route("/stats/candidate/votes", get(stats::candidate_votes))
        .route("/stats/candidate/wins", get(stats::candidate_wins))
        .route(
            "/stats/candidate/election-votes",
            get(stats::candidate_election_votes),
        )
        // Intents
        .route("/admin/intents", get(intents::list_intents))
        .route("/admin/intents/reconcile", post(intents::reconcile))
        .layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT));

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .nest_service("/public", ServeDir::new(public_dir))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

async fn banner() -> ApiResult<Empty> {
    Ok(message("API Server is running"))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_voter,
        auth::verify_voter,
        auth::login_voter,
        auth::forgot_password_voter,
        auth::verify_reset_voter,
        auth::reset_password_voter,
        auth::register_candidate,
        auth::verify_candidate,
        auth::login_candidate,
        auth::forgot_password_candidate,
        auth::verify_reset_candidate,
        auth::reset_password_candidate,
        auth::login_admin,
        auth::me,
        candidates::create_profile,
        elections::create_election,
        elections::list_elections,
        elections::get_election,
        elections::list_upcoming,
        elections::list_ongoing,
        elections::list_completed,
        elections::list_inactive,
        elections::get_ongoing,
        elections::get_inactive,
        elections::set_active,
        elections::generate_results,
        elections::election_stats,
        assignments::assign_candidate,
        assignments::list_candidates,
        assignments::election_votes,
        assignments::update_image,
        assignments::candidate_voters,
        assignments::election_voters,
        assignments::unassigned_candidates,
        assignments::get_assignment,
        votes::cast_vote,
        users::get_user,
        users::voter_elections,
        users::candidate_elections,
        users::list_voters,
        users::list_candidates,
        users::set_blocked,
        stats::my_votes,
        stats::voters,
        stats::candidates,
        stats::elections,
        stats::active_elections,
        stats::ongoing_elections,
        stats::candidate_elections,
        stats::candidate_votes,
        stats::candidate_wins,
        stats::candidate_election_votes,
        intents::list_intents,
        intents::reconcile,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            Account,
            WalletResponse,
            CandidateProfile,
            Election,
            ElectionPhase,
            ElectionCandidate,
            Participation,
            OperationIntent,
            OperationKind,
            OperationPayload,
            IntentStatus,
            RegisterRequest,
            VerifyCodeRequest,
            LoginRequest,
            LoginResponse,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            CreateElectionRequest,
            SetActiveRequest,
            CastVoteRequest,
            BlockUserRequest,
            CountResponse,
            Empty
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, verification, login and password reset"),
        (name = "Elections", description = "Election lifecycle and results"),
        (name = "Candidates", description = "Candidates standing in elections"),
        (name = "Votes", description = "Vote casting"),
        (name = "Users", description = "Account lookups"),
        (name = "Admin", description = "Account management and operation intents"),
        (name = "Stats", description = "Dashboard counters"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
