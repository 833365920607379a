// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, verification, login and password reset.
//!
//! Voters and candidates share one flow under `/v1/voters/*` and
//! `/v1/candidates/*`; an account is only found through the routes of its
//! own role. Verification provisions the wallet and registers the account
//! as a contract participant through the dual-write executor.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::{codes_match, generate_code, hash_password, verify_password, Auth, Role},
    blockchain::WalletProvider,
    error::ApiError,
    mailer::OutgoingMail,
    models::{
        message, respond, ApiResult, Empty, ForgotPasswordRequest, LoginRequest, LoginResponse,
        RegisterRequest, ResetPasswordRequest, VerifyCodeRequest,
    },
    state::AppState,
    storage::{
        Account, AccountRepository, OperationPayload, ResetState, WalletRepository, WalletResponse,
    },
};

const REGISTER_SUBJECT: &str = "Thank you for register";
const RESET_SUBJECT: &str = "Password reset code";

/// Result of a successful email verification.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifiedResponse {
    pub wallet_address: String,
    /// Participant registration transaction.
    pub chain_tx_hash: String,
}

/// Response for GET /v1/me
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: Account,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<WalletResponse>,
}

// =============================================================================
// Shared flow
// =============================================================================

/// Account with `email` and `role`, or 404 with `missing`.
fn find_account(
    state: &AppState,
    email: &str,
    role: Role,
    missing: &'static str,
) -> Result<Account, ApiError> {
    AccountRepository::new(&state.db)
        .find_by_email(email)?
        .filter(|a| a.role == role)
        .ok_or_else(|| ApiError::not_found(missing))
}

async fn send_code(state: &AppState, account: &Account, code: &str, subject: &str) -> Result<(), ApiError> {
    state
        .mailer
        .send(OutgoingMail::verification_code(
            &account.email,
            &account.user_name,
            code,
            subject,
        ))
        .await?;
    Ok(())
}

async fn register_as(state: &AppState, role: Role, request: RegisterRequest) -> ApiResult<Empty> {
    request.validate()?;

    let code = generate_code(state.code_length);
    let encrypted_code = state.secrets.encrypt_str(&code)?;
    let password_hash = hash_password(&request.password)?;
    let new_account = request.into_new_account(role);

    let registration =
        AccountRepository::new(&state.db).register(&new_account, &password_hash, &encrypted_code)?;
    info!(
        user_id = registration.account.id,
        role = %role,
        created = registration.created,
        "Account registered"
    );

    send_code(state, &registration.account, &code, REGISTER_SUBJECT).await?;
    Ok(message("Email sent Successfully. To Login, Please verify your email"))
}

async fn verify_as(state: &AppState, role: Role, request: VerifyCodeRequest) -> ApiResult<VerifiedResponse> {
    request.validate()?;
    let account = find_account(state, &request.email, role, "Invalid Email. User not exist.")?;
    if account.is_verified {
        return Err(ApiError::conflict("Your account is already verified"));
    }

    let credentials = AccountRepository::new(&state.db)
        .credentials(account.id)?
        .ok_or_else(|| ApiError::internal(format!("credentials missing for user {}", account.id)))?;
    let Some(stored_code) = credentials.verification_code else {
        return Err(ApiError::unauthorized("Invalid Token."));
    };
    let expected = state.secrets.decrypt_str(&stored_code)?;
    if !codes_match(&request.code, &expected) {
        return Err(ApiError::unauthorized("Unauthorized Token"));
    }

    // Kept when the chain step fails so a retry signs with the same address
    let wallet = WalletProvider::new(&state.db, &state.secrets).get_or_create(account.id)?;

    let committed = state
        .ledger()
        .execute(
            OperationPayload::RegisterParticipant { user_id: account.id },
            state.admin_id,
            account.id,
        )
        .await?;

    Ok(respond(
        "Your account has been verified and wallet created",
        VerifiedResponse {
            wallet_address: wallet.address,
            chain_tx_hash: committed.receipt.tx_hash,
        },
    ))
}

async fn login_as(state: &AppState, role: Role, request: LoginRequest) -> ApiResult<LoginResponse> {
    request.validate()?;
    let account = find_account(state, &request.email, role, "Email not exists")?;

    let credentials = AccountRepository::new(&state.db)
        .credentials(account.id)?
        .ok_or_else(|| ApiError::internal(format!("credentials missing for user {}", account.id)))?;
    if !verify_password(&request.password, &credentials.password_hash)? {
        return Err(ApiError::unauthorized("Password is incorrect"));
    }
    if !account.is_verified {
        return Err(ApiError::forbidden("Your account is not verified"));
    }
    if account.is_blocked {
        return Err(ApiError::forbidden("Your account is blocked by Admin"));
    }

    let token = state.jwt.issue(&account)?;
    info!(user_id = account.id, role = %role, "Login succeeded");
    Ok(respond("Login successful", LoginResponse { user: account, token }))
}

async fn forgot_password_as(
    state: &AppState,
    role: Role,
    request: ForgotPasswordRequest,
) -> ApiResult<Empty> {
    request.validate()?;
    let account = find_account(state, &request.email, role, "Email not found")?;
    if !account.is_verified {
        return Err(ApiError::forbidden("Email is not verified"));
    }

    let code = generate_code(state.code_length);
    let encrypted_code = state.secrets.encrypt_str(&code)?;
    AccountRepository::new(&state.db)
        .set_reset_state(account.id, ResetState::Pending { code: encrypted_code })?;

    send_code(state, &account, &code, RESET_SUBJECT).await?;
    Ok(message("Verification email sent to you Successfully"))
}

async fn verify_reset_code_as(
    state: &AppState,
    role: Role,
    request: VerifyCodeRequest,
) -> ApiResult<Empty> {
    request.validate()?;
    let account = find_account(state, &request.email, role, "Invalid Email. User not exist.")?;
    let accounts = AccountRepository::new(&state.db);

    let credentials = accounts
        .credentials(account.id)?
        .ok_or_else(|| ApiError::internal(format!("credentials missing for user {}", account.id)))?;
    let ResetState::Pending { code: stored_code } = credentials.reset else {
        return Err(ApiError::unauthorized("Invalid Token."));
    };
    let expected = state.secrets.decrypt_str(&stored_code)?;
    if !codes_match(&request.code, &expected) {
        return Err(ApiError::unauthorized("Unauthorized Token"));
    }

    accounts.set_reset_state(account.id, ResetState::Verified)?;
    Ok(message("Reset code verified"))
}

async fn reset_password_as(
    state: &AppState,
    role: Role,
    request: ResetPasswordRequest,
) -> ApiResult<Empty> {
    request.validate()?;
    let account = find_account(state, &request.email, role, "Email not exist")?;
    if !account.is_verified {
        return Err(ApiError::forbidden("Email is not verified"));
    }

    let accounts = AccountRepository::new(&state.db);
    let credentials = accounts
        .credentials(account.id)?
        .ok_or_else(|| ApiError::internal(format!("credentials missing for user {}", account.id)))?;
    if credentials.reset != ResetState::Verified {
        return Err(ApiError::unauthorized("Unauthorized Token"));
    }

    let password_hash = hash_password(&request.password)?;
    if accounts.update_password(account.id, &password_hash)? != 1 {
        return Err(ApiError::internal(format!("password update missed user {}", account.id)));
    }
    info!(user_id = account.id, "Password reset");
    Ok(message("Password updated"))
}

// =============================================================================
// Voters
// =============================================================================

/// Register a voter and email a verification code.
#[utoipa::path(
    post,
    path = "/v1/voters/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Verification code sent", body = Empty),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email taken"),
        (status = 502, description = "Email could not be sent")
    )
)]
pub async fn register_voter(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Empty> {
    register_as(&state, Role::Voter, request).await
}

/// Confirm a voter's email, create the wallet and register on chain.
#[utoipa::path(
    post,
    path = "/v1/voters/verify",
    tag = "Auth",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Verified", body = VerifiedResponse),
        (status = 401, description = "Wrong code"),
        (status = 404, description = "Unknown email"),
        (status = 502, description = "Chain call failed")
    )
)]
pub async fn verify_voter(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> ApiResult<VerifiedResponse> {
    verify_as(&state, Role::Voter, request).await
}

#[utoipa::path(
    post,
    path = "/v1/voters/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token", body = LoginResponse),
        (status = 401, description = "Wrong password"),
        (status = 403, description = "Unverified or blocked"),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn login_voter(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    login_as(&state, Role::Voter, request).await
}

#[utoipa::path(
    post,
    path = "/v1/voters/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Reset code sent", body = Empty))
)]
pub async fn forgot_password_voter(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<Empty> {
    forgot_password_as(&state, Role::Voter, request).await
}

#[utoipa::path(
    post,
    path = "/v1/voters/forgot-password/verify",
    tag = "Auth",
    request_body = VerifyCodeRequest,
    responses((status = 200, description = "Reset code accepted", body = Empty))
)]
pub async fn verify_reset_voter(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> ApiResult<Empty> {
    verify_reset_code_as(&state, Role::Voter, request).await
}

#[utoipa::path(
    post,
    path = "/v1/voters/reset-password",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses((status = 200, description = "Password updated", body = Empty))
)]
pub async fn reset_password_voter(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<Empty> {
    reset_password_as(&state, Role::Voter, request).await
}

// =============================================================================
// Candidates
// =============================================================================

#[utoipa::path(
    post,
    path = "/v1/candidates/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses((status = 200, description = "Verification code sent", body = Empty))
)]
pub async fn register_candidate(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Empty> {
    register_as(&state, Role::Candidate, request).await
}

#[utoipa::path(
    post,
    path = "/v1/candidates/verify",
    tag = "Auth",
    request_body = VerifyCodeRequest,
    responses((status = 200, description = "Verified", body = VerifiedResponse))
)]
pub async fn verify_candidate(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> ApiResult<VerifiedResponse> {
    verify_as(&state, Role::Candidate, request).await
}

#[utoipa::path(
    post,
    path = "/v1/candidates/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses((status = 200, description = "Session token", body = LoginResponse))
)]
pub async fn login_candidate(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    login_as(&state, Role::Candidate, request).await
}

#[utoipa::path(
    post,
    path = "/v1/candidates/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Reset code sent", body = Empty))
)]
pub async fn forgot_password_candidate(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<Empty> {
    forgot_password_as(&state, Role::Candidate, request).await
}

#[utoipa::path(
    post,
    path = "/v1/candidates/forgot-password/verify",
    tag = "Auth",
    request_body = VerifyCodeRequest,
    responses((status = 200, description = "Reset code accepted", body = Empty))
)]
pub async fn verify_reset_candidate(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> ApiResult<Empty> {
    verify_reset_code_as(&state, Role::Candidate, request).await
}

#[utoipa::path(
    post,
    path = "/v1/candidates/reset-password",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses((status = 200, description = "Password updated", body = Empty))
)]
pub async fn reset_password_candidate(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<Empty> {
    reset_password_as(&state, Role::Candidate, request).await
}

// =============================================================================
// Admin and session
// =============================================================================

/// Admin login. The admin account is seeded at startup and never verifies.
#[utoipa::path(
    post,
    path = "/v1/admin/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token", body = LoginResponse),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn login_admin(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    login_as(&state, Role::Admin, request).await
}

/// Profile and wallet of the calling account.
#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User Data Found", body = MeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token")
    )
)]
pub async fn me(Auth(user): Auth, State(state): State<AppState>) -> ApiResult<MeResponse> {
    let account = AccountRepository::new(&state.db)
        .get(user.user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let wallet = WalletRepository::new(&state.db)
        .get(account.id)?
        .map(|w| WalletResponse::from(&w));
    Ok(respond("User Data Found", MeResponse { user: account, wallet }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::gateway::mock::Outcome;
    use crate::blockchain::{ChainCall, ChainError};
    use crate::state::test_support::{seed_account, test_context, TEST_PASSWORD};
    use crate::storage::{IntentRepository, IntentStatus};
    use axum::http::StatusCode;

    fn registration(user_name: &str) -> RegisterRequest {
        RegisterRequest {
            user_name: user_name.to_string(),
            name: format!("{user_name} name"),
            email: format!("{user_name}@example.com"),
            password: TEST_PASSWORD.to_string(),
            phone: "0300".to_string(),
            city: "Lahore".to_string(),
            country: "PK".to_string(),
            address: "Street 1".to_string(),
        }
    }

    fn code_request(email: &str, code: &str) -> VerifyCodeRequest {
        VerifyCodeRequest {
            email: email.to_string(),
            code: code.to_string(),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn candidate_registration_to_chain_participant() {
        let ctx = test_context();
        let state = ctx.state.clone();

        let Json(body) = register_candidate(State(state.clone()), Json(registration("cara")))
            .await
            .unwrap();
        assert!(body.success);
        let code = ctx.mailer.last_code_for("cara@example.com").unwrap();
        assert_eq!(code.len(), 6);

        let Json(body) = verify_candidate(State(state.clone()), Json(code_request("cara@example.com", &code)))
            .await
            .unwrap();
        assert!(body.success);

        let account = AccountRepository::new(&state.db)
            .find_by_email("cara@example.com")
            .unwrap()
            .unwrap();
        assert!(account.is_verified);
        assert_eq!(account.chain_tx_hash.as_deref(), Some(body.body.chain_tx_hash.as_str()));

        let wallet = WalletProvider::new(&state.db, &state.secrets).get(account.id).unwrap();
        assert_eq!(wallet.address, body.body.wallet_address);

        let calls = ctx.chain.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            ChainCall::AddParticipant { participant_id, participant_address }
                if *participant_id == account.id && *participant_address == wallet.address
        ));

        let committed = IntentRepository::new(&state.db)
            .list(Some(IntentStatus::Committed))
            .unwrap();
        assert_eq!(committed.len(), 1);
    }

    #[tokio::test]
    async fn wrong_codes_are_unauthorized() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let Json(body) = register_voter(State(state.clone()), Json(registration("vic")))
            .await
            .unwrap();
        assert!(body.success);

        for bad in ["", "undefined", "000000x"] {
            let err = verify_voter(State(state.clone()), Json(code_request("vic@example.com", bad)))
                .await
                .unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED, "code {bad:?}");
        }
        assert!(ctx.chain.calls().is_empty());

        // Voter codes are not accepted on the candidate route
        let code = ctx.mailer.last_code_for("vic@example.com").unwrap();
        let err = verify_candidate(State(state.clone()), Json(code_request("vic@example.com", &code)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chain_failure_keeps_account_unverified_and_wallet_for_retry() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let Json(body) = register_voter(State(state.clone()), Json(registration("vic")))
            .await
            .unwrap();
        assert!(body.success);
        let code = ctx.mailer.last_code_for("vic@example.com").unwrap();

        ctx.chain.push(Outcome::Error(ChainError::Rpc("node down".into())));
        let err = verify_voter(State(state.clone()), Json(code_request("vic@example.com", &code)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);

        let accounts = AccountRepository::new(&state.db);
        let account = accounts.find_by_email("vic@example.com").unwrap().unwrap();
        assert!(!account.is_verified);
        let first_wallet = WalletProvider::new(&state.db, &state.secrets).get(account.id).unwrap();

        let Json(body) = verify_voter(State(state.clone()), Json(code_request("vic@example.com", &code)))
            .await
            .unwrap();
        assert_eq!(body.body.wallet_address, first_wallet.address);
        assert!(accounts.get(account.id).unwrap().unwrap().is_verified);
    }

    #[tokio::test]
    async fn duplicate_user_name_is_conflict() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let Json(body) = register_voter(State(state.clone()), Json(registration("vic")))
            .await
            .unwrap();
        assert!(body.success);

        let mut again = registration("vic");
        again.email = "other@example.com".to_string();
        let err = register_voter(State(state.clone()), Json(again)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "Username already exist");
        assert!(AccountRepository::new(&state.db)
            .find_by_email("other@example.com")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn mail_failure_is_bad_gateway() {
        let ctx = test_context();
        ctx.mailer.fail_next_sends(true);
        let err = register_voter(State(ctx.state.clone()), Json(registration("vic")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "mail_error");
    }

    #[tokio::test]
    async fn login_rules() {
        let ctx = test_context();
        let state = ctx.state.clone();
        seed_account(&state, "pending", Role::Voter, false);
        let blocked = seed_account(&state, "blocked", Role::Voter, true);
        AccountRepository::new(&state.db).set_blocked(blocked.id, true).unwrap();
        seed_account(&state, "vic", Role::Voter, true);

        let err = login_voter(State(state.clone()), Json(login("pending@example.com", TEST_PASSWORD)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err = login_voter(State(state.clone()), Json(login("blocked@example.com", TEST_PASSWORD)))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Your account is blocked by Admin");

        let err = login_voter(State(state.clone()), Json(login("vic@example.com", "wrong-password")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = login_voter(State(state.clone()), Json(login("nobody@example.com", TEST_PASSWORD)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let Json(body) = login_voter(State(state.clone()), Json(login("vic@example.com", TEST_PASSWORD)))
            .await
            .unwrap();
        let user = state.jwt.verify(&body.body.token).unwrap();
        assert_eq!(user.user_id, body.body.user.id);
        assert_eq!(user.role, Role::Voter);
    }

    #[tokio::test]
    async fn admin_login_only_for_admin() {
        let ctx = test_context();
        let state = ctx.state.clone();
        seed_account(&state, "vic", Role::Voter, true);

        let Json(body) = login_admin(State(state.clone()), Json(login("admin@example.com", TEST_PASSWORD)))
            .await
            .unwrap();
        assert_eq!(body.body.user.role, Role::Admin);

        let err = login_admin(State(state.clone()), Json(login("vic@example.com", TEST_PASSWORD)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let ctx = test_context();
        let state = ctx.state.clone();
        seed_account(&state, "vic", Role::Voter, true);
        let email = "vic@example.com";

        // Reset is refused until the mailed code is confirmed
        let reset = ResetPasswordRequest {
            email: email.to_string(),
            password: "brand-new-pass".to_string(),
        };
        let err = reset_password_voter(State(state.clone()), Json(reset.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let Json(body) = forgot_password_voter(
            State(state.clone()),
            Json(ForgotPasswordRequest { email: email.to_string() }),
        )
        .await
        .unwrap();
        assert!(body.success);
        let code = ctx.mailer.last_code_for(email).unwrap();

        let err = verify_reset_voter(State(state.clone()), Json(code_request(email, "undefined")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let Json(body) = verify_reset_voter(State(state.clone()), Json(code_request(email, &code)))
            .await
            .unwrap();
        assert!(body.success);
        let Json(body) = reset_password_voter(State(state.clone()), Json(reset.clone()))
            .await
            .unwrap();
        assert!(body.success);

        let Json(body) = login_voter(State(state.clone()), Json(login(email, "brand-new-pass")))
            .await
            .unwrap();
        assert!(body.success);
        // One reset per confirmed code
        assert!(reset_password_voter(State(state.clone()), Json(reset)).await.is_err());
    }

    #[tokio::test]
    async fn me_returns_account_and_wallet() {
        let ctx = test_context();
        let state = ctx.state.clone();
        let account = seed_account(&state, "vic", Role::Voter, true);
        let user = state.jwt.verify(&state.jwt.issue(&account).unwrap()).unwrap();

        let Json(body) = me(Auth(user), State(state.clone())).await.unwrap();
        assert_eq!(body.body.user.id, account.id);
        assert!(body.body.wallet.is_some());
        assert_eq!(body.msg, "User Data Found");
    }
}
