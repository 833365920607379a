// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request bodies and the response envelope shared by all handlers.
//! Request types derive `Deserialize` and `ToSchema`; each validates its
//! own shape before the handler touches the store.
//!
//! ## Envelope
//!
//! Every success body is the payload's fields plus `msg` and
//! `success: true`. Errors are produced by [`ApiError`] with
//! `success: false` and an `error_code`.
//!
//! ## Model Categories
//!
//! - **Auth**: registration, verification, login, password reset
//! - **Elections**: creation, activation toggle
//! - **Votes**: vote casting
//! - **Admin**: user blocking, intent listing

use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Role, MIN_PASSWORD_LEN};
use crate::error::ApiError;
use crate::storage::{Account, Election, ElectionPhase, NewAccount};

// =============================================================================
// Envelope
// =============================================================================

/// Success body: payload fields flattened next to `msg` and `success`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    #[serde(flatten)]
    pub body: T,
    pub msg: String,
    pub success: bool,
}

/// Payload for responses that only carry a message.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct Empty {}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// Wrap `body` in a success envelope.
pub fn respond<T: Serialize>(msg: impl Into<String>, body: T) -> Json<Envelope<T>> {
    Json(Envelope {
        body,
        msg: msg.into(),
        success: true,
    })
}

/// Success envelope without payload fields.
pub fn message(msg: impl Into<String>) -> Json<Envelope<Empty>> {
    respond(msg, Empty {})
}

fn require(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

fn require_email(value: &str) -> Result<(), ApiError> {
    require("email", value)?;
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::bad_request("email is invalid")),
    }
}

fn require_password(value: &str) -> Result<(), ApiError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

// =============================================================================
// Auth
// =============================================================================

/// Voter or candidate self-registration.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub user_name: String,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub address: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("user_name", &self.user_name)?;
        require("name", &self.name)?;
        require_email(&self.email)?;
        require_password(&self.password)
    }

    pub fn into_new_account(self, role: Role) -> NewAccount {
        NewAccount {
            user_name: self.user_name,
            name: self.name,
            email: self.email,
            phone: self.phone,
            city: self.city,
            country: self.country,
            address: self.address,
            role,
        }
    }
}

/// Email plus the code that was mailed to it.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

impl VerifyCodeRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_email(&self.email)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_email(&self.email)?;
        require("password", &self.password)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_email(&self.email)
    }
}

/// New password, accepted once the reset code has been confirmed.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_email(&self.email)?;
        require_password(&self.password)
    }
}

/// Session token and the account it was issued for.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: Account,
    pub token: String,
}

// =============================================================================
// Elections
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateElectionRequest {
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl CreateElectionRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        require("description", &self.description)?;
        if self.start_date >= self.end_date {
            return Err(ApiError::bad_request("Start Date must be earlier than End Date"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Election with its phase evaluated at response time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ElectionView {
    #[serde(flatten)]
    pub election: Election,
    pub phase: ElectionPhase,
}

impl ElectionView {
    pub fn at(election: Election, now: DateTime<Utc>) -> Self {
        let phase = election.phase(now);
        Self { election, phase }
    }
}

// =============================================================================
// Votes
// =============================================================================

/// `candidate_id` is the candidate's account id.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CastVoteRequest {
    pub election_id: u64,
    pub candidate_id: u64,
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BlockUserRequest {
    pub is_blocked: bool,
}

/// Single count, used by the statistics endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CountResponse {
    pub count: usize,
}
