// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Handlers declare the role they need in their signature; the request is
//! rejected before the handler body runs:
//!
//! ```rust,ignore
//! async fn cast_vote(VoterOnly(user): VoterOnly, ...) -> Result<..., ApiError> {
//!     // user.role == Role::Voter and the token is not flagged blocked
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser, Role};
use crate::state::AppState;

/// Extractor for any authenticated user.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // A layer may already have resolved the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = state.jwt.verify(token)?;
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

fn require_role(
    user: AuthenticatedUser,
    required: Role,
    message: &'static str,
) -> Result<AuthenticatedUser, AuthError> {
    if !user.has_role(required) {
        return Err(AuthError::InsufficientPermissions(message));
    }
    if user.is_blocked && required.is_participant() {
        return Err(AuthError::AccountBlocked);
    }
    Ok(user)
}

macro_rules! role_extractor {
    ($(#[$meta:meta])* $name:ident, $role:expr, $message:literal) => {
        $(#[$meta])*
        pub struct $name(pub AuthenticatedUser);

        impl FromRequestParts<AppState> for $name {
            type Rejection = AuthError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                let Auth(user) = Auth::from_request_parts(parts, state).await?;
                require_role(user, $role, $message).map($name)
            }
        }
    };
}

role_extractor!(
    /// Extractor that requires the admin role.
    AdminOnly,
    Role::Admin,
    "Not an Admin"
);

role_extractor!(
    /// Extractor that requires an unblocked voter.
    VoterOnly,
    Role::Voter,
    "Only Voter can access this resource"
);

role_extractor!(
    /// Extractor that requires an unblocked candidate.
    CandidateOnly,
    Role::Candidate,
    "Only Candidate can access this resource"
);
