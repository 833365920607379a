// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims and the authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;
use crate::storage::Account;

/// Claims carried by a session token issued at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id, as a decimal string.
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Block flag at issue time. Vote casting re-reads the account.
    #[serde(default)]
    pub blocked: bool,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn for_account(account: &Account, issued_at: i64, ttl_secs: i64) -> Self {
        Self {
            sub: account.id.to_string(),
            email: account.email.clone(),
            role: account.role,
            blocked: account.is_blocked,
            iat: issued_at,
            exp: issued_at + ttl_secs,
        }
    }
}

/// Authenticated user extracted from a verified session token.
///
/// This is the type handlers receive from the role extractors.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub is_blocked: bool,
    /// Token expiry (Unix seconds)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Build from verified claims. `None` when `sub` is not an account id.
    pub fn from_claims(claims: SessionClaims) -> Option<Self> {
        let user_id = claims.sub.parse().ok()?;
        Some(Self {
            user_id,
            email: claims.email,
            role: claims.role,
            is_blocked: claims.blocked,
            expires_at: claims.exp,
        })
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
