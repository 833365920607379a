// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account roles.
///
/// ## Role Hierarchy
///
/// - `Admin` - Manages elections, candidates and user blocking
/// - `Voter` - Casts at most one vote per election
/// - `Candidate` - Stands in elections, reads own statistics
///
/// Roles are disjoint: an admin cannot vote and a voter cannot stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Election administration
    Admin,
    /// Registered voter
    Voter,
    /// Registered candidate
    Candidate,
}

impl Role {
    /// Check if this role may act where `required` is demanded.
    pub fn has_privilege(&self, required: Role) -> bool {
        *self == required
    }

    /// Parse role from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "voter" => Some(Role::Voter),
            "candidate" => Some(Role::Candidate),
            _ => None,
        }
    }

    /// Whether accounts of this role self-register and get a wallet on verification.
    pub fn is_participant(&self) -> bool {
        matches!(self, Role::Voter | Role::Candidate)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Voter => write!(f, "voter"),
            Role::Candidate => write!(f, "candidate"),
        }
    }
}
