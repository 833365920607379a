// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Local accounts with HS256 session tokens.
//!
//! ## Auth Flow
//!
//! 1. A voter or candidate registers; an emailed code is stored encrypted
//! 2. The code is confirmed, a custodial wallet is provisioned and the
//!    participant is registered on chain
//! 3. Login checks the Argon2 hash and returns `Bearer <token>`
//! 4. Role extractors verify the token before a handler runs
//!
//! ## Security
//!
//! - Passwords are Argon2id PHC strings
//! - One-time codes and wallet keys are AES-256-GCM sealed with
//!   `SERVER_SECRET_KEY`
//! - Codes are compared in constant time
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwt;
pub mod password;
pub mod roles;
pub mod secrets;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, CandidateOnly, VoterOnly};
pub use jwt::JwtKeys;
pub use password::{hash_password, verify_password, PasswordError, MIN_PASSWORD_LEN};
pub use roles::Role;
pub use secrets::{codes_match, generate_code, SecretBox, SecretError};
