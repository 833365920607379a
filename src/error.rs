// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API error type and the single error-to-status mapping.
//!
//! | Kind | Status |
//! |------|--------|
//! | validation | 400 |
//! | bad credential / bad code | 401 |
//! | wrong role / blocked / unverified | 403 |
//! | not found | 404 |
//! | conflict / failed precondition / intent in flight | 409 |
//! | chain failure or revert, mail failure | 502 |
//! | chain timeout | 504 |
//! | partial dual-write / internal | 500 |
//!
//! Internal causes are logged, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::{AuthError, PasswordError, SecretError};
use crate::blockchain::WalletError;
use crate::ledger::LedgerError;
use crate::mailer::MailError;
use crate::storage::{DbError, UploadError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    msg: String,
    success: bool,
    error_code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn bad_gateway(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, code, message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, "chain_timeout", message)
    }

    /// 500 with a generic message; `cause` goes to the log only.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            msg: self.message,
            success: false,
            error_code: self.code,
        });
        (self.status, body).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(msg) => ApiError::conflict(msg),
            DbError::NotFound(msg) => ApiError::not_found(msg),
            other => ApiError::internal(other),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InFlight(msg) => {
                ApiError::new(StatusCode::CONFLICT, "operation_in_progress", msg)
            }
            LedgerError::Precondition(msg) => ApiError::conflict(msg),
            LedgerError::Chain { intent_id, source } if source.outcome_unknown() => {
                tracing::warn!(intent_id = %intent_id, error = %source, "Responding 504 for unconfirmed chain call");
                ApiError::gateway_timeout(format!(
                    "Blockchain did not confirm in time; operation {intent_id} is held for review"
                ))
            }
            LedgerError::Chain { intent_id, source } => {
                tracing::warn!(intent_id = %intent_id, error = %source, "Responding 502 for chain failure");
                ApiError::bad_gateway(
                    "chain_error",
                    format!("Blockchain transaction failed (operation {intent_id})"),
                )
            }
            LedgerError::Rejected { intent_id, .. } => ApiError::bad_gateway(
                "chain_rejected",
                format!("Blockchain rejected the transaction (operation {intent_id})"),
            ),
            LedgerError::PartialCommit { intent_id, cause } => {
                tracing::error!(intent_id = %intent_id, error = %cause, "Partial dual-write");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "partial_commit",
                    format!(
                        "Recorded on blockchain but not saved locally; operation {intent_id} will be reconciled"
                    ),
                )
            }
            LedgerError::Wallet(e) => e.into(),
            LedgerError::Db(e) => e.into(),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Db(e) => e.into(),
            WalletError::Missing(id) => ApiError::conflict(format!("User {id} has no wallet yet")),
            other => ApiError::internal(other),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(e) => ApiError::internal(e),
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        tracing::warn!(error = %err, "Mail delivery failed");
        ApiError::bad_gateway(
            "mail_error",
            "Facing problem to send email - Check internet connection",
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InternalError(cause) => ApiError::internal(cause),
            other => ApiError::new(other.status_code(), other.error_code(), other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal(err)
    }
}

impl From<SecretError> for ApiError {
    fn from(err: SecretError) -> Self {
        ApiError::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ChainError;
    use axum::body::to_bytes;

    #[test]
    fn ledger_errors_map_to_gateway_statuses() {
        let timeout: ApiError = LedgerError::Chain {
            intent_id: "i1".into(),
            source: ChainError::Timeout(std::time::Duration::from_secs(1)),
        }
        .into();
        assert_eq!(timeout.status, StatusCode::GATEWAY_TIMEOUT);

        let unconfirmed: ApiError = LedgerError::Chain {
            intent_id: "i4".into(),
            source: ChainError::Unconfirmed {
                tx_hash: "0xfeed".into(),
                reason: "receipt fetch failed".into(),
            },
        }
        .into();
        assert_eq!(unconfirmed.status, StatusCode::GATEWAY_TIMEOUT);
        assert!(unconfirmed.message.contains("i4"));

        let rpc: ApiError = LedgerError::Chain {
            intent_id: "i2".into(),
            source: ChainError::Rpc("down".into()),
        }
        .into();
        assert_eq!(rpc.status, StatusCode::BAD_GATEWAY);
        assert!(!rpc.message.contains("down"));

        let reverted: ApiError = LedgerError::Rejected {
            intent_id: "i3".into(),
            tx_hash: "0x1".into(),
        }
        .into();
        assert_eq!(reverted.status, StatusCode::BAD_GATEWAY);
        assert_eq!(reverted.code, "chain_rejected");
    }

    #[test]
    fn partial_commit_names_the_intent() {
        let err: ApiError = LedgerError::PartialCommit {
            intent_id: "abc-123".into(),
            cause: "row missing".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("abc-123"));
        assert!(!err.message.contains("row missing"));
    }

    #[test]
    fn store_conflicts_are_409() {
        let err: ApiError = DbError::Conflict("Username already exist".into()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "Username already exist");

        let err: ApiError = LedgerError::InFlight("busy".into()).into();
        assert_eq!(err.code, "operation_in_progress");
    }

    #[tokio::test]
    async fn into_response_returns_envelope() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["msg"], "bad data");
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], "validation_error");
    }
}
