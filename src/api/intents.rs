// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operation intent inspection and on-demand reconciliation.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::AdminOnly,
    error::ApiError,
    ledger::{reconcile_once, ReconcileReport},
    models::{respond, ApiResult},
    state::AppState,
    storage::{IntentRepository, IntentStatus, OperationIntent},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct IntentListQuery {
    /// `pending`, `chain_confirmed`, `committed`, `failed` or `abandoned`
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntentListResponse {
    pub intents: Vec<OperationIntent>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub report: ReconcileReport,
}

/// List intents, newest first, optionally filtered by status.
#[utoipa::path(
    get,
    path = "/v1/admin/intents",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(IntentListQuery),
    responses(
        (status = 200, description = "Operation intents", body = IntentListResponse),
        (status = 400, description = "Unknown status")
    )
)]
pub async fn list_intents(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(query): Query<IntentListQuery>,
) -> ApiResult<IntentListResponse> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<IntentStatus>().map_err(ApiError::bad_request)?),
    };
    let intents = IntentRepository::new(&state.db).list(status)?;
    let total = intents.len();
    Ok(respond("Operation intents", IntentListResponse { intents, total }))
}

/// Run one reconciliation pass now instead of waiting for the background loop.
#[utoipa::path(
    post,
    path = "/v1/admin/intents/reconcile",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Reconciliation finished", body = ReconcileResponse))
)]
pub async fn reconcile(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> ApiResult<ReconcileResponse> {
    let report = reconcile_once(&state.db, state.reconcile_grace)?;
    info!(
        by = admin.user_id,
        committed = report.committed,
        still_failing = report.still_failing,
        abandoned = report.abandoned,
        "Manual reconciliation pass"
    );
    Ok(respond("Reconciliation finished", ReconcileResponse { report }))
}
