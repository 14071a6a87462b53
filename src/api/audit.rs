// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail endpoint.

use axum::{extract::State, Json};

use super::ApiQuery;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{AuditListResponse, AuditParams, DEFAULT_AUDIT_LIMIT},
    state::AppState,
};

/// List the caller's most recent audit events, newest first.
#[utoipa::path(
    get,
    path = "/v1/audit",
    tag = "Audit",
    security(("bearer_auth" = [])),
    params(AuditParams),
    responses(
        (status = 200, description = "Audit events", body = AuditListResponse),
        (status = 400, description = "Missing bearer token"),
        (status = 401, description = "Invalid or expired token")
    )
)]
pub async fn list_audit(
    Auth(profile): Auth,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<AuditParams>,
) -> Result<Json<AuditListResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    let events = state.accounts().audit_trail(&profile, limit).await?;

    Ok(Json(AuditListResponse {
        total: events.len(),
        events,
    }))
}
