// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account API endpoints.
//!
//! Registration and login are public. Logout and `me` sit behind the
//! bearer gate like every node and tag route.

use axum::{extract::State, http::StatusCode, Json};

use super::ApiJson;
use crate::{
    auth::{Auth, Credential},
    error::ApiError,
    models::{CredentialsRequest, LoginResponse, MessageResponse, ProfileResponse, RegisterResponse},
    state::AppState,
};

/// Register a new profile.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "Auth",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Profile created", body = RegisterResponse),
        (status = 400, description = "Malformed body or invalid username/password"),
        (status = 409, description = "Username already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let profile = state
        .accounts()
        .register(request.username, request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            profile_id: profile.id,
        }),
    ))
}

/// Exchange username and password for a bearer token.
///
/// Accepted as `POST` and, for older clients, as `GET` with a JSON body.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CredentialsRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = state
        .accounts()
        .login(request.username, request.password)
        .await?;

    Ok(Json(LoginResponse {
        token: token.value,
        profile_id: token.profile_id,
        expires_at: token.expires_at,
    }))
}

/// Revoke the bearer token used for this request.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token revoked", body = MessageResponse),
        (status = 400, description = "Missing bearer token"),
        (status = 401, description = "Invalid or expired token")
    )
)]
pub async fn logout(
    Auth(_profile): Auth,
    credential: Credential,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.accounts().logout(&credential).await?;

    Ok(Json(MessageResponse {
        message: "Token revoked".to_string(),
    }))
}

/// Get the authenticated caller's profile.
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller profile", body = ProfileResponse),
        (status = 400, description = "Missing bearer token"),
        (status = 401, description = "Invalid or expired token")
    )
)]
pub async fn me(
    Auth(profile): Auth,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let stored = state.accounts().profile(&profile).await?;
    Ok(Json(ProfileResponse::new(stored, profile.token_expires_at)))
}
