// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StoreError;

/// Authentication error type.
///
/// A missing credential is a malformed request (400), distinct from a
/// credential that was presented but is not accepted (401).
#[derive(Debug)]
pub enum AuthError {
    /// No `Authorization` header, or `Bearer` with an empty value
    MissingToken,
    /// Header is not a bearer credential, or no live token matches it
    InvalidToken,
    /// Token matched but is past its expiry
    ExpiredToken,
    /// Username/password pair did not verify
    InvalidCredentials,
    /// Validation did not finish before the request deadline
    Timeout,
    /// Internal error
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Timeout => "timeout",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken | AuthError::ExpiredToken | AuthError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Bearer token is required"),
            AuthError::InvalidToken => write!(f, "Bearer token is invalid"),
            AuthError::ExpiredToken => write!(f, "Bearer token has expired"),
            AuthError::InvalidCredentials => write!(f, "Invalid username or password"),
            AuthError::Timeout => write!(f, "Request timed out"),
            // Detail stays in the logs
            AuthError::Internal(_) => write!(f, "Internal server error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingToken => AuthError::MissingToken,
            StoreError::InvalidToken => AuthError::InvalidToken,
            StoreError::ExpiredToken => AuthError::ExpiredToken,
            StoreError::InvalidCredentials => AuthError::InvalidCredentials,
            StoreError::DeadlineExceeded => AuthError::Timeout,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Authentication failed internally");
        }
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_token_returns_400() {
        let response = AuthError::MissingToken.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_token");
    }

    #[tokio::test]
    async fn invalid_and_expired_return_401() {
        assert_eq!(
            AuthError::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::ExpiredToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn internal_detail_is_not_exposed() {
        let response = AuthError::Internal("redb exploded at page 7".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(!body.contains("redb"));
    }

    #[test]
    fn store_errors_map_to_auth_variants() {
        assert!(matches!(
            AuthError::from(StoreError::ExpiredToken),
            AuthError::ExpiredToken
        ));
        assert!(matches!(
            AuthError::from(StoreError::DeadlineExceeded),
            AuthError::Timeout
        ));
        assert!(matches!(
            AuthError::from(StoreError::Integrity("x".into())),
            AuthError::Internal(_)
        ));
    }
}
