// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated profiles.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(profile): Auth) -> impl IntoResponse {
//!     // profile is AuthenticatedProfile
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, AuthenticatedProfile, Credential};
use crate::state::AppState;

/// Extractor for authenticated profiles.
///
/// Behind the gate middleware the profile is already in the request
/// extensions. Without it, the bearer header is validated here, with the
/// same missing/invalid distinction.
pub struct Auth(pub AuthenticatedProfile);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(profile) = parts.extensions.get::<AuthenticatedProfile>().cloned() {
            return Ok(Auth(profile));
        }

        let credential = Credential::from_headers(&parts.headers)?;
        let profile = state.gate().authorize(&credential).await?;
        Ok(Auth(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;
    use axum::http::Request;
    use uuid::Uuid;

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (store, _dir) = temp_store();
        let state = AppState::new(store);
        let mut parts = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_unknown_token() {
        let (store, _dir) = temp_store();
        let state = AppState::new(store);
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", "Bearer unknown")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (store, _dir) = temp_store();
        let state = AppState::new(store);
        let mut parts = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let profile = AuthenticatedProfile {
            profile_id: Uuid::new_v4(),
            token_expires_at: None,
        };
        parts.extensions.insert(profile.clone());

        let Auth(resolved) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(resolved, profile);
    }
}
