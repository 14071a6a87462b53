// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The authorization gate: bearer extraction and token validation in front
//! of every protected operation.
//!
//! The gate short-circuits. When the credential is missing, malformed or not
//! accepted, the wrapped operation is never polled, let alone run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{AuthError, AuthenticatedProfile};
use crate::service::run_blocking;
use crate::storage::{Store, TokenAuthority, TokenSource};

const BEARER_SCHEME: &str = "Bearer";

/// Bearer token value as presented by the caller.
#[derive(Clone)]
pub struct Credential(String);

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl Credential {
    /// Extract the bearer value from request headers.
    ///
    /// An absent or blank header, or `Bearer` with nothing after it, is
    /// [`AuthError::MissingToken`]. Any other scheme, or a header that is not
    /// visible ASCII, is [`AuthError::InvalidToken`].
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let Some(header) = headers.get(AUTHORIZATION) else {
            return Err(AuthError::MissingToken);
        };
        let raw = header
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?
            .trim();
        if raw.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let (scheme, value) = raw.split_once(' ').unwrap_or((raw, ""));
        if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
            return Err(AuthError::InvalidToken);
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(Self(value.to_string()))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Credential {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Credential::from_headers(&parts.headers)
    }
}

/// Validates credentials against the token table.
#[derive(Clone)]
pub struct AuthorizationGate {
    store: Arc<Store>,
    token_source: Arc<dyn TokenSource>,
    timeout: Option<Duration>,
}

impl AuthorizationGate {
    pub fn new(
        store: Arc<Store>,
        token_source: Arc<dyn TokenSource>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            token_source,
            timeout,
        }
    }

    /// Resolve a credential to the profile it was issued to.
    ///
    /// The lookup runs on the blocking pool; no in-process lock is held.
    pub async fn authorize(&self, credential: &Credential) -> Result<AuthenticatedProfile, AuthError> {
        let value = credential.0.clone();
        let source = Arc::clone(&self.token_source);
        let validated = run_blocking(&self.store, self.timeout, move |store, deadline| {
            TokenAuthority::new(store, source.as_ref()).validate(&value, deadline)
        })
        .await
        .map_err(|e| {
            tracing::debug!(error_code = e.error_code(), "Rejected bearer credential");
            AuthError::from(e)
        })?;

        Ok(AuthenticatedProfile {
            profile_id: validated.profile_id,
            token_expires_at: validated.expires_at,
        })
    }

    /// Run `operation` for the authenticated profile, or fail without
    /// invoking it.
    pub async fn admit<F, Fut>(
        &self,
        credential: &Credential,
        operation: F,
    ) -> Result<Fut::Output, AuthError>
    where
        F: FnOnce(AuthenticatedProfile) -> Fut,
        Fut: Future,
    {
        let profile = self.authorize(credential).await?;
        Ok(operation(profile).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;
    use crate::storage::{Deadline, ProfileStore, SystemTokenSource};
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn absent_or_empty_header_is_missing() {
        for value in [None, Some(""), Some("Bearer"), Some("Bearer   ")] {
            assert!(
                matches!(Credential::from_headers(&headers(value)), Err(AuthError::MissingToken)),
                "{value:?}"
            );
        }
    }

    #[test]
    fn other_schemes_are_invalid() {
        for value in ["Basic dXNlcjpwYXNz", "Token abc", "abc"] {
            assert!(matches!(
                Credential::from_headers(&headers(Some(value))),
                Err(AuthError::InvalidToken)
            ));
        }
    }

    #[test]
    fn bearer_value_is_extracted() {
        let credential = Credential::from_headers(&headers(Some("bearer  abc-123 "))).unwrap();
        assert_eq!(credential.value(), "abc-123");
        assert!(!format!("{credential:?}").contains("abc-123"));
    }

    fn gate_with_token() -> (AuthorizationGate, String, uuid::Uuid, tempfile::TempDir) {
        let (store, dir) = temp_store();
        let profile = ProfileStore::new(&store)
            .register("gatekeeper", "long-enough", &Deadline::none())
            .unwrap();
        let source: Arc<dyn TokenSource> = Arc::new(SystemTokenSource::new());
        let token = TokenAuthority::new(&store, source.as_ref())
            .issue(profile.id, &Deadline::none())
            .unwrap();
        let gate = AuthorizationGate::new(Arc::new(store), source, None);
        (gate, token.value, profile.id, dir)
    }

    #[tokio::test]
    async fn admit_runs_operation_for_valid_token() {
        let (gate, token, profile_id, _dir) = gate_with_token();
        let credential = Credential::from_headers(&headers(Some(&format!("Bearer {token}")))).unwrap();

        let seen = gate
            .admit(&credential, |profile| async move { profile.profile_id })
            .await
            .unwrap();
        assert_eq!(seen, profile_id);
    }

    #[tokio::test]
    async fn admit_never_invokes_operation_on_failure() {
        let (gate, _token, _profile_id, _dir) = gate_with_token();
        let invoked = Arc::new(AtomicBool::new(false));
        let credential = Credential::from_headers(&headers(Some("Bearer not-a-real-token"))).unwrap();

        let flag = Arc::clone(&invoked);
        let result = gate
            .admit(&credential, |_| async move {
                flag.store(true, Ordering::SeqCst);
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidToken)));
        assert!(!invoked.load(Ordering::SeqCst));
    }
}
