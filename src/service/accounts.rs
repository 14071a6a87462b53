// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account operations: registration, login, logout and profile lookups.
//!
//! Credential verification and token issuance stay in separate
//! repositories; login is where they are composed.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::run_blocking;
use crate::auth::{AuthenticatedProfile, Credential};
use crate::storage::{
    AuditEvent, AuditLog, IssuedToken, ProfileStore, Store, StoreError, StoreResult,
    StoredProfile, TokenAuthority, TokenSource,
};

/// Largest audit page a caller may request.
pub const MAX_AUDIT_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AccountService {
    store: Arc<Store>,
    token_source: Arc<dyn TokenSource>,
    token_ttl: Option<chrono::Duration>,
    timeout: Option<Duration>,
}

impl AccountService {
    pub fn new(
        store: Arc<Store>,
        token_source: Arc<dyn TokenSource>,
        token_ttl: Option<chrono::Duration>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            token_source,
            token_ttl,
            timeout,
        }
    }

    pub async fn register(&self, username: String, password: String) -> StoreResult<StoredProfile> {
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            ProfileStore::new(store).register(&username, &password, deadline)
        })
        .await
    }

    /// Verify credentials, then issue a fresh token for the profile.
    pub async fn login(&self, username: String, password: String) -> StoreResult<IssuedToken> {
        let source = Arc::clone(&self.token_source);
        let ttl = self.token_ttl;
        let result = run_blocking(&self.store, self.timeout, move |store, deadline| {
            let profile_id = ProfileStore::new(store).login(&username, &password, deadline)?;
            TokenAuthority::new(store, source.as_ref())
                .with_ttl(ttl)
                .issue(profile_id, deadline)
        })
        .await;

        if let Err(StoreError::InvalidCredentials) = &result {
            tracing::warn!("Failed login attempt");
        }
        result
    }

    /// Revoke the token the caller authenticated with.
    pub async fn logout(&self, credential: &Credential) -> StoreResult<()> {
        let source = Arc::clone(&self.token_source);
        let value = credential.value().to_string();
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            TokenAuthority::new(store, source.as_ref()).revoke(&value, deadline)
        })
        .await
    }

    pub async fn profile(&self, caller: &AuthenticatedProfile) -> StoreResult<StoredProfile> {
        let profile_id = caller.profile_id;
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            ProfileStore::new(store).get(profile_id, deadline)
        })
        .await
    }

    /// The caller's most recent audit events, newest first.
    pub async fn audit_trail(
        &self,
        caller: &AuthenticatedProfile,
        limit: usize,
    ) -> StoreResult<Vec<AuditEvent>> {
        let profile_id: Uuid = caller.profile_id;
        let limit = limit.clamp(1, MAX_AUDIT_LIMIT);
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            AuditLog::new(store).recent_for_profile(profile_id, limit, deadline)
        })
        .await
    }
}
