// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Profile repository: registration and credential verification.
//!
//! Usernames are unique and case-sensitive; uniqueness is enforced by the
//! `profile_usernames` key inside the registering write transaction.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::password;
use crate::storage::audit::{AuditEvent, AuditEventType};
use crate::storage::database::{commit, Deadline, Store, PROFILES, PROFILE_USERNAMES};
use crate::storage::{ConflictError, StoreError, StoreResult};

const MAX_USERNAME_CHARS: usize = 64;
const MIN_PASSWORD_BYTES: usize = 8;
const MAX_PASSWORD_BYTES: usize = 1024;

/// Profile record stored in the `profiles` table.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredProfile {
    pub id: Uuid,
    pub username: String,
    /// Argon2id PHC string. Never returned by the API.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for StoredProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredProfile")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

pub fn validate_username(username: &str) -> StoreResult<()> {
    if username.is_empty() {
        return Err(StoreError::Validation("username must not be empty".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(StoreError::Validation(format!(
            "username must be at most {MAX_USERNAME_CHARS} characters"
        )));
    }
    if username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(StoreError::Validation(
            "username must not contain whitespace or control characters".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> StoreResult<()> {
    if password.len() < MIN_PASSWORD_BYTES || password.len() > MAX_PASSWORD_BYTES {
        return Err(StoreError::Validation(format!(
            "password must be between {MIN_PASSWORD_BYTES} and {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Repository for profile operations.
pub struct ProfileStore<'a> {
    store: &'a Store,
}

impl<'a> ProfileStore<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Register a new profile. The password is hashed before the write
    /// transaction starts so the writer lock is not held during hashing.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        deadline: &Deadline,
    ) -> StoreResult<StoredProfile> {
        validate_username(username)?;
        validate_password(password)?;

        let password_hash = password::hash_password(password)
            .map_err(|e| StoreError::Integrity(format!("password hashing failed: {e}")))?;

        let profile = StoredProfile {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec(&profile)?;

        let write_txn = self.store.write(deadline)?;
        {
            let mut usernames = write_txn.open_table(PROFILE_USERNAMES)?;
            let taken = usernames.get(username)?.is_some();
            if taken {
                return Err(ConflictError::DuplicateUsername.into());
            }
            usernames.insert(username, profile.id.as_u128())?;

            let mut profiles = write_txn.open_table(PROFILES)?;
            profiles.insert(profile.id.as_u128(), json.as_slice())?;
        }
        AuditEvent::new(AuditEventType::ProfileRegistered)
            .with_profile(Some(profile.id))
            .with_resource("profile", profile.id.to_string())
            .record(&write_txn)?;
        commit(write_txn, deadline)?;

        tracing::info!(profile_id = %profile.id, "Registered profile");
        Ok(profile)
    }

    /// Verify credentials and return the profile id. Does not mint a token.
    pub fn login(&self, username: &str, password: &str, deadline: &Deadline) -> StoreResult<Uuid> {
        let profile = match self.find_by_username(username, deadline)? {
            Some(profile) => profile,
            None => {
                password::verify_against_dummy(password);
                return Err(StoreError::InvalidCredentials);
            }
        };

        if !password::verify_password(password, &profile.password_hash) {
            return Err(StoreError::InvalidCredentials);
        }
        Ok(profile.id)
    }

    /// Get a profile by ID.
    pub fn get(&self, profile_id: Uuid, deadline: &Deadline) -> StoreResult<StoredProfile> {
        let read_txn = self.store.read(deadline)?;
        let profiles = read_txn.open_table(PROFILES)?;
        let stored = profiles.get(profile_id.as_u128())?;
        match stored {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StoreError::NotFound(format!("Profile {profile_id}"))),
        }
    }

    fn find_by_username(
        &self,
        username: &str,
        deadline: &Deadline,
    ) -> StoreResult<Option<StoredProfile>> {
        let read_txn = self.store.read(deadline)?;
        let usernames = read_txn.open_table(PROFILE_USERNAMES)?;
        let profile_id = usernames.get(username)?.map(|v| v.value());
        let Some(profile_id) = profile_id else {
            return Ok(None);
        };

        let profiles = read_txn.open_table(PROFILES)?;
        let stored = profiles.get(profile_id)?;
        match stored {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Err(StoreError::Integrity(format!(
                "username index points at missing profile {}",
                Uuid::from_u128(profile_id)
            ))),
        }
    }
}
