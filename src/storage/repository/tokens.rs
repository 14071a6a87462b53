// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token authority: issues, validates and revokes opaque bearer tokens.
//!
//! ## Storage
//!
//! Tokens are keyed by `sha256(value)`. The plaintext value is returned to the
//! caller exactly once at issuance and never persisted. Lookups hash the
//! presented value first and search by digest, so the index never compares
//! against secret bytes and timing reveals nothing about partial matches of
//! a stored value.
//!
//! Revoked tokens stay in the table as tombstones so a value can never be
//! issued twice, even after revocation.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use redb::ReadableTable;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::storage::audit::{AuditEvent, AuditEventType};
use crate::storage::database::{commit, Deadline, Store, PROFILES, TOKENS};
use crate::storage::{StoreError, StoreResult};

/// Random bytes per token (256 bits before encoding).
pub const TOKEN_BYTES: usize = 32;

/// Fresh values tried before issuance fails closed.
pub const MAX_ISSUE_ATTEMPTS: usize = 4;

/// Source of token values.
pub trait TokenSource: Send + Sync {
    fn generate(&self) -> StoreResult<String>;
}

/// Operating-system CSPRNG, URL-safe base64 without padding.
pub struct SystemTokenSource {
    rng: SystemRandom,
}

impl SystemTokenSource {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for SystemTokenSource {
    fn generate(&self) -> StoreResult<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| StoreError::Integrity("system random source failed".to_string()))?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }
}

/// Token record stored in the `tokens` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredToken {
    /// Hex of sha256(value); duplicated from the key as a row integrity check.
    pub digest: String,
    pub profile_id: Uuid,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

/// A freshly issued token. `value` is the only copy of the secret.
#[derive(Clone)]
pub struct IssuedToken {
    pub value: String,
    pub profile_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("value", &"<redacted>")
            .field("profile_id", &self.profile_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedToken {
    pub profile_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

fn digest_of(value: &str) -> [u8; 32] {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(Sha256::digest(value.as_bytes()).as_slice());
    digest
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Repository for token operations.
pub struct TokenAuthority<'a> {
    store: &'a Store,
    source: &'a dyn TokenSource,
    ttl: Option<chrono::Duration>,
}

impl<'a> TokenAuthority<'a> {
    pub fn new(store: &'a Store, source: &'a dyn TokenSource) -> Self {
        Self {
            store,
            source,
            ttl: None,
        }
    }

    /// Give newly issued tokens a lifetime. `None` disables expiry.
    pub fn with_ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a token bound to `profile_id`.
    ///
    /// Existence of the digest is checked and the row inserted in the same
    /// write transaction, so two issuers can never both own one value. A
    /// collision with any live or revoked token is retried with fresh
    /// randomness up to [`MAX_ISSUE_ATTEMPTS`] times, then fails closed.
    pub fn issue(&self, profile_id: Uuid, deadline: &Deadline) -> StoreResult<IssuedToken> {
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let value = self.source.generate()?;
            let digest = digest_of(&value);
            let issued_at = Utc::now();
            let expires_at = match self.ttl {
                Some(ttl) => Some(issued_at.checked_add_signed(ttl).ok_or_else(|| {
                    StoreError::Integrity(
                        "token lifetime exceeds the representable time range".to_string(),
                    )
                })?),
                None => None,
            };

            let write_txn = self.store.write(deadline)?;
            let known = {
                let profiles = write_txn.open_table(PROFILES)?;
                let found = profiles.get(profile_id.as_u128())?.is_some();
                found
            };
            if !known {
                return Err(StoreError::NotFound(format!("Profile {profile_id}")));
            }

            let collided = {
                let tokens = write_txn.open_table(TOKENS)?;
                let found = tokens.get(digest.as_slice())?.is_some();
                found
            };
            if collided {
                tracing::warn!(attempt, %profile_id, "Token value collision, regenerating");
                write_txn.abort()?;
                continue;
            }

            let record = StoredToken {
                digest: hex(&digest),
                profile_id,
                issued_at,
                expires_at,
                revoked_at: None,
            };
            let json = serde_json::to_vec(&record)?;
            {
                let mut tokens = write_txn.open_table(TOKENS)?;
                tokens.insert(digest.as_slice(), json.as_slice())?;
            }
            AuditEvent::new(AuditEventType::TokenIssued)
                .with_profile(Some(profile_id))
                .with_resource("token", hex(&digest[..8]))
                .record(&write_txn)?;
            commit(write_txn, deadline)?;

            tracing::info!(%profile_id, "Issued token");
            return Ok(IssuedToken {
                value,
                profile_id,
                issued_at,
                expires_at,
            });
        }

        tracing::error!(%profile_id, attempts = MAX_ISSUE_ATTEMPTS, "Token issuance exhausted retries");
        Err(StoreError::TokenCollision {
            attempts: MAX_ISSUE_ATTEMPTS,
        })
    }

    /// Resolve a presented token value to its owning profile.
    pub fn validate(&self, value: &str, deadline: &Deadline) -> StoreResult<ValidatedToken> {
        if value.trim().is_empty() {
            return Err(StoreError::MissingToken);
        }
        let digest = digest_of(value);

        let read_txn = self.store.read(deadline)?;
        let tokens = read_txn.open_table(TOKENS)?;
        let stored = tokens.get(digest.as_slice())?;
        let record: StoredToken = match stored {
            Some(bytes) => serde_json::from_slice(bytes.value())?,
            None => return Err(StoreError::InvalidToken),
        };

        if record.digest != hex(&digest) {
            return Err(StoreError::Integrity(
                "token row digest does not match its key".to_string(),
            ));
        }

        if record.revoked_at.is_some() {
            return Err(StoreError::InvalidToken);
        }
        if let Some(expires_at) = record.expires_at {
            if Utc::now() >= expires_at {
                return Err(StoreError::ExpiredToken);
            }
        }

        Ok(ValidatedToken {
            profile_id: record.profile_id,
            expires_at: record.expires_at,
        })
    }

    /// Permanently invalidate a token. Unknown and already-revoked values are
    /// a no-op.
    pub fn revoke(&self, value: &str, deadline: &Deadline) -> StoreResult<()> {
        if value.trim().is_empty() {
            return Ok(());
        }
        let digest = digest_of(value);

        let write_txn = self.store.write(deadline)?;
        let revoked_profile = {
            let mut tokens = write_txn.open_table(TOKENS)?;
            let existing = tokens.get(digest.as_slice())?.map(|v| v.value().to_vec());
            match existing {
                Some(bytes) => {
                    let mut record: StoredToken = serde_json::from_slice(&bytes)?;
                    if record.revoked_at.is_some() {
                        None
                    } else {
                        record.revoked_at = Some(Utc::now());
                        let json = serde_json::to_vec(&record)?;
                        tokens.insert(digest.as_slice(), json.as_slice())?;
                        Some(record.profile_id)
                    }
                }
                None => None,
            }
        };

        let Some(profile_id) = revoked_profile else {
            write_txn.abort()?;
            return Ok(());
        };
        AuditEvent::new(AuditEventType::TokenRevoked)
            .with_profile(Some(profile_id))
            .with_resource("token", hex(&digest[..8]))
            .record(&write_txn)?;
        commit(write_txn, deadline)?;

        tracing::info!(%profile_id, "Revoked token");
        Ok(())
    }
}
