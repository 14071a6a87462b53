// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Opaque bearer-token authentication for the tag store API.
//!
//! ## Auth Flow
//!
//! 1. Client registers, then logs in with username and password
//! 2. Login returns a random bearer token; only its SHA-256 digest is stored
//! 3. Client sends `Authorization: Bearer <token>` on every node/tag call
//! 4. The gate middleware:
//!    - Rejects an absent header with 400 (malformed request)
//!    - Rejects an unknown, revoked or expired token with 401
//!    - Otherwise attaches the profile to the request and runs the handler
//!
//! ## Security
//!
//! - Passwords are hashed with Argon2id; unknown usernames cost the same
//! - Tokens are looked up by their SHA-256 digest, never by the raw value
//! - Token values and passwords are never logged

pub mod error;
pub mod extractor;
pub mod gate;
pub mod middleware;
pub mod password;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use error::AuthError;
pub use extractor::Auth;
pub use gate::{AuthorizationGate, Credential};

/// Identity attached to a request once the gate admits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedProfile {
    pub profile_id: Uuid,
    pub token_expires_at: Option<DateTime<Utc>>,
}
