// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Metadata Storage Module
//!
//! Persistent storage for profiles, tokens, the node tree and the tag index,
//! backed by a single embedded **redb** database file.
//!
//! ## Consistency Model
//!
//! - Every mutation runs inside one redb write transaction
//! - redb admits one writer at a time, so mutations are serializable
//! - All invariant checks (cycles, sibling names, uniqueness) read inside
//!   the same transaction that writes
//! - A failed check, error or expired [`Deadline`] aborts the transaction,
//!   leaving nothing half-applied
//!
//! ## Table Layout
//!
//! ```text
//! profiles           profile_id        → StoredProfile (json)
//! profile_usernames  username          → profile_id
//! tokens             sha256(value)     → StoredToken (json)
//! nodes              node_id           → StoredNode (json)
//! node_children      parent_id | name  → child_id
//! tags               normalized name   → StoredTag (json)
//! tag_names          tag_id            → normalized name
//! node_tags          node_id | tag_id  → ()
//! tag_nodes          tag_id | node_id  → ()
//! audit_events       sequence          → AuditEvent (json)
//! meta               key               → bytes
//! ```
//!
//! ## Important Notes
//!
//! - Calls are blocking; async callers go through `spawn_blocking`
//! - Token values are never stored, only their digest

pub mod audit;
pub mod database;
pub mod error;
pub mod keys;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditLog};
pub use database::{Deadline, Store};
pub use error::{ConflictError, ErrorCategory, StoreError, StoreResult};
pub use repository::{
    IssuedToken, NodeKind, NodeStore, ProfileStore, StoredNode, StoredProfile, StoredTag,
    SystemTokenSource, TagIndex, TagUsage, TokenAuthority, TokenSource, ValidatedToken,
};
