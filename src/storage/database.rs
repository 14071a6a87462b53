// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded metadata database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `profiles`: profile_id → serialized StoredProfile
//! - `profile_usernames`: username → profile_id
//! - `tokens`: sha256(token value) → serialized StoredToken
//! - `nodes`: node_id → serialized StoredNode
//! - `node_children`: composite key (parent_id|name) → child node_id
//! - `tags`: normalized tag name → serialized StoredTag
//! - `tag_names`: tag_id → normalized tag name
//! - `node_tags` / `tag_nodes`: composite pair keys, both directions
//! - `audit_events`: recording sequence (u64 be) → serialized AuditEvent
//! - `meta`: key → value (root node id, audit sequence counter)
//!
//! redb runs one write transaction at a time and gives readers a committed
//! snapshot, so every check performed inside a write transaction sees the
//! latest committed state and no other writer can interleave with it.

use std::path::Path;
use std::time::{Duration, Instant};

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use uuid::Uuid;

use super::repository::nodes;
use super::{StoreError, StoreResult};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const PROFILES: TableDefinition<u128, &[u8]> = TableDefinition::new("profiles");

pub(crate) const PROFILE_USERNAMES: TableDefinition<&str, u128> =
    TableDefinition::new("profile_usernames");

/// Keyed by the SHA-256 digest of the token value, never by the value itself.
pub(crate) const TOKENS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tokens");

pub(crate) const NODES: TableDefinition<u128, &[u8]> = TableDefinition::new("nodes");

/// Key format: `parent_id (16 bytes) | name (utf-8)`.
pub(crate) const NODE_CHILDREN: TableDefinition<&[u8], u128> =
    TableDefinition::new("node_children");

pub(crate) const TAGS: TableDefinition<&str, &[u8]> = TableDefinition::new("tags");

pub(crate) const TAG_NAMES: TableDefinition<u128, &str> = TableDefinition::new("tag_names");

/// Key format: `node_id | tag_id`.
pub(crate) const NODE_TAGS: TableDefinition<&[u8], ()> = TableDefinition::new("node_tags");

/// Key format: `tag_id | node_id`.
pub(crate) const TAG_NODES: TableDefinition<&[u8], ()> = TableDefinition::new("tag_nodes");

/// Key format: recording sequence, big-endian.
pub(crate) const AUDIT_EVENTS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("audit_events");

pub(crate) const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const ROOT_NODE_KEY: &str = "root_node";

/// `meta` key holding the last audit sequence number (u64, big-endian).
pub(crate) const AUDIT_SEQUENCE_KEY: &str = "audit_sequence";

// =============================================================================
// Deadline
// =============================================================================

/// Caller-supplied cutoff for a storage operation.
///
/// Checked when a transaction begins and again right before commit. An
/// expired deadline aborts the transaction, so nothing is half-applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No cutoff.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// Deadline `timeout` from now, or none when `timeout` is `None` or
    /// lies beyond what `Instant` can represent.
    pub fn after(timeout: Option<Duration>) -> Self {
        Self(timeout.and_then(|t| Instant::now().checked_add(t)))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.0, Some(at) if Instant::now() >= at)
    }

    pub fn check(&self) -> StoreResult<()> {
        if self.is_expired() {
            Err(StoreError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Handle to the metadata database. Shared behind an `Arc`; every repository
/// borrows it for the duration of one operation.
pub struct Store {
    db: Database,
    root_id: Uuid,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PROFILES)?;
            let _ = write_txn.open_table(PROFILE_USERNAMES)?;
            let _ = write_txn.open_table(TOKENS)?;
            let _ = write_txn.open_table(NODES)?;
            let _ = write_txn.open_table(NODE_CHILDREN)?;
            let _ = write_txn.open_table(TAGS)?;
            let _ = write_txn.open_table(TAG_NAMES)?;
            let _ = write_txn.open_table(NODE_TAGS)?;
            let _ = write_txn.open_table(TAG_NODES)?;
            let _ = write_txn.open_table(AUDIT_EVENTS)?;
        }
        let existing_root = {
            let meta = write_txn.open_table(META)?;
            let stored = meta.get(ROOT_NODE_KEY)?;
            stored.map(|v| v.value().to_vec())
        };
        let root_id = match existing_root {
            Some(bytes) => Uuid::from_slice(&bytes)
                .map_err(|e| StoreError::Integrity(format!("corrupt root node id: {e}")))?,
            None => {
                let root_id = nodes::insert_root(&write_txn)?;
                let mut meta = write_txn.open_table(META)?;
                meta.insert(ROOT_NODE_KEY, root_id.as_bytes().as_slice())?;
                tracing::info!(%root_id, "Created root node");
                root_id
            }
        };
        write_txn.commit()?;

        Ok(Self { db, root_id })
    }

    /// Identifier of the single parentless directory.
    pub fn root_id(&self) -> Uuid {
        self.root_id
    }

    pub(crate) fn read(&self, deadline: &Deadline) -> StoreResult<ReadTransaction> {
        deadline.check()?;
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction. Blocks while another writer is active; the
    /// deadline is re-checked once the write lock is held.
    pub(crate) fn write(&self, deadline: &Deadline) -> StoreResult<WriteTransaction> {
        deadline.check()?;
        let txn = self.db.begin_write()?;
        if deadline.is_expired() {
            txn.abort()?;
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(txn)
    }

    /// Cheap liveness probe for health checks.
    pub fn ping(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let meta = read_txn.open_table(META)?;
        let present = meta.get(ROOT_NODE_KEY)?.is_some();
        if present {
            Ok(())
        } else {
            Err(StoreError::Integrity("root node marker missing".to_string()))
        }
    }
}

/// Commit `txn` unless the deadline has passed, in which case roll it back.
pub(crate) fn commit(txn: WriteTransaction, deadline: &Deadline) -> StoreResult<()> {
    if deadline.is_expired() {
        txn.abort()?;
        return Err(StoreError::DeadlineExceeded);
    }
    txn.commit()?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn temp_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("test.redb")).unwrap();
    (store, dir)
}
