// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage and domain error types.
//!
//! Every fallible storage operation returns [`StoreError`]. Backend failures
//! (redb, serde) and domain rejections (duplicate sibling, cycle, bad token)
//! share one enum so that a single `?` chain can carry both out of a write
//! transaction; [`StoreError::category`] groups them for the HTTP boundary.

use uuid::Uuid;

/// Rejected-operation failures. The caller may retry with different input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("username is already registered")]
    DuplicateUsername,

    #[error("a node named '{name}' already exists under this parent")]
    DuplicateSibling { name: String },

    #[error("move would make the node its own ancestor")]
    WouldCreateCycle,

    #[error("directory is not empty")]
    DirectoryNotEmpty,

    #[error("parent node is a file")]
    ParentIsFile,

    #[error("tag '{tag}' is still attached to nodes")]
    TagInUse { tag: String },
}

impl ConflictError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConflictError::DuplicateUsername => "duplicate_username",
            ConflictError::DuplicateSibling { .. } => "duplicate_sibling",
            ConflictError::WouldCreateCycle => "would_create_cycle",
            ConflictError::DirectoryNotEmpty => "directory_not_empty",
            ConflictError::ParentIsFile => "parent_is_file",
            ConflictError::TagInUse { .. } => "tag_in_use",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("parent node {0} not found")]
    ParentNotFound(Uuid),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("bearer token is missing")]
    MissingToken,

    #[error("bearer token is invalid")]
    InvalidToken,

    #[error("bearer token has expired")]
    ExpiredToken,

    #[error("token value collided {attempts} times in a row")]
    TokenCollision { attempts: usize },

    #[error("deadline exceeded before the operation could commit")]
    DeadlineExceeded,

    #[error("integrity violation: {0}")]
    Integrity(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Boundary-facing failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Auth,
    Conflict,
    NotFound,
    Timeout,
    Internal,
}

impl StoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::Validation(_) | StoreError::MissingToken => ErrorCategory::Validation,
            StoreError::InvalidCredentials
            | StoreError::InvalidToken
            | StoreError::ExpiredToken => ErrorCategory::Auth,
            StoreError::Conflict(_) => ErrorCategory::Conflict,
            StoreError::NotFound(_) | StoreError::ParentNotFound(_) => ErrorCategory::NotFound,
            StoreError::DeadlineExceeded => ErrorCategory::Timeout,
            StoreError::Redb(_)
            | StoreError::RedbDatabase(_)
            | StoreError::RedbTransaction(_)
            | StoreError::RedbTable(_)
            | StoreError::RedbStorage(_)
            | StoreError::RedbCommit(_)
            | StoreError::Serde(_)
            | StoreError::Io(_)
            | StoreError::TokenCollision { .. }
            | StoreError::Integrity(_) => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable code for the boundary response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "validation_error",
            StoreError::NotFound(_) => "not_found",
            StoreError::ParentNotFound(_) => "parent_not_found",
            StoreError::Conflict(c) => c.error_code(),
            StoreError::InvalidCredentials => "invalid_credentials",
            StoreError::MissingToken => "missing_token",
            StoreError::InvalidToken => "invalid_token",
            StoreError::ExpiredToken => "expired_token",
            StoreError::DeadlineExceeded => "timeout",
            _ => "internal_error",
        }
    }
}
