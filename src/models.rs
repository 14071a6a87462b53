// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API. All types derive `Serialize`/`Deserialize` and `ToSchema`
//! for JSON handling and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Accounts**: Registration, login and the caller's profile
//! - **Nodes**: Tree creation, moves, renames and deletion
//! - **Tags**: Attach/detach, intersection queries and tag management
//! - **Audit**: The caller's audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::storage::{AuditEvent, NodeKind, StoredNode, StoredProfile, TagUsage};

// =============================================================================
// Accounts
// =============================================================================

/// Credentials for registration and login.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    /// Case-sensitive, 1-64 characters, no whitespace.
    pub username: String,
    /// 8-1024 bytes.
    pub password: String,
}

impl std::fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub profile_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Opaque bearer token. Send as `Authorization: Bearer <token>`.
    pub token: String,
    pub profile_id: Uuid,
    /// Absent when tokens do not expire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Public view of a profile (never includes the password hash).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub profile_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    /// Expiry of the token used for this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl ProfileResponse {
    pub fn new(profile: StoredProfile, token_expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            profile_id: profile.id,
            username: profile.username,
            created_at: profile.created_at,
            token_expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateNodeRequest {
    /// Parent directory. Defaults to the root.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub kind: NodeKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MoveNodeRequest {
    pub new_parent_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RenameNodeRequest {
    pub name: String,
}

/// A node as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NodeResponse {
    pub id: Uuid,
    /// Absent only for the root.
    pub parent_id: Option<Uuid>,
    pub kind: NodeKind,
    pub name: String,
    pub owner_profile_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Absolute path, included on single-node lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<StoredNode> for NodeResponse {
    fn from(node: StoredNode) -> Self {
        Self {
            id: node.id,
            parent_id: node.parent_id,
            kind: node.kind,
            name: node.name,
            owner_profile_id: node.owner_profile_id,
            created_at: node.created_at,
            path: None,
        }
    }
}

impl NodeResponse {
    pub fn with_path(mut self, path: String) -> Self {
        self.path = Some(path);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeListResponse {
    pub nodes: Vec<NodeResponse>,
    pub total: usize,
}

impl From<Vec<StoredNode>> for NodeListResponse {
    fn from(nodes: Vec<StoredNode>) -> Self {
        let nodes: Vec<NodeResponse> = nodes.into_iter().map(NodeResponse::from).collect();
        Self {
            total: nodes.len(),
            nodes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct DeleteParams {
    /// Delete descendants (or detach from all nodes, for tags). Defaults to false.
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteNodeResponse {
    pub node_id: Uuid,
    /// Number of nodes removed, including the target.
    pub removed: usize,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PathParams {
    /// Absolute path such as `/docs/report.pdf`.
    pub path: String,
}

// =============================================================================
// Tags
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagMembershipRequest {
    pub node_id: Uuid,
    pub tag_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttachTagResponse {
    pub node_id: Uuid,
    /// Normalized tag name.
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DetachTagResponse {
    pub node_id: Uuid,
    /// False when the tag was not attached.
    pub removed: bool,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct TagQueryParams {
    /// Comma-separated tag names; a node must carry all of them.
    pub names: String,
}

impl TagQueryParams {
    pub fn tag_names(&self) -> Vec<String> {
        self.names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeTagsResponse {
    pub node_id: Uuid,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagListResponse {
    pub tags: Vec<TagUsage>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteTagResponse {
    pub tag: String,
    /// Memberships removed by a cascading delete.
    pub detached: usize,
}

// =============================================================================
// Audit
// =============================================================================

pub const DEFAULT_AUDIT_LIMIT: usize = 50;

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct AuditParams {
    /// Maximum events to return (1-500, default 50).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditListResponse {
    pub events: Vec<AuditEvent>,
    pub total: usize,
}
