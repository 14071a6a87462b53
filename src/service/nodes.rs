// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Node and tag operations for authenticated callers.
//!
//! Every method takes the [`AuthenticatedProfile`] the gate produced, which
//! is recorded as the actor in the audit trail and as the owner of created
//! nodes. Invariants live in [`NodeStore`] and [`TagIndex`]; this layer only
//! delegates.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::run_blocking;
use crate::auth::AuthenticatedProfile;
use crate::storage::{
    NodeKind, NodeStore, Store, StoreResult, StoredNode, StoredTag, TagIndex, TagUsage,
};

/// A node together with its absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDetail {
    pub node: StoredNode,
    pub path: String,
}

#[derive(Clone)]
pub struct NodeService {
    store: Arc<Store>,
    timeout: Option<Duration>,
}

impl NodeService {
    pub fn new(store: Arc<Store>, timeout: Option<Duration>) -> Self {
        Self { store, timeout }
    }

    pub fn root_id(&self) -> Uuid {
        self.store.root_id()
    }

    pub async fn create_node(
        &self,
        caller: &AuthenticatedProfile,
        parent_id: Uuid,
        kind: NodeKind,
        name: String,
    ) -> StoreResult<StoredNode> {
        let owner = Some(caller.profile_id);
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            NodeStore::new(store).create(parent_id, kind, &name, owner, deadline)
        })
        .await
    }

    pub async fn move_node(
        &self,
        caller: &AuthenticatedProfile,
        node_id: Uuid,
        new_parent_id: Uuid,
    ) -> StoreResult<StoredNode> {
        let actor = Some(caller.profile_id);
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            NodeStore::new(store).move_to(node_id, new_parent_id, actor, deadline)
        })
        .await
    }

    pub async fn rename_node(
        &self,
        caller: &AuthenticatedProfile,
        node_id: Uuid,
        name: String,
    ) -> StoreResult<StoredNode> {
        let actor = Some(caller.profile_id);
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            NodeStore::new(store).rename(node_id, &name, actor, deadline)
        })
        .await
    }

    /// Returns the number of nodes removed.
    pub async fn delete_node(
        &self,
        caller: &AuthenticatedProfile,
        node_id: Uuid,
        cascade: bool,
    ) -> StoreResult<usize> {
        let actor = Some(caller.profile_id);
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            NodeStore::new(store).delete(node_id, cascade, actor, deadline)
        })
        .await
    }

    pub async fn node(&self, _caller: &AuthenticatedProfile, node_id: Uuid) -> StoreResult<NodeDetail> {
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            let nodes = NodeStore::new(store);
            let node = nodes.lookup(node_id, deadline)?;
            let path = nodes.path_of(node_id, deadline)?;
            Ok(NodeDetail { node, path })
        })
        .await
    }

    pub async fn resolve_path(
        &self,
        _caller: &AuthenticatedProfile,
        path: String,
    ) -> StoreResult<NodeDetail> {
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            let nodes = NodeStore::new(store);
            let node = nodes.resolve_path(&path, deadline)?;
            let path = nodes.path_of(node.id, deadline)?;
            Ok(NodeDetail { node, path })
        })
        .await
    }

    pub async fn list_children(
        &self,
        _caller: &AuthenticatedProfile,
        node_id: Uuid,
    ) -> StoreResult<Vec<StoredNode>> {
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            NodeStore::new(store).list_children(node_id, deadline)
        })
        .await
    }

    pub async fn attach_tag(
        &self,
        caller: &AuthenticatedProfile,
        node_id: Uuid,
        tag_name: String,
    ) -> StoreResult<StoredTag> {
        let actor = Some(caller.profile_id);
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            TagIndex::new(store).attach(node_id, &tag_name, actor, deadline)
        })
        .await
    }

    /// Returns whether a membership was removed.
    pub async fn detach_tag(
        &self,
        caller: &AuthenticatedProfile,
        node_id: Uuid,
        tag_name: String,
    ) -> StoreResult<bool> {
        let actor = Some(caller.profile_id);
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            TagIndex::new(store).detach(node_id, &tag_name, actor, deadline)
        })
        .await
    }

    pub async fn query_by_tags(
        &self,
        _caller: &AuthenticatedProfile,
        tag_names: Vec<String>,
    ) -> StoreResult<Vec<StoredNode>> {
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            TagIndex::new(store).query_by_tags(&tag_names, deadline)
        })
        .await
    }

    pub async fn tags_of(
        &self,
        _caller: &AuthenticatedProfile,
        node_id: Uuid,
    ) -> StoreResult<BTreeSet<String>> {
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            TagIndex::new(store).tags_of(node_id, deadline)
        })
        .await
    }

    pub async fn list_tags(&self, _caller: &AuthenticatedProfile) -> StoreResult<Vec<TagUsage>> {
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            TagIndex::new(store).list_tags(deadline)
        })
        .await
    }

    /// Returns the number of memberships removed.
    pub async fn delete_tag(
        &self,
        caller: &AuthenticatedProfile,
        tag_name: String,
        cascade: bool,
    ) -> StoreResult<usize> {
        let actor = Some(caller.profile_id);
        run_blocking(&self.store, self.timeout, move |store, deadline| {
            TagIndex::new(store).delete_tag(&tag_name, cascade, actor, deadline)
        })
        .await
    }
}
