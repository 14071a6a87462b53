// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Node repository: the file/directory tree.
//!
//! Nodes live in an arena keyed by id; the tree shape is expressed only by
//! each node's `parent_id` plus the `node_children` index
//! (`parent_id | name → child_id`). The index key makes sibling names unique
//! and keeps children ordered by name.
//!
//! Every mutation reads, checks and writes inside one redb write transaction.
//! Write transactions are serialized by the engine, so the cycle and sibling
//! checks always run against the latest committed tree and two racing moves
//! can never both pass a check the other invalidates.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::tags;
use crate::storage::audit::{AuditEvent, AuditEventType};
use crate::storage::database::{commit, Deadline, Store, NODES, NODE_CHILDREN};
use crate::storage::keys::{child_key, id_range};
use crate::storage::{ConflictError, StoreError, StoreResult};

/// Longest accepted node name, in bytes.
pub const MAX_NAME_BYTES: usize = 255;

/// Upper bound on any ancestor walk. Reaching it means the stored parent
/// chain is corrupt (a cycle slipped in) rather than merely deep.
pub const MAX_ANCESTOR_WALK: usize = 1 << 16;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Directory,
}

/// Node record stored in the `nodes` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct StoredNode {
    pub id: Uuid,
    /// `None` only for the root directory.
    pub parent_id: Option<Uuid>,
    pub kind: NodeKind,
    pub name: String,
    /// Profile that created the node; `None` for the root.
    pub owner_profile_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StoredNode {
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

pub fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::Validation("node name must not be empty".to_string()));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(StoreError::Validation(format!(
            "node name must be at most {MAX_NAME_BYTES} bytes"
        )));
    }
    if name == "." || name == ".." {
        return Err(StoreError::Validation(format!("'{name}' is a reserved name")));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(StoreError::Validation(
            "node name must not contain '/' or NUL".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Transaction-level helpers
// =============================================================================

fn encode(node: &StoredNode) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(node)?)
}

pub(super) fn load_node<T>(nodes: &T, id: Uuid) -> StoreResult<Option<StoredNode>>
where
    T: ReadableTable<u128, &'static [u8]>,
{
    let stored = nodes.get(id.as_u128())?;
    match stored {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn require_node<T>(nodes: &T, id: Uuid) -> StoreResult<StoredNode>
where
    T: ReadableTable<u128, &'static [u8]>,
{
    load_node(nodes, id)?.ok_or_else(|| StoreError::NotFound(format!("Node {id}")))
}

/// Child ids of `parent`, ordered by name.
fn child_ids<T>(children: &T, parent: Uuid) -> StoreResult<Vec<Uuid>>
where
    T: ReadableTable<&'static [u8], u128>,
{
    let (start, end) = id_range(parent);
    let mut ids = Vec::new();
    for entry in children.range(start.as_slice()..end.as_slice())? {
        let (_, child) = entry?;
        ids.push(Uuid::from_u128(child.value()));
    }
    Ok(ids)
}

/// Fail with `WouldCreateCycle` if `node_id` is `start` or any ancestor of it.
fn ensure_not_ancestor<T>(nodes: &T, node_id: Uuid, start: &StoredNode) -> StoreResult<()>
where
    T: ReadableTable<u128, &'static [u8]>,
{
    if start.id == node_id {
        return Err(ConflictError::WouldCreateCycle.into());
    }
    let mut cursor = start.parent_id;
    let mut steps = 0;
    while let Some(current) = cursor {
        if current == node_id {
            return Err(ConflictError::WouldCreateCycle.into());
        }
        steps += 1;
        if steps > MAX_ANCESTOR_WALK {
            return Err(StoreError::Integrity(format!(
                "ancestor chain of {} exceeds {MAX_ANCESTOR_WALK} steps",
                start.id
            )));
        }
        cursor = load_node(nodes, current)?
            .ok_or_else(|| StoreError::Integrity(format!("dangling parent reference {current}")))?
            .parent_id;
    }
    Ok(())
}

/// `root` followed by all of its descendants, parents before children.
fn collect_subtree<T>(children: &T, root: Uuid) -> StoreResult<Vec<Uuid>>
where
    T: ReadableTable<&'static [u8], u128>,
{
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        order.push(id);
        stack.extend(child_ids(children, id)?);
    }
    Ok(order)
}

/// Create the root directory. Called once when the database is first opened.
pub(crate) fn insert_root(txn: &WriteTransaction) -> StoreResult<Uuid> {
    let root = StoredNode {
        id: Uuid::new_v4(),
        parent_id: None,
        kind: NodeKind::Directory,
        name: String::new(),
        owner_profile_id: None,
        created_at: Utc::now(),
    };
    let mut nodes = txn.open_table(NODES)?;
    nodes.insert(root.id.as_u128(), encode(&root)?.as_slice())?;
    Ok(root.id)
}

// =============================================================================
// NodeStore
// =============================================================================

/// Repository for tree operations.
pub struct NodeStore<'a> {
    store: &'a Store,
    #[cfg(test)]
    fail_after_deletions: Option<usize>,
    #[cfg(test)]
    stall_per_deletion: Option<std::time::Duration>,
}

impl<'a> NodeStore<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            #[cfg(test)]
            fail_after_deletions: None,
            #[cfg(test)]
            stall_per_deletion: None,
        }
    }

    /// Make cascade deletion fail after `count` nodes have been removed.
    #[cfg(test)]
    pub(crate) fn failing_after(mut self, count: usize) -> Self {
        self.fail_after_deletions = Some(count);
        self
    }

    /// Sleep after each node removed by a delete, before commit.
    #[cfg(test)]
    pub(crate) fn stalling(mut self, per_deletion: std::time::Duration) -> Self {
        self.stall_per_deletion = Some(per_deletion);
        self
    }

    #[cfg(test)]
    fn check_injected_failure(&self, removed: usize) -> StoreResult<()> {
        if let Some(stall) = self.stall_per_deletion {
            std::thread::sleep(stall);
        }
        if self.fail_after_deletions == Some(removed) {
            return Err(StoreError::Integrity(format!(
                "injected failure after {removed} deletions"
            )));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_injected_failure(&self, _removed: usize) -> StoreResult<()> {
        Ok(())
    }

    fn ensure_not_root(&self, node_id: Uuid, action: &str) -> StoreResult<()> {
        if node_id == self.store.root_id() {
            return Err(StoreError::Validation(format!("the root node cannot be {action}")));
        }
        Ok(())
    }

    /// Create a node under `parent_id`.
    pub fn create(
        &self,
        parent_id: Uuid,
        kind: NodeKind,
        name: &str,
        owner: Option<Uuid>,
        deadline: &Deadline,
    ) -> StoreResult<StoredNode> {
        validate_name(name)?;

        let node = StoredNode {
            id: Uuid::new_v4(),
            parent_id: Some(parent_id),
            kind,
            name: name.to_string(),
            owner_profile_id: owner,
            created_at: Utc::now(),
        };

        let write_txn = self.store.write(deadline)?;
        {
            let mut nodes = write_txn.open_table(NODES)?;
            let mut children = write_txn.open_table(NODE_CHILDREN)?;

            let parent =
                load_node(&nodes, parent_id)?.ok_or(StoreError::ParentNotFound(parent_id))?;
            if !parent.is_directory() {
                return Err(ConflictError::ParentIsFile.into());
            }

            let key = child_key(parent_id, name);
            if children.get(key.as_slice())?.is_some() {
                return Err(ConflictError::DuplicateSibling {
                    name: name.to_string(),
                }
                .into());
            }

            children.insert(key.as_slice(), node.id.as_u128())?;
            nodes.insert(node.id.as_u128(), encode(&node)?.as_slice())?;
        }
        AuditEvent::new(AuditEventType::NodeCreated)
            .with_profile(owner)
            .with_resource("node", node.id.to_string())
            .with_details(json!({ "parent_id": parent_id, "name": name, "kind": kind }))
            .record(&write_txn)?;
        commit(write_txn, deadline)?;

        tracing::info!(node_id = %node.id, %parent_id, ?kind, "Created node");
        Ok(node)
    }

    /// Re-parent `node_id` under `new_parent_id`, keeping its name.
    ///
    /// The ancestor walk starts at the new parent and is evaluated inside the
    /// write transaction, before anything is written.
    pub fn move_to(
        &self,
        node_id: Uuid,
        new_parent_id: Uuid,
        actor: Option<Uuid>,
        deadline: &Deadline,
    ) -> StoreResult<StoredNode> {
        self.ensure_not_root(node_id, "moved")?;

        let write_txn = self.store.write(deadline)?;
        let (node, old_parent) = {
            let mut nodes = write_txn.open_table(NODES)?;
            let mut children = write_txn.open_table(NODE_CHILDREN)?;

            let mut node = require_node(&nodes, node_id)?;
            let new_parent = load_node(&nodes, new_parent_id)?
                .ok_or(StoreError::ParentNotFound(new_parent_id))?;
            ensure_not_ancestor(&nodes, node_id, &new_parent)?;
            if !new_parent.is_directory() {
                return Err(ConflictError::ParentIsFile.into());
            }

            let old_parent = node.parent_id.ok_or_else(|| {
                StoreError::Integrity(format!("non-root node {node_id} has no parent"))
            })?;
            if old_parent == new_parent_id {
                (node, None)
            } else {
                let target = child_key(new_parent_id, &node.name);
                if children.get(target.as_slice())?.is_some() {
                    return Err(ConflictError::DuplicateSibling { name: node.name }.into());
                }
                children.remove(child_key(old_parent, &node.name).as_slice())?;
                children.insert(target.as_slice(), node_id.as_u128())?;

                node.parent_id = Some(new_parent_id);
                nodes.insert(node_id.as_u128(), encode(&node)?.as_slice())?;
                (node, Some(old_parent))
            }
        };

        let Some(old_parent) = old_parent else {
            write_txn.abort()?;
            return Ok(node);
        };
        AuditEvent::new(AuditEventType::NodeMoved)
            .with_profile(actor)
            .with_resource("node", node_id.to_string())
            .with_details(json!({ "from": old_parent, "to": new_parent_id }))
            .record(&write_txn)?;
        commit(write_txn, deadline)?;

        tracing::info!(%node_id, from = %old_parent, to = %new_parent_id, "Moved node");
        Ok(node)
    }

    /// Give `node_id` a new name under its current parent.
    pub fn rename(
        &self,
        node_id: Uuid,
        new_name: &str,
        actor: Option<Uuid>,
        deadline: &Deadline,
    ) -> StoreResult<StoredNode> {
        self.ensure_not_root(node_id, "renamed")?;
        validate_name(new_name)?;

        let write_txn = self.store.write(deadline)?;
        let (node, old_name) = {
            let mut nodes = write_txn.open_table(NODES)?;
            let mut children = write_txn.open_table(NODE_CHILDREN)?;

            let mut node = require_node(&nodes, node_id)?;
            let parent = node.parent_id.ok_or_else(|| {
                StoreError::Integrity(format!("non-root node {node_id} has no parent"))
            })?;
            if node.name == new_name {
                (node, None)
            } else {
                let target = child_key(parent, new_name);
                if children.get(target.as_slice())?.is_some() {
                    return Err(ConflictError::DuplicateSibling {
                        name: new_name.to_string(),
                    }
                    .into());
                }
                children.remove(child_key(parent, &node.name).as_slice())?;
                children.insert(target.as_slice(), node_id.as_u128())?;

                let old_name = std::mem::replace(&mut node.name, new_name.to_string());
                nodes.insert(node_id.as_u128(), encode(&node)?.as_slice())?;
                (node, Some(old_name))
            }
        };

        let Some(old_name) = old_name else {
            write_txn.abort()?;
            return Ok(node);
        };
        AuditEvent::new(AuditEventType::NodeRenamed)
            .with_profile(actor)
            .with_resource("node", node_id.to_string())
            .with_details(json!({ "from": old_name, "to": new_name }))
            .record(&write_txn)?;
        commit(write_txn, deadline)?;

        tracing::info!(%node_id, "Renamed node");
        Ok(node)
    }

    /// Delete a node. A non-empty directory requires `cascade`, in which case
    /// the whole subtree and all of its tag memberships are removed in the
    /// same transaction. Returns the number of nodes removed.
    pub fn delete(
        &self,
        node_id: Uuid,
        cascade: bool,
        actor: Option<Uuid>,
        deadline: &Deadline,
    ) -> StoreResult<usize> {
        self.ensure_not_root(node_id, "deleted")?;

        let write_txn = self.store.write(deadline)?;
        let removed = {
            let mut nodes = write_txn.open_table(NODES)?;
            let mut children = write_txn.open_table(NODE_CHILDREN)?;

            require_node(&nodes, node_id)?;
            let subtree = collect_subtree(&children, node_id)?;
            if subtree.len() > 1 && !cascade {
                return Err(ConflictError::DirectoryNotEmpty.into());
            }

            // Leaves first
            let mut removed = 0;
            for id in subtree.iter().rev() {
                let victim = require_node(&nodes, *id)?;
                if let Some(parent) = victim.parent_id {
                    children.remove(child_key(parent, &victim.name).as_slice())?;
                }
                nodes.remove(id.as_u128())?;
                tags::purge_node(&write_txn, *id)?;
                removed += 1;
                self.check_injected_failure(removed)?;
            }
            removed
        };
        AuditEvent::new(AuditEventType::NodeDeleted)
            .with_profile(actor)
            .with_resource("node", node_id.to_string())
            .with_details(json!({ "cascade": cascade, "removed": removed }))
            .record(&write_txn)?;
        commit(write_txn, deadline)?;

        tracing::info!(%node_id, removed, cascade, "Deleted node");
        Ok(removed)
    }

    /// Look up a node by id.
    pub fn lookup(&self, node_id: Uuid, deadline: &Deadline) -> StoreResult<StoredNode> {
        let read_txn = self.store.read(deadline)?;
        let nodes = read_txn.open_table(NODES)?;
        require_node(&nodes, node_id)
    }

    /// Children of `node_id`, ordered by name. Files have none.
    pub fn list_children(&self, node_id: Uuid, deadline: &Deadline) -> StoreResult<Vec<StoredNode>> {
        let read_txn = self.store.read(deadline)?;
        let nodes = read_txn.open_table(NODES)?;
        let children = read_txn.open_table(NODE_CHILDREN)?;

        require_node(&nodes, node_id)?;
        child_ids(&children, node_id)?
            .into_iter()
            .map(|id| {
                load_node(&nodes, id)?.ok_or_else(|| {
                    StoreError::Integrity(format!("child index points at missing node {id}"))
                })
            })
            .collect()
    }

    /// Absolute path of a node, `/` for the root.
    pub fn path_of(&self, node_id: Uuid, deadline: &Deadline) -> StoreResult<String> {
        let read_txn = self.store.read(deadline)?;
        let nodes = read_txn.open_table(NODES)?;

        let mut segments = Vec::new();
        let mut current = require_node(&nodes, node_id)?;
        while let Some(parent) = current.parent_id {
            if segments.len() >= MAX_ANCESTOR_WALK {
                return Err(StoreError::Integrity(format!(
                    "ancestor chain of {node_id} exceeds {MAX_ANCESTOR_WALK} steps"
                )));
            }
            segments.push(std::mem::take(&mut current.name));
            current = load_node(&nodes, parent)?.ok_or_else(|| {
                StoreError::Integrity(format!("dangling parent reference {parent}"))
            })?;
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    /// Resolve an absolute `/a/b/c` path to its node.
    pub fn resolve_path(&self, path: &str, deadline: &Deadline) -> StoreResult<StoredNode> {
        if !path.starts_with('/') {
            return Err(StoreError::Validation("path must be absolute".to_string()));
        }

        let read_txn = self.store.read(deadline)?;
        let nodes = read_txn.open_table(NODES)?;
        let children = read_txn.open_table(NODE_CHILDREN)?;

        let mut current = self.store.root_id();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let next = children
                .get(child_key(current, segment).as_slice())?
                .map(|v| Uuid::from_u128(v.value()));
            current = next.ok_or_else(|| StoreError::NotFound(format!("Path {path}")))?;
        }
        require_node(&nodes, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;
    use crate::storage::repository::tags::TagIndex;
    use std::sync::{Arc, Barrier};

    fn dir(store: &Store, parent: Uuid, name: &str) -> StoredNode {
        NodeStore::new(store)
            .create(parent, NodeKind::Directory, name, None, &Deadline::none())
            .unwrap()
    }

    fn file(store: &Store, parent: Uuid, name: &str) -> StoredNode {
        NodeStore::new(store)
            .create(parent, NodeKind::File, name, None, &Deadline::none())
            .unwrap()
    }

    fn names(nodes: &[StoredNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Walk every node up to the root; panics on a cycle.
    fn assert_rooted(store: &Store) {
        let read_txn = store.read(&Deadline::none()).unwrap();
        let nodes = read_txn.open_table(NODES).unwrap();
        for entry in nodes.iter().unwrap() {
            let (_, value) = entry.unwrap();
            let node: StoredNode = serde_json::from_slice(value.value()).unwrap();
            let mut cursor = node.parent_id;
            let mut steps = 0;
            while let Some(id) = cursor {
                steps += 1;
                assert!(steps < 1_000, "cycle through {}", node.id);
                cursor = load_node(&nodes, id).unwrap().unwrap().parent_id;
            }
        }
    }

    #[test]
    fn create_and_list_children_ordered_by_name() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        dir(&store, root, "zeta");
        file(&store, root, "alpha.txt");
        dir(&store, root, "mid");

        let listed = NodeStore::new(&store)
            .list_children(root, &Deadline::none())
            .unwrap();
        assert_eq!(names(&listed), vec!["alpha.txt", "mid", "zeta"]);
    }

    #[test]
    fn duplicate_sibling_is_rejected() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        dir(&store, root, "docs");

        let result = NodeStore::new(&store).create(
            root,
            NodeKind::File,
            "docs",
            None,
            &Deadline::none(),
        );
        assert!(matches!(
            result,
            Err(StoreError::Conflict(ConflictError::DuplicateSibling { .. }))
        ));
    }

    #[test]
    fn same_name_under_different_parents_is_allowed() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        let b = dir(&store, root, "b");
        file(&store, a.id, "readme");
        file(&store, b.id, "readme");
    }

    #[test]
    fn files_cannot_have_children() {
        let (store, _dir) = temp_store();
        let f = file(&store, store.root_id(), "notes.txt");

        let result =
            NodeStore::new(&store).create(f.id, NodeKind::File, "inner", None, &Deadline::none());
        assert!(matches!(
            result,
            Err(StoreError::Conflict(ConflictError::ParentIsFile))
        ));
    }

    #[test]
    fn unknown_parent_is_reported() {
        let (store, _dir) = temp_store();
        let missing = Uuid::new_v4();
        let result = NodeStore::new(&store).create(
            missing,
            NodeKind::Directory,
            "x",
            None,
            &Deadline::none(),
        );
        assert!(matches!(result, Err(StoreError::ParentNotFound(id)) if id == missing));
    }

    #[test]
    fn invalid_names_are_rejected() {
        for name in ["", ".", "..", "a/b", "nul\0byte"] {
            assert!(matches!(validate_name(name), Err(StoreError::Validation(_))), "{name:?}");
        }
        assert!(validate_name(&"x".repeat(MAX_NAME_BYTES + 1)).is_err());
        assert!(validate_name("ok name.txt").is_ok());
    }

    #[test]
    fn move_under_own_descendant_fails_and_leaves_tree_unchanged() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        let b = dir(&store, a.id, "b");
        let c = dir(&store, b.id, "c");
        let repo = NodeStore::new(&store);

        for target in [a.id, b.id, c.id] {
            let result = repo.move_to(a.id, target, None, &Deadline::none());
            assert!(matches!(
                result,
                Err(StoreError::Conflict(ConflictError::WouldCreateCycle))
            ));
        }

        assert_eq!(repo.lookup(a.id, &Deadline::none()).unwrap().parent_id, Some(root));
        assert_eq!(repo.path_of(c.id, &Deadline::none()).unwrap(), "/a/b/c");
        assert_rooted(&store);
    }

    #[test]
    fn move_relocates_subtree() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let src = dir(&store, root, "src");
        let dst = dir(&store, root, "dst");
        let leaf = file(&store, src.id, "leaf");
        let repo = NodeStore::new(&store);

        let moved = repo.move_to(src.id, dst.id, None, &Deadline::none()).unwrap();
        assert_eq!(moved.parent_id, Some(dst.id));
        assert_eq!(repo.path_of(leaf.id, &Deadline::none()).unwrap(), "/dst/src/leaf");
        assert_eq!(
            names(&repo.list_children(root, &Deadline::none()).unwrap()),
            vec!["dst"]
        );
    }

    #[test]
    fn move_into_colliding_name_fails() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        let b = dir(&store, root, "b");
        file(&store, a.id, "same");
        let loose = file(&store, b.id, "same");

        let result = NodeStore::new(&store).move_to(loose.id, a.id, None, &Deadline::none());
        assert!(matches!(
            result,
            Err(StoreError::Conflict(ConflictError::DuplicateSibling { .. }))
        ));
    }

    #[test]
    fn move_to_current_parent_is_a_no_op() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");

        let moved = NodeStore::new(&store)
            .move_to(a.id, root, None, &Deadline::none())
            .unwrap();
        assert_eq!(moved, a);
    }

    #[test]
    fn root_is_protected() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        let repo = NodeStore::new(&store);

        assert!(matches!(
            repo.move_to(root, a.id, None, &Deadline::none()),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            repo.rename(root, "x", None, &Deadline::none()),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            repo.delete(root, true, None, &Deadline::none()),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn rename_checks_siblings() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        dir(&store, root, "b");
        let repo = NodeStore::new(&store);

        assert!(matches!(
            repo.rename(a.id, "b", None, &Deadline::none()),
            Err(StoreError::Conflict(ConflictError::DuplicateSibling { .. }))
        ));

        let renamed = repo.rename(a.id, "c", None, &Deadline::none()).unwrap();
        assert_eq!(renamed.name, "c");
        assert_eq!(
            names(&repo.list_children(root, &Deadline::none()).unwrap()),
            vec!["b", "c"]
        );
        assert_eq!(repo.resolve_path("/c", &Deadline::none()).unwrap().id, a.id);
        assert!(matches!(
            repo.resolve_path("/a", &Deadline::none()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_non_empty_directory_requires_cascade() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        let f = file(&store, a.id, "f");
        TagIndex::new(&store)
            .attach(f.id, "keep", None, &Deadline::none())
            .unwrap();
        let repo = NodeStore::new(&store);

        let result = repo.delete(a.id, false, None, &Deadline::none());
        assert!(matches!(
            result,
            Err(StoreError::Conflict(ConflictError::DirectoryNotEmpty))
        ));
        assert!(repo.lookup(f.id, &Deadline::none()).is_ok());
        assert_eq!(
            TagIndex::new(&store)
                .tags_of(f.id, &Deadline::none())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn cascade_delete_removes_subtree_and_memberships() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        let b = dir(&store, a.id, "b");
        let f = file(&store, b.id, "f");
        let survivor = file(&store, root, "survivor");
        let tags = TagIndex::new(&store);
        tags.attach(f.id, "red", None, &Deadline::none()).unwrap();
        tags.attach(survivor.id, "red", None, &Deadline::none()).unwrap();
        let repo = NodeStore::new(&store);

        let removed = repo.delete(a.id, true, None, &Deadline::none()).unwrap();
        assert_eq!(removed, 3);
        for id in [a.id, b.id, f.id] {
            assert!(matches!(
                repo.lookup(id, &Deadline::none()),
                Err(StoreError::NotFound(_))
            ));
        }

        let red = tags
            .query_by_tags(&["red".to_string()], &Deadline::none())
            .unwrap();
        assert_eq!(red, vec![survivor]);
    }

    #[test]
    fn failed_cascade_rolls_back_completely() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        let b = dir(&store, a.id, "b");
        let f1 = file(&store, b.id, "f1");
        let f2 = file(&store, b.id, "f2");
        let tags = TagIndex::new(&store);
        tags.attach(f1.id, "blue", None, &Deadline::none()).unwrap();
        tags.attach(f2.id, "blue", None, &Deadline::none()).unwrap();

        let result = NodeStore::new(&store)
            .failing_after(2)
            .delete(a.id, true, None, &Deadline::none());
        assert!(matches!(result, Err(StoreError::Integrity(_))));

        let repo = NodeStore::new(&store);
        for node in [&a, &b, &f1, &f2] {
            assert_eq!(&repo.lookup(node.id, &Deadline::none()).unwrap(), node);
        }
        assert_eq!(
            names(&repo.list_children(b.id, &Deadline::none()).unwrap()),
            vec!["f1", "f2"]
        );
        let blue = tags
            .query_by_tags(&["blue".to_string()], &Deadline::none())
            .unwrap();
        assert_eq!(blue.len(), 2);
    }

    #[test]
    fn expired_deadline_applies_nothing() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let expired = Deadline::at(std::time::Instant::now());

        let result =
            NodeStore::new(&store).create(root, NodeKind::File, "late", None, &expired);
        assert!(matches!(result, Err(StoreError::DeadlineExceeded)));
        assert!(NodeStore::new(&store)
            .list_children(root, &Deadline::none())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn deadline_passing_mid_cascade_rolls_back_at_commit() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        let b = dir(&store, a.id, "b");
        let f1 = file(&store, b.id, "f1");
        let tags = TagIndex::new(&store);
        tags.attach(f1.id, "green", None, &Deadline::none()).unwrap();

        // Valid when the transaction begins, expired by the time it commits
        let deadline = Deadline::after(Some(std::time::Duration::from_millis(200)));
        let result = NodeStore::new(&store)
            .stalling(std::time::Duration::from_millis(100))
            .delete(a.id, true, None, &deadline);
        assert!(matches!(result, Err(StoreError::DeadlineExceeded)));

        let repo = NodeStore::new(&store);
        for node in [&a, &b, &f1] {
            assert_eq!(&repo.lookup(node.id, &Deadline::none()).unwrap(), node);
        }
        assert_eq!(
            repo.path_of(f1.id, &Deadline::none()).unwrap(),
            "/a/b/f1"
        );
        let green = tags
            .query_by_tags(&["green".to_string()], &Deadline::none())
            .unwrap();
        assert_eq!(green.len(), 1);
        assert_rooted(&store);
    }

    #[test]
    fn racing_crossed_moves_never_form_a_cycle() {
        for _ in 0..16 {
            let (store, _dir) = temp_store();
            let store = Arc::new(store);
            let root = store.root_id();
            let a = dir(&store, root, "a");
            let b = dir(&store, root, "b");

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = [(a.id, b.id), (b.id, a.id)]
                .into_iter()
                .map(|(node, target)| {
                    let store = Arc::clone(&store);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        NodeStore::new(&store).move_to(node, target, None, &Deadline::none())
                    })
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            let successes = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(successes, 1);
            assert!(results.iter().any(|r| matches!(
                r,
                Err(StoreError::Conflict(ConflictError::WouldCreateCycle))
            )));
            assert_rooted(&store);
        }
    }

    #[test]
    fn resolve_path_walks_from_root() {
        let (store, _dir) = temp_store();
        let root = store.root_id();
        let a = dir(&store, root, "a");
        let f = file(&store, a.id, "f.txt");
        let repo = NodeStore::new(&store);

        assert_eq!(repo.resolve_path("/", &Deadline::none()).unwrap().id, root);
        assert_eq!(repo.resolve_path("/a/f.txt", &Deadline::none()).unwrap(), f);
        assert_eq!(repo.resolve_path("/a/", &Deadline::none()).unwrap(), a);
        assert!(matches!(
            repo.resolve_path("a", &Deadline::none()),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(repo.path_of(root, &Deadline::none()).unwrap(), "/");
    }
}
