// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tag repository: tags and the many-to-many node membership index.
//!
//! Memberships are stored twice, as `node_tags` (`node | tag`) and
//! `tag_nodes` (`tag | node`), so both "tags of a node" and "nodes with a
//! tag" are single range scans. Both rows are always written and removed in
//! the same transaction.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;
use uuid::Uuid;

use super::nodes::{load_node, StoredNode};
use crate::storage::audit::{AuditEvent, AuditEventType};
use crate::storage::database::{
    commit, Deadline, Store, NODES, NODE_TAGS, TAGS, TAG_NAMES, TAG_NODES,
};
use crate::storage::keys::{id_range, pair_key, pair_second};
use crate::storage::{ConflictError, StoreError, StoreResult};

/// Longest accepted tag name, in characters after normalization.
pub const MAX_TAG_CHARS: usize = 128;

/// Tag record stored in the `tags` table, keyed by normalized name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct StoredTag {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A tag together with how many nodes currently carry it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TagUsage {
    pub name: String,
    pub node_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Canonical form of a tag name: trimmed, NFKC-normalized and lowercased.
///
/// `Photos`, ` photos ` and the full-width `ｐｈｏｔｏｓ` all name the same tag.
pub fn normalize_tag_name(raw: &str) -> StoreResult<String> {
    let name: String = raw.trim().nfkc().collect::<String>().to_lowercase();
    if name.is_empty() {
        return Err(StoreError::Validation("tag name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_TAG_CHARS {
        return Err(StoreError::Validation(format!(
            "tag name must be at most {MAX_TAG_CHARS} characters"
        )));
    }
    if name.contains(',') {
        return Err(StoreError::Validation("tag name must not contain ','".to_string()));
    }
    Ok(name)
}

fn load_tag<T>(tags: &T, name: &str) -> StoreResult<Option<StoredTag>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let stored = tags.get(name)?;
    match stored {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Second ids of every pair key starting with `first`.
fn pair_members<T>(pairs: &T, first: Uuid) -> StoreResult<Vec<Uuid>>
where
    T: ReadableTable<&'static [u8], ()>,
{
    let (start, end) = id_range(first);
    let mut members = Vec::new();
    for entry in pairs.range(start.as_slice()..end.as_slice())? {
        let (key, _) = entry?;
        let second = pair_second(key.value())
            .ok_or_else(|| StoreError::Integrity("malformed membership key".to_string()))?;
        members.push(second);
    }
    Ok(members)
}

fn ensure_node_exists<T>(nodes: &T, node_id: Uuid) -> StoreResult<()>
where
    T: ReadableTable<u128, &'static [u8]>,
{
    if nodes.get(node_id.as_u128())?.is_none() {
        return Err(StoreError::NotFound(format!("Node {node_id}")));
    }
    Ok(())
}

/// Remove every tag membership of `node_id` inside an open write transaction.
///
/// Used by node deletion so a cascade drops memberships in the same unit of
/// work as the nodes themselves. Tags left without members are kept.
pub(crate) fn purge_node(txn: &WriteTransaction, node_id: Uuid) -> StoreResult<usize> {
    let mut node_tags = txn.open_table(NODE_TAGS)?;
    let mut tag_nodes = txn.open_table(TAG_NODES)?;

    let tag_ids = pair_members(&node_tags, node_id)?;
    for tag_id in &tag_ids {
        node_tags.remove(pair_key(node_id, *tag_id).as_slice())?;
        tag_nodes.remove(pair_key(*tag_id, node_id).as_slice())?;
    }
    Ok(tag_ids.len())
}

/// Repository for tag operations.
pub struct TagIndex<'a> {
    store: &'a Store,
}

impl<'a> TagIndex<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Attach a tag to a node, creating the tag on first use. Attaching an
    /// already attached tag changes nothing.
    pub fn attach(
        &self,
        node_id: Uuid,
        tag_name: &str,
        actor: Option<Uuid>,
        deadline: &Deadline,
    ) -> StoreResult<StoredTag> {
        let name = normalize_tag_name(tag_name)?;

        let write_txn = self.store.write(deadline)?;
        let (tag, attached) = {
            let nodes = write_txn.open_table(NODES)?;
            ensure_node_exists(&nodes, node_id)?;

            let mut tags = write_txn.open_table(TAGS)?;
            let tag = match load_tag(&tags, &name)? {
                Some(tag) => tag,
                None => {
                    let tag = StoredTag {
                        id: Uuid::new_v4(),
                        name: name.clone(),
                        created_at: Utc::now(),
                    };
                    tags.insert(name.as_str(), serde_json::to_vec(&tag)?.as_slice())?;
                    let mut tag_names = write_txn.open_table(TAG_NAMES)?;
                    tag_names.insert(tag.id.as_u128(), name.as_str())?;
                    tag
                }
            };

            let mut node_tags = write_txn.open_table(NODE_TAGS)?;
            let forward = pair_key(node_id, tag.id);
            let attached = node_tags.get(forward.as_slice())?.is_none();
            if attached {
                node_tags.insert(forward.as_slice(), ())?;
                let mut tag_nodes = write_txn.open_table(TAG_NODES)?;
                tag_nodes.insert(pair_key(tag.id, node_id).as_slice(), ())?;
            }
            (tag, attached)
        };

        if !attached {
            write_txn.abort()?;
            return Ok(tag);
        }
        AuditEvent::new(AuditEventType::TagAttached)
            .with_profile(actor)
            .with_resource("node", node_id.to_string())
            .with_details(json!({ "tag": tag.name }))
            .record(&write_txn)?;
        commit(write_txn, deadline)?;

        tracing::debug!(%node_id, tag = %tag.name, "Attached tag");
        Ok(tag)
    }

    /// Detach a tag from a node. Returns whether a membership was removed;
    /// detaching an unknown tag or an unattached pair is not an error.
    pub fn detach(
        &self,
        node_id: Uuid,
        tag_name: &str,
        actor: Option<Uuid>,
        deadline: &Deadline,
    ) -> StoreResult<bool> {
        let name = normalize_tag_name(tag_name)?;

        let write_txn = self.store.write(deadline)?;
        let removed = {
            let nodes = write_txn.open_table(NODES)?;
            ensure_node_exists(&nodes, node_id)?;

            let tags = write_txn.open_table(TAGS)?;
            match load_tag(&tags, &name)? {
                Some(tag) => {
                    let mut node_tags = write_txn.open_table(NODE_TAGS)?;
                    let removed = node_tags
                        .remove(pair_key(node_id, tag.id).as_slice())?
                        .is_some();
                    let mut tag_nodes = write_txn.open_table(TAG_NODES)?;
                    tag_nodes.remove(pair_key(tag.id, node_id).as_slice())?;
                    removed
                }
                None => false,
            }
        };

        if !removed {
            write_txn.abort()?;
            return Ok(false);
        }
        AuditEvent::new(AuditEventType::TagDetached)
            .with_profile(actor)
            .with_resource("node", node_id.to_string())
            .with_details(json!({ "tag": name }))
            .record(&write_txn)?;
        commit(write_txn, deadline)?;

        tracing::debug!(%node_id, tag = %name, "Detached tag");
        Ok(true)
    }

    /// Nodes carrying every one of `tag_names`, ordered by id.
    ///
    /// An empty name list is rejected; a name that no tag has yields no
    /// nodes, since no node can carry it.
    pub fn query_by_tags(
        &self,
        tag_names: &[String],
        deadline: &Deadline,
    ) -> StoreResult<Vec<StoredNode>> {
        if tag_names.is_empty() {
            return Err(StoreError::Validation(
                "at least one tag name is required".to_string(),
            ));
        }
        let names = tag_names
            .iter()
            .map(|raw| normalize_tag_name(raw))
            .collect::<StoreResult<BTreeSet<_>>>()?;

        let read_txn = self.store.read(deadline)?;
        let tags = read_txn.open_table(TAGS)?;
        let tag_nodes = read_txn.open_table(TAG_NODES)?;

        let mut member_sets = Vec::with_capacity(names.len());
        for name in &names {
            let Some(tag) = load_tag(&tags, name)? else {
                return Ok(Vec::new());
            };
            member_sets.push(
                pair_members(&tag_nodes, tag.id)?
                    .into_iter()
                    .collect::<BTreeSet<_>>(),
            );
        }

        // Intersect starting from the smallest set
        member_sets.sort_by_key(|set| set.len());
        let mut sets = member_sets.into_iter();
        let mut matching = sets.next().unwrap_or_default();
        for set in sets {
            matching.retain(|id| set.contains(id));
            if matching.is_empty() {
                break;
            }
        }

        let nodes = read_txn.open_table(NODES)?;
        matching
            .into_iter()
            .map(|id| {
                load_node(&nodes, id)?.ok_or_else(|| {
                    StoreError::Integrity(format!("tag index points at missing node {id}"))
                })
            })
            .collect()
    }

    /// Names of the tags attached to `node_id`.
    pub fn tags_of(&self, node_id: Uuid, deadline: &Deadline) -> StoreResult<BTreeSet<String>> {
        let read_txn = self.store.read(deadline)?;
        let nodes = read_txn.open_table(NODES)?;
        ensure_node_exists(&nodes, node_id)?;

        let node_tags = read_txn.open_table(NODE_TAGS)?;
        let tag_names = read_txn.open_table(TAG_NAMES)?;
        let mut names = BTreeSet::new();
        for tag_id in pair_members(&node_tags, node_id)? {
            let name = tag_names
                .get(tag_id.as_u128())?
                .map(|v| v.value().to_string())
                .ok_or_else(|| {
                    StoreError::Integrity(format!("membership points at missing tag {tag_id}"))
                })?;
            names.insert(name);
        }
        Ok(names)
    }

    /// Every tag with its membership count, ordered by name.
    pub fn list_tags(&self, deadline: &Deadline) -> StoreResult<Vec<TagUsage>> {
        let read_txn = self.store.read(deadline)?;
        let tags = read_txn.open_table(TAGS)?;
        let tag_nodes = read_txn.open_table(TAG_NODES)?;

        let mut usage = Vec::new();
        for entry in tags.iter()? {
            let (_, value) = entry?;
            let tag: StoredTag = serde_json::from_slice(value.value())?;
            let node_count = pair_members(&tag_nodes, tag.id)?.len();
            usage.push(TagUsage {
                name: tag.name,
                node_count,
                created_at: tag.created_at,
            });
        }
        Ok(usage)
    }

    /// Delete a tag. A tag still attached to nodes is only deleted with
    /// `cascade`, which detaches it everywhere first. Returns the number of
    /// memberships removed.
    pub fn delete_tag(
        &self,
        tag_name: &str,
        cascade: bool,
        actor: Option<Uuid>,
        deadline: &Deadline,
    ) -> StoreResult<usize> {
        let name = normalize_tag_name(tag_name)?;

        let write_txn = self.store.write(deadline)?;
        let detached = {
            let mut tags = write_txn.open_table(TAGS)?;
            let tag = load_tag(&tags, &name)?
                .ok_or_else(|| StoreError::NotFound(format!("Tag {name}")))?;

            let mut tag_nodes = write_txn.open_table(TAG_NODES)?;
            let members = pair_members(&tag_nodes, tag.id)?;
            if !members.is_empty() && !cascade {
                return Err(ConflictError::TagInUse { tag: name }.into());
            }

            let mut node_tags = write_txn.open_table(NODE_TAGS)?;
            for node_id in &members {
                tag_nodes.remove(pair_key(tag.id, *node_id).as_slice())?;
                node_tags.remove(pair_key(*node_id, tag.id).as_slice())?;
            }
            let mut tag_names = write_txn.open_table(TAG_NAMES)?;
            tag_names.remove(tag.id.as_u128())?;
            tags.remove(name.as_str())?;
            members.len()
        };
        AuditEvent::new(AuditEventType::TagDeleted)
            .with_profile(actor)
            .with_resource("tag", name.clone())
            .with_details(json!({ "cascade": cascade, "detached": detached }))
            .record(&write_txn)?;
        commit(write_txn, deadline)?;

        tracing::info!(tag = %name, detached, "Deleted tag");
        Ok(detached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;
    use crate::storage::repository::nodes::{NodeKind, NodeStore};

    fn file(store: &Store, name: &str) -> StoredNode {
        NodeStore::new(store)
            .create(store.root_id(), NodeKind::File, name, None, &Deadline::none())
            .unwrap()
    }

    fn query(index: &TagIndex<'_>, names: &[&str]) -> Vec<Uuid> {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        index
            .query_by_tags(&names, &Deadline::none())
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect()
    }

    fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
        ids.sort();
        ids
    }

    #[test]
    fn query_uses_intersection_not_union() {
        let (store, _dir) = temp_store();
        let n1 = file(&store, "n1");
        let n2 = file(&store, "n2");
        let n3 = file(&store, "n3");
        let index = TagIndex::new(&store);
        for (node, tag) in [(&n1, "a"), (&n1, "b"), (&n2, "a"), (&n3, "b")] {
            index.attach(node.id, tag, None, &Deadline::none()).unwrap();
        }

        assert_eq!(query(&index, &["a", "b"]), vec![n1.id]);
        assert_eq!(query(&index, &["a"]), sorted(vec![n1.id, n2.id]));
        assert_eq!(query(&index, &["b"]), sorted(vec![n1.id, n3.id]));
    }

    #[test]
    fn attach_is_idempotent() {
        let (store, _dir) = temp_store();
        let n = file(&store, "n");
        let index = TagIndex::new(&store);

        let first = index.attach(n.id, "x", None, &Deadline::none()).unwrap();
        let second = index.attach(n.id, "x", None, &Deadline::none()).unwrap();
        assert_eq!(first, second);

        let usage = index.list_tags(&Deadline::none()).unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].node_count, 1);
    }

    #[test]
    fn detach_of_missing_association_is_a_no_op() {
        let (store, _dir) = temp_store();
        let n = file(&store, "n");
        let index = TagIndex::new(&store);

        assert!(!index.detach(n.id, "never-created", None, &Deadline::none()).unwrap());
        index.attach(n.id, "x", None, &Deadline::none()).unwrap();
        assert!(index.detach(n.id, "x", None, &Deadline::none()).unwrap());
        assert!(!index.detach(n.id, "x", None, &Deadline::none()).unwrap());
        assert!(index.tags_of(n.id, &Deadline::none()).unwrap().is_empty());
    }

    #[test]
    fn names_are_case_normalized() {
        let (store, _dir) = temp_store();
        let n = file(&store, "n");
        let index = TagIndex::new(&store);

        index.attach(n.id, "Photos", None, &Deadline::none()).unwrap();
        index.attach(n.id, "  PHOTOS ", None, &Deadline::none()).unwrap();

        let tags = index.tags_of(n.id, &Deadline::none()).unwrap();
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["photos".to_string()]);
        assert_eq!(query(&index, &["pHoToS"]), vec![n.id]);
    }

    #[test]
    fn normalization_rules() {
        assert_eq!(normalize_tag_name("ｐｈｏｔｏｓ").unwrap(), "photos");
        for bad in ["", "   ", "a,b"] {
            assert!(matches!(normalize_tag_name(bad), Err(StoreError::Validation(_))));
        }
        assert!(normalize_tag_name(&"t".repeat(MAX_TAG_CHARS + 1)).is_err());
    }

    #[test]
    fn unknown_node_is_not_found() {
        let (store, _dir) = temp_store();
        let index = TagIndex::new(&store);
        let ghost = Uuid::new_v4();

        assert!(matches!(
            index.attach(ghost, "x", None, &Deadline::none()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            index.tags_of(ghost, &Deadline::none()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn empty_query_is_rejected_and_unknown_tag_matches_nothing() {
        let (store, _dir) = temp_store();
        let n = file(&store, "n");
        let index = TagIndex::new(&store);
        index.attach(n.id, "a", None, &Deadline::none()).unwrap();

        assert!(matches!(
            index.query_by_tags(&[], &Deadline::none()),
            Err(StoreError::Validation(_))
        ));
        assert!(query(&index, &["a", "nope"]).is_empty());
    }

    #[test]
    fn delete_tag_requires_cascade_when_in_use() {
        let (store, _dir) = temp_store();
        let n1 = file(&store, "n1");
        let n2 = file(&store, "n2");
        let index = TagIndex::new(&store);
        index.attach(n1.id, "old", None, &Deadline::none()).unwrap();
        index.attach(n2.id, "old", None, &Deadline::none()).unwrap();

        assert!(matches!(
            index.delete_tag("old", false, None, &Deadline::none()),
            Err(StoreError::Conflict(ConflictError::TagInUse { .. }))
        ));
        assert_eq!(query(&index, &["old"]).len(), 2);

        let detached = index.delete_tag("OLD", true, None, &Deadline::none()).unwrap();
        assert_eq!(detached, 2);
        assert!(index.tags_of(n1.id, &Deadline::none()).unwrap().is_empty());
        assert!(index.list_tags(&Deadline::none()).unwrap().is_empty());
        assert!(matches!(
            index.delete_tag("old", true, None, &Deadline::none()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn unused_tag_can_be_deleted_without_cascade() {
        let (store, _dir) = temp_store();
        let n = file(&store, "n");
        let index = TagIndex::new(&store);
        index.attach(n.id, "temp", None, &Deadline::none()).unwrap();
        index.detach(n.id, "temp", None, &Deadline::none()).unwrap();

        assert_eq!(index.delete_tag("temp", false, None, &Deadline::none()).unwrap(), 0);
    }
}
