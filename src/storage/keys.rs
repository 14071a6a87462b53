// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Composite key helpers for the index tables.
//!
//! Ids are encoded as their 16 big-endian bytes so that byte order equals id
//! order and every key sharing a leading id forms one contiguous range.

use uuid::Uuid;

/// Sentinel appended to a prefix to bound a range scan. UTF-8 never
/// contains 0xFF, and pair keys are a fixed 32 bytes, so any key starting
/// with the prefix sorts below `prefix | 0xFF...`.
const RANGE_END_PADDING: [u8; 17] = [0xFF; 17];

/// Build a `node_children` key: `parent_id | name`.
pub(crate) fn child_key(parent_id: Uuid, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + name.len());
    key.extend_from_slice(parent_id.as_bytes());
    key.extend_from_slice(name.as_bytes());
    key
}

/// Build a pair key `first | second` for the `node_tags`/`tag_nodes` tables.
pub(crate) fn pair_key(first: Uuid, second: Uuid) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(first.as_bytes());
    key[16..].copy_from_slice(second.as_bytes());
    key
}

/// Second id of a pair key.
pub(crate) fn pair_second(key: &[u8]) -> Option<Uuid> {
    if key.len() != 32 {
        return None;
    }
    Uuid::from_slice(&key[16..]).ok()
}

/// Inclusive start and exclusive end of the range holding every key that
/// begins with `id`.
pub(crate) fn id_range(id: Uuid) -> (Vec<u8>, Vec<u8>) {
    let start = id.as_bytes().to_vec();
    let mut end = start.clone();
    end.extend_from_slice(&RANGE_END_PADDING);
    (start, end)
}

/// Audit key: the big-endian recording sequence, oldest first.
pub(crate) fn audit_key(sequence: u64) -> [u8; 8] {
    sequence.to_be_bytes()
}
