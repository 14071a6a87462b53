// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail for state-changing operations.
//!
//! Events are written inside the same write transaction as the mutation they
//! describe, so the trail and the data can never disagree.
//!
//! Keys come from a counter in the `meta` table bumped by that same
//! transaction. Writers are serialized, so key order is commit order even
//! when several events share a millisecond.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::database::{Deadline, Store, AUDIT_EVENTS, AUDIT_SEQUENCE_KEY, META};
use super::keys::audit_key;
use super::{StoreError, StoreResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Profile events
    ProfileRegistered,

    // Token events
    TokenIssued,
    TokenRevoked,

    // Node events
    NodeCreated,
    NodeMoved,
    NodeRenamed,
    NodeDeleted,

    // Tag events
    TagAttached,
    TagDetached,
    TagDeleted,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Profile that triggered the event (if known).
    pub profile_id: Option<Uuid>,
    /// Resource affected (node id, tag name, ...).
    pub resource_id: Option<String>,
    /// Resource type (node, tag, token, profile).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            profile_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
        }
    }

    /// Set the acting profile.
    pub fn with_profile(mut self, profile_id: Option<Uuid>) -> Self {
        self.profile_id = profile_id;
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Append this event to the audit table of an open write transaction.
    pub(crate) fn record(&self, txn: &WriteTransaction) -> StoreResult<()> {
        let sequence = next_sequence(txn)?;
        let key = audit_key(sequence);
        let json = serde_json::to_vec(self)?;
        let mut table = txn.open_table(AUDIT_EVENTS)?;
        table.insert(key.as_slice(), json.as_slice())?;
        Ok(())
    }
}

fn next_sequence(txn: &WriteTransaction) -> StoreResult<u64> {
    let mut meta = txn.open_table(META)?;
    let current = match meta.get(AUDIT_SEQUENCE_KEY)? {
        Some(bytes) => {
            let raw: [u8; 8] = bytes.value().try_into().map_err(|_| {
                StoreError::Integrity("corrupt audit sequence counter".to_string())
            })?;
            u64::from_be_bytes(raw)
        }
        None => 0,
    };
    let next = current
        .checked_add(1)
        .ok_or_else(|| StoreError::Integrity("audit sequence exhausted".to_string()))?;
    meta.insert(AUDIT_SEQUENCE_KEY, next.to_be_bytes().as_slice())?;
    Ok(next)
}

/// Read access to the audit trail.
pub struct AuditLog<'a> {
    store: &'a Store,
}

impl<'a> AuditLog<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Most recent events triggered by `profile_id`, newest first.
    pub fn recent_for_profile(
        &self,
        profile_id: Uuid,
        limit: usize,
        deadline: &Deadline,
    ) -> StoreResult<Vec<AuditEvent>> {
        let read_txn = self.store.read(deadline)?;
        let table = read_txn.open_table(AUDIT_EVENTS)?;

        let mut events = Vec::new();
        for entry in table.iter()?.rev() {
            if events.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            let event: AuditEvent = serde_json::from_slice(value.value())?;
            if event.profile_id == Some(profile_id) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::{commit, temp_store};

    fn record(store: &Store, event: AuditEvent) {
        let txn = store.write(&Deadline::none()).unwrap();
        event.record(&txn).unwrap();
        commit(txn, &Deadline::none()).unwrap();
    }

    #[test]
    fn recent_events_are_newest_first_and_filtered() {
        let (store, _dir) = temp_store();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut first = AuditEvent::new(AuditEventType::NodeCreated).with_profile(Some(me));
        first.timestamp = Utc::now() - chrono::Duration::seconds(10);
        record(&store, first);
        record(
            &store,
            AuditEvent::new(AuditEventType::TagAttached).with_profile(Some(other)),
        );
        record(
            &store,
            AuditEvent::new(AuditEventType::NodeDeleted)
                .with_profile(Some(me))
                .with_resource("node", "n-1"),
        );

        let events = AuditLog::new(&store)
            .recent_for_profile(me, 10, &Deadline::none())
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::NodeDeleted);
        assert_eq!(events[0].resource_id.as_deref(), Some("n-1"));
        assert_eq!(events[1].event_type, AuditEventType::NodeCreated);
    }

    #[test]
    fn same_millisecond_events_keep_recording_order() {
        let (store, _dir) = temp_store();
        let me = Uuid::new_v4();
        let at = Utc::now();

        for round in 0..50 {
            let mut older = AuditEvent::new(AuditEventType::NodeCreated)
                .with_profile(Some(me))
                .with_resource("node", format!("older-{round}"));
            older.timestamp = at;
            let mut newer = AuditEvent::new(AuditEventType::NodeRenamed)
                .with_profile(Some(me))
                .with_resource("node", format!("newer-{round}"));
            newer.timestamp = at;
            record(&store, older);
            record(&store, newer);

            let events = AuditLog::new(&store)
                .recent_for_profile(me, 2, &Deadline::none())
                .unwrap();
            assert_eq!(events[0].event_type, AuditEventType::NodeRenamed);
            assert_eq!(events[1].event_type, AuditEventType::NodeCreated);
            assert_eq!(events[0].resource_id, Some(format!("newer-{round}")));
        }
    }

    #[test]
    fn events_in_one_transaction_keep_their_order() {
        let (store, _dir) = temp_store();
        let me = Uuid::new_v4();

        let txn = store.write(&Deadline::none()).unwrap();
        for name in ["first", "second", "third"] {
            AuditEvent::new(AuditEventType::TagAttached)
                .with_profile(Some(me))
                .with_resource("tag", name)
                .record(&txn)
                .unwrap();
        }
        commit(txn, &Deadline::none()).unwrap();

        let events = AuditLog::new(&store)
            .recent_for_profile(me, 10, &Deadline::none())
            .unwrap();
        let order: Vec<_> = events
            .iter()
            .map(|e| e.resource_id.as_deref().unwrap())
            .collect();
        assert_eq!(order, vec!["third", "second", "first"]);
    }

    #[test]
    fn limit_caps_results() {
        let (store, _dir) = temp_store();
        let me = Uuid::new_v4();
        for _ in 0..5 {
            record(
                &store,
                AuditEvent::new(AuditEventType::TokenIssued).with_profile(Some(me)),
            );
        }

        let events = AuditLog::new(&store)
            .recent_for_profile(me, 3, &Deadline::none())
            .unwrap();
        assert_eq!(events.len(), 3);
    }
}
