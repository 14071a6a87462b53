// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service layer: composes the repositories into the operations the HTTP
//! boundary exposes.
//!
//! Services own an `Arc<Store>` and the per-request timeout. Each call moves
//! its repository work onto the blocking pool with a fresh [`Deadline`], so
//! handlers never block the async runtime on redb I/O or password hashing.

pub mod accounts;
pub mod nodes;

use std::sync::Arc;
use std::time::Duration;

use crate::storage::{Deadline, Store, StoreError, StoreResult};

pub use accounts::AccountService;
pub use nodes::{NodeDetail, NodeService};

/// Run blocking storage work with a deadline `timeout` from now.
pub(crate) async fn run_blocking<T, F>(
    store: &Arc<Store>,
    timeout: Option<Duration>,
    work: F,
) -> StoreResult<T>
where
    F: FnOnce(&Store, &Deadline) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    let deadline = Deadline::after(timeout);
    tokio::task::spawn_blocking(move || work(&store, &deadline))
        .await
        .map_err(|e| StoreError::Integrity(format!("storage task failed: {e}")))?
}
