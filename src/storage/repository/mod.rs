// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the metadata store.
//!
//! Each repository owns one group of tables and is the only code that
//! mutates them. Repositories borrow the [`Store`](super::Store) for the
//! duration of a call and are cheap to construct per request.

pub mod nodes;
pub mod profiles;
pub mod tags;
pub mod tokens;

pub use nodes::{NodeKind, NodeStore, StoredNode};
pub use profiles::{ProfileStore, StoredProfile};
pub use tags::{StoredTag, TagIndex, TagUsage};
pub use tokens::{IssuedToken, SystemTokenSource, TokenAuthority, TokenSource, ValidatedToken};
