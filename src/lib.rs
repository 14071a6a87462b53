// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tagstore - access-controlled tagged-file metadata service
//!
//! A hierarchical tree of files and directories with a many-to-many tag
//! index, exposed over HTTP behind opaque bearer tokens.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Bearer credentials, authorization gate, password hashing
//! - `service` - Async operations over the blocking store
//! - `storage` - redb-backed profiles, tokens, nodes, tags and audit trail

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod state;
pub mod storage;
