// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthorizationGate;
use crate::config::{Config, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::service::{AccountService, NodeService};
use crate::storage::{Store, SystemTokenSource, TokenSource};

/// Shared application state. Cloned per request; everything inside is
/// behind an `Arc`, and the store is the only shared mutable state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub token_source: Arc<dyn TokenSource>,
    pub token_ttl: Option<chrono::Duration>,
    pub request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(store),
            token_source: Arc::new(SystemTokenSource::new()),
            token_ttl: None,
            request_timeout: Some(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)),
        }
    }

    pub fn from_config(store: Store, config: &Config) -> Self {
        Self::new(store)
            .with_token_ttl(config.token_ttl)
            .with_request_timeout(config.request_timeout)
    }

    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = source;
        self
    }

    pub fn with_token_ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn gate(&self) -> AuthorizationGate {
        AuthorizationGate::new(
            Arc::clone(&self.store),
            Arc::clone(&self.token_source),
            self.request_timeout,
        )
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.token_source),
            self.token_ttl,
            self.request_timeout,
        )
    }

    pub fn nodes(&self) -> NodeService {
        NodeService::new(Arc::clone(&self.store), self.request_timeout)
    }
}
