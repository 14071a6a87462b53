// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Applied with `route_layer` to every protected route group:
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/node", post(nodes::create_node))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         require_bearer,
//!     ));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::Credential;
use crate::state::AppState;

/// Validate the bearer credential before the handler runs.
///
/// On success the [`AuthenticatedProfile`](super::AuthenticatedProfile) is
/// placed in the request extensions for the [`Auth`](super::Auth)
/// extractor. On failure the error response is returned and the inner
/// service is not called.
pub async fn require_bearer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let credential = match Credential::from_headers(request.headers()) {
        Ok(credential) => credential,
        Err(e) => return e.into_response(),
    };

    let admitted = state
        .gate()
        .admit(&credential, |profile| async move {
            request.extensions_mut().insert(profile);
            next.run(request).await
        })
        .await;

    match admitted {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
