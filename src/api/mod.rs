// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{FromRequest, FromRequestParts},
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::middleware::require_bearer,
    error::ApiError,
    models::{
        AttachTagResponse, AuditListResponse, CreateNodeRequest, CredentialsRequest,
        DeleteNodeResponse, DeleteTagResponse, DetachTagResponse, LoginResponse,
        MessageResponse, MoveNodeRequest, NodeListResponse, NodeResponse, NodeTagsResponse,
        ProfileResponse, RegisterResponse, RenameNodeRequest, TagListResponse,
        TagMembershipRequest,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType, NodeKind, TagUsage},
};

pub mod audit;
pub mod auth;
pub mod health;
pub mod nodes;
pub mod tags;

/// JSON body extractor whose rejections are 400 [`ApiError`]s.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections are 400 [`ApiError`]s.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login).get(auth::login));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/node", get(nodes::resolve_node).post(nodes::create_node))
        .route(
            "/node/{node_id}",
            get(nodes::get_node).delete(nodes::delete_node),
        )
        .route("/node/{node_id}/children", get(nodes::list_children))
        .route("/node/{node_id}/move", post(nodes::move_node))
        .route("/node/{node_id}/rename", post(nodes::rename_node))
        .route("/node/{node_id}/tags", get(tags::node_tags))
        .route(
            "/tag",
            get(tags::query_tags)
                .post(tags::attach_tag)
                .delete(tags::detach_tag),
        )
        .route("/tags", get(tags::list_tags))
        .route("/tags/{name}", delete(tags::delete_tag))
        .route("/audit", get(audit::list_audit))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .nest("/v1", public_routes.merge(protected_routes))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        nodes::create_node,
        nodes::get_node,
        nodes::resolve_node,
        nodes::list_children,
        nodes::move_node,
        nodes::rename_node,
        nodes::delete_node,
        tags::attach_tag,
        tags::detach_tag,
        tags::query_tags,
        tags::node_tags,
        tags::list_tags,
        tags::delete_tag,
        audit::list_audit
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            CredentialsRequest,
            RegisterResponse,
            LoginResponse,
            ProfileResponse,
            MessageResponse,
            NodeKind,
            CreateNodeRequest,
            MoveNodeRequest,
            RenameNodeRequest,
            NodeResponse,
            NodeListResponse,
            DeleteNodeResponse,
            TagMembershipRequest,
            AttachTagResponse,
            DetachTagResponse,
            NodeTagsResponse,
            TagUsage,
            TagListResponse,
            DeleteTagResponse,
            AuditEvent,
            AuditEventType,
            AuditListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and store health"),
        (name = "Auth", description = "Registration, login and bearer tokens"),
        (name = "Nodes", description = "File and directory tree"),
        (name = "Tags", description = "Tagging and intersection queries"),
        (name = "Audit", description = "Audit trail of the caller's changes")
    )
)]
struct ApiDoc;
