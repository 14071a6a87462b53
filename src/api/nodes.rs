// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Node tree API endpoints.
//!
//! All routes require a bearer token. Tree invariants (no cycles, unique
//! sibling names, files are leaves) are enforced by the store and surface
//! here as 409 responses.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{ApiJson, ApiQuery};
use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        CreateNodeRequest, DeleteNodeResponse, DeleteParams, MoveNodeRequest, NodeListResponse,
        NodeResponse, PathParams, RenameNodeRequest,
    },
    service::NodeDetail,
    state::AppState,
};

fn detail_response(detail: NodeDetail) -> NodeResponse {
    NodeResponse::from(detail.node).with_path(detail.path)
}

/// Create a file or directory.
#[utoipa::path(
    post,
    path = "/v1/node",
    tag = "Nodes",
    security(("bearer_auth" = [])),
    request_body = CreateNodeRequest,
    responses(
        (status = 201, description = "Node created", body = NodeResponse),
        (status = 400, description = "Malformed body, invalid name or missing token"),
        (status = 401, description = "Invalid or expired token"),
        (status = 404, description = "Parent not found"),
        (status = 409, description = "Duplicate sibling name or parent is a file")
    )
)]
pub async fn create_node(
    Auth(profile): Auth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateNodeRequest>,
) -> Result<(StatusCode, Json<NodeResponse>), ApiError> {
    let nodes = state.nodes();
    let parent_id = request.parent_id.unwrap_or_else(|| nodes.root_id());
    let node = nodes
        .create_node(&profile, parent_id, request.kind, request.name)
        .await?;

    Ok((StatusCode::CREATED, Json(NodeResponse::from(node))))
}

/// Get a node by ID, with its absolute path.
#[utoipa::path(
    get,
    path = "/v1/node/{node_id}",
    tag = "Nodes",
    security(("bearer_auth" = [])),
    params(("node_id" = Uuid, Path, description = "Node ID")),
    responses(
        (status = 200, description = "Node", body = NodeResponse),
        (status = 404, description = "Node not found")
    )
)]
pub async fn get_node(
    Auth(profile): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<Uuid>,
) -> Result<Json<NodeResponse>, ApiError> {
    let detail = state.nodes().node(&profile, node_id).await?;
    Ok(Json(detail_response(detail)))
}

/// Resolve an absolute path such as `/docs/report.pdf`.
#[utoipa::path(
    get,
    path = "/v1/node",
    tag = "Nodes",
    security(("bearer_auth" = [])),
    params(PathParams),
    responses(
        (status = 200, description = "Node at the path", body = NodeResponse),
        (status = 400, description = "Path is not absolute"),
        (status = 404, description = "No node at the path")
    )
)]
pub async fn resolve_node(
    Auth(profile): Auth,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PathParams>,
) -> Result<Json<NodeResponse>, ApiError> {
    let detail = state.nodes().resolve_path(&profile, params.path).await?;
    Ok(Json(detail_response(detail)))
}

/// List the children of a node, ordered by name.
#[utoipa::path(
    get,
    path = "/v1/node/{node_id}/children",
    tag = "Nodes",
    security(("bearer_auth" = [])),
    params(("node_id" = Uuid, Path, description = "Node ID")),
    responses(
        (status = 200, description = "Children", body = NodeListResponse),
        (status = 404, description = "Node not found")
    )
)]
pub async fn list_children(
    Auth(profile): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<Uuid>,
) -> Result<Json<NodeListResponse>, ApiError> {
    let children = state.nodes().list_children(&profile, node_id).await?;
    Ok(Json(NodeListResponse::from(children)))
}

/// Move a node under a new parent directory.
#[utoipa::path(
    post,
    path = "/v1/node/{node_id}/move",
    tag = "Nodes",
    security(("bearer_auth" = [])),
    params(("node_id" = Uuid, Path, description = "Node ID")),
    request_body = MoveNodeRequest,
    responses(
        (status = 200, description = "Node moved", body = NodeResponse),
        (status = 400, description = "Root cannot be moved"),
        (status = 404, description = "Node or parent not found"),
        (status = 409, description = "Move would create a cycle or duplicate a sibling name")
    )
)]
pub async fn move_node(
    Auth(profile): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<Uuid>,
    ApiJson(request): ApiJson<MoveNodeRequest>,
) -> Result<Json<NodeResponse>, ApiError> {
    let node = state
        .nodes()
        .move_node(&profile, node_id, request.new_parent_id)
        .await?;
    Ok(Json(NodeResponse::from(node)))
}

/// Rename a node in place.
#[utoipa::path(
    post,
    path = "/v1/node/{node_id}/rename",
    tag = "Nodes",
    security(("bearer_auth" = [])),
    params(("node_id" = Uuid, Path, description = "Node ID")),
    request_body = RenameNodeRequest,
    responses(
        (status = 200, description = "Node renamed", body = NodeResponse),
        (status = 400, description = "Invalid name or root node"),
        (status = 404, description = "Node not found"),
        (status = 409, description = "A sibling already has the name")
    )
)]
pub async fn rename_node(
    Auth(profile): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<Uuid>,
    ApiJson(request): ApiJson<RenameNodeRequest>,
) -> Result<Json<NodeResponse>, ApiError> {
    let node = state
        .nodes()
        .rename_node(&profile, node_id, request.name)
        .await?;
    Ok(Json(NodeResponse::from(node)))
}

/// Delete a node. Non-empty directories need `cascade=true`.
#[utoipa::path(
    delete,
    path = "/v1/node/{node_id}",
    tag = "Nodes",
    security(("bearer_auth" = [])),
    params(("node_id" = Uuid, Path, description = "Node ID"), DeleteParams),
    responses(
        (status = 200, description = "Node deleted", body = DeleteNodeResponse),
        (status = 400, description = "Root cannot be deleted"),
        (status = 404, description = "Node not found"),
        (status = 409, description = "Directory is not empty")
    )
)]
pub async fn delete_node(
    Auth(profile): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<Uuid>,
    ApiQuery(params): ApiQuery<DeleteParams>,
) -> Result<Json<DeleteNodeResponse>, ApiError> {
    let removed = state
        .nodes()
        .delete_node(&profile, node_id, params.cascade)
        .await?;
    Ok(Json(DeleteNodeResponse { node_id, removed }))
}
