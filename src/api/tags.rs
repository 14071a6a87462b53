// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tag API endpoints.
//!
//! Tag names are normalized (trimmed, NFKC, lowercased) by the store, so
//! `Photos` and `photos` are the same tag.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::{ApiJson, ApiQuery};
use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        AttachTagResponse, DeleteParams, DeleteTagResponse, DetachTagResponse, NodeListResponse,
        NodeTagsResponse, TagListResponse, TagMembershipRequest, TagQueryParams,
    },
    state::AppState,
    storage::repository::tags::normalize_tag_name,
};

/// Attach a tag to a node, creating the tag if needed.
#[utoipa::path(
    post,
    path = "/v1/tag",
    tag = "Tags",
    security(("bearer_auth" = [])),
    request_body = TagMembershipRequest,
    responses(
        (status = 200, description = "Tag attached (or already attached)", body = AttachTagResponse),
        (status = 400, description = "Invalid tag name or missing token"),
        (status = 404, description = "Node not found")
    )
)]
pub async fn attach_tag(
    Auth(profile): Auth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TagMembershipRequest>,
) -> Result<Json<AttachTagResponse>, ApiError> {
    let tag = state
        .nodes()
        .attach_tag(&profile, request.node_id, request.tag_name)
        .await?;
    Ok(Json(AttachTagResponse {
        node_id: request.node_id,
        tag: tag.name,
    }))
}

/// Detach a tag from a node. Detaching an absent tag is not an error.
#[utoipa::path(
    delete,
    path = "/v1/tag",
    tag = "Tags",
    security(("bearer_auth" = [])),
    request_body = TagMembershipRequest,
    responses(
        (status = 200, description = "Tag detached", body = DetachTagResponse),
        (status = 404, description = "Node not found")
    )
)]
pub async fn detach_tag(
    Auth(profile): Auth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TagMembershipRequest>,
) -> Result<Json<DetachTagResponse>, ApiError> {
    let removed = state
        .nodes()
        .detach_tag(&profile, request.node_id, request.tag_name)
        .await?;
    Ok(Json(DetachTagResponse {
        node_id: request.node_id,
        removed,
    }))
}

/// Find nodes carrying every listed tag.
#[utoipa::path(
    get,
    path = "/v1/tag",
    tag = "Tags",
    security(("bearer_auth" = [])),
    params(TagQueryParams),
    responses(
        (status = 200, description = "Nodes carrying all tags", body = NodeListResponse),
        (status = 400, description = "No tag names given")
    )
)]
pub async fn query_tags(
    Auth(profile): Auth,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<TagQueryParams>,
) -> Result<Json<NodeListResponse>, ApiError> {
    let nodes = state
        .nodes()
        .query_by_tags(&profile, params.tag_names())
        .await?;
    Ok(Json(NodeListResponse::from(nodes)))
}

/// List the tags attached to a node.
#[utoipa::path(
    get,
    path = "/v1/node/{node_id}/tags",
    tag = "Tags",
    security(("bearer_auth" = [])),
    params(("node_id" = Uuid, Path, description = "Node ID")),
    responses(
        (status = 200, description = "Tags of the node", body = NodeTagsResponse),
        (status = 404, description = "Node not found")
    )
)]
pub async fn node_tags(
    Auth(profile): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<Uuid>,
) -> Result<Json<NodeTagsResponse>, ApiError> {
    let tags = state.nodes().tags_of(&profile, node_id).await?;
    Ok(Json(NodeTagsResponse {
        node_id,
        tags: tags.into_iter().collect(),
    }))
}

/// List all tags with their node counts.
#[utoipa::path(
    get,
    path = "/v1/tags",
    tag = "Tags",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All tags", body = TagListResponse)
    )
)]
pub async fn list_tags(
    Auth(profile): Auth,
    State(state): State<AppState>,
) -> Result<Json<TagListResponse>, ApiError> {
    let tags = state.nodes().list_tags(&profile).await?;
    Ok(Json(TagListResponse {
        total: tags.len(),
        tags,
    }))
}

/// Delete a tag. A tag still in use needs `cascade=true`.
#[utoipa::path(
    delete,
    path = "/v1/tags/{name}",
    tag = "Tags",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Tag name"), DeleteParams),
    responses(
        (status = 200, description = "Tag deleted", body = DeleteTagResponse),
        (status = 404, description = "Tag not found"),
        (status = 409, description = "Tag is still attached to nodes")
    )
)]
pub async fn delete_tag(
    Auth(profile): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
    ApiQuery(params): ApiQuery<DeleteParams>,
) -> Result<Json<DeleteTagResponse>, ApiError> {
    let tag = normalize_tag_name(&name)?;
    let detached = state
        .nodes()
        .delete_tag(&profile, name, params.cascade)
        .await?;
    Ok(Json(DeleteTagResponse { tag, detached }))
}
