//! Grid discussion handlers.
use crate::api::error::{ApiError, api_not_found, api_store_error};
use crate::api::types::{DiscussionCreateRequest, DiscussionListResponse, DiscussionUpdateRequest};
use crate::api::{QueryParams, parse_id, query_limit, query_uuid, required_text};
use crate::app::AppState;
use crate::auth::guard::{AccessRule, authorize};
use crate::model::GridDiscussion;
use crate::store::{ListFilter, StoreError};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use shovel_authz::{Action, Permission, Resource, RlsContext, RoleGate};
use uuid::Uuid;

fn rule(action: Action) -> AccessRule {
    AccessRule::new(RoleGate::ANY, Permission::new(Resource::GridDiscussions, action))
}

#[utoipa::path(
    get,
    path = "/v1/grid-discussions",
    tag = "grid_discussions",
    params(
        ("grid_id" = Option<String>, Query, description = "Only posts on this grid"),
        ("limit" = Option<u32>, Query, description = "Maximum rows")
    ),
    responses(
        (status = 200, description = "List discussion posts", body = DiscussionListResponse)
    )
)]
pub(crate) async fn list_discussions(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<DiscussionListResponse>, ApiError> {
    let filter = ListFilter {
        grid_id: query_uuid(&params, "grid_id")?,
        limit: state.page_limit(query_limit(&params)?),
    };
    let items = state
        .store
        .list_discussions(&RlsContext::anonymous(), filter)
        .await
        .map_err(|err| api_store_error("discussion", err))?;
    Ok(Json(DiscussionListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/v1/grid-discussions",
    tag = "grid_discussions",
    request_body = DiscussionCreateRequest,
    responses(
        (status = 201, description = "Post created", body = GridDiscussion),
        (status = 404, description = "Grid not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_discussion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DiscussionCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authorize(&state, &headers, rule(Action::Create)).await?;
    let now = Utc::now();
    let discussion = GridDiscussion {
        id: Uuid::new_v4(),
        grid_id: body.grid_id,
        author_id: auth.user.id,
        author_name: auth.user.name.clone(),
        content: required_text(&body.content, "content")?,
        created_at: now,
        updated_at: now,
    };
    let created = state
        .store
        .create_discussion(&auth.rls, discussion)
        .await
        .map_err(|err| match err {
            StoreError::NotFound(_) => api_not_found("grid not found"),
            err => api_store_error("discussion", err),
        })?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/v1/grid-discussions/{id}",
    tag = "grid_discussions",
    params(("id" = String, Path, description = "Post id")),
    request_body = DiscussionUpdateRequest,
    responses(
        (status = 200, description = "Post edited", body = GridDiscussion),
        (status = 403, description = "Not the author", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_discussion(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DiscussionUpdateRequest>,
) -> Result<Json<GridDiscussion>, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Update).on(id)).await?;
    let content = required_text(&body.content, "content")?;
    let mut discussion = state
        .store
        .get_discussion(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("discussion", err))?;
    discussion.content = content;
    discussion.updated_at = Utc::now();
    let updated = state
        .store
        .update_discussion(&auth.rls, discussion)
        .await
        .map_err(|err| api_store_error("discussion", err))?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/grid-discussions/{id}",
    tag = "grid_discussions",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_discussion(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Delete).on(id)).await?;
    state
        .store
        .delete_discussion(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("discussion", err))?;
    Ok(StatusCode::NO_CONTENT)
}
