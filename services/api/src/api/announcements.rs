//! Announcement handlers. Reads are public; writes are admin-only.
use crate::api::error::{ApiError, api_store_error};
use crate::api::types::{AnnouncementListResponse, AnnouncementRequest};
use crate::api::{QueryParams, parse_id, query_limit, required_text};
use crate::app::AppState;
use crate::auth::guard::{AccessRule, authorize};
use crate::model::{Announcement, AnnouncementPriority};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use shovel_authz::{Action, Permission, Resource, RlsContext, RoleGate};
use uuid::Uuid;

fn rule(action: Action) -> AccessRule {
    AccessRule::new(RoleGate::ADMINS, Permission::new(Resource::Announcements, action))
}

#[utoipa::path(
    get,
    path = "/v1/announcements",
    tag = "announcements",
    params(("limit" = Option<u32>, Query, description = "Maximum rows")),
    responses(
        (status = 200, description = "Announcements, newest first", body = AnnouncementListResponse)
    )
)]
pub(crate) async fn list_announcements(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<AnnouncementListResponse>, ApiError> {
    let limit = state.page_limit(query_limit(&params)?);
    let items = state
        .store
        .list_announcements(&RlsContext::anonymous(), limit)
        .await
        .map_err(|err| api_store_error("announcement", err))?;
    Ok(Json(AnnouncementListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/announcements/{id}",
    tag = "announcements",
    params(("id" = String, Path, description = "Announcement id")),
    responses(
        (status = 200, description = "Announcement", body = Announcement),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_announcement(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Announcement>, ApiError> {
    let id = parse_id(&id, "id")?;
    let announcement = state
        .store
        .get_announcement(&RlsContext::anonymous(), id)
        .await
        .map_err(|err| api_store_error("announcement", err))?;
    Ok(Json(announcement))
}

#[utoipa::path(
    post,
    path = "/v1/announcements",
    tag = "announcements",
    request_body = AnnouncementRequest,
    responses(
        (status = 201, description = "Announcement published", body = Announcement),
        (status = 403, description = "Admins only", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_announcement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AnnouncementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authorize(&state, &headers, rule(Action::Create)).await?;
    let now = Utc::now();
    let announcement = Announcement {
        id: Uuid::new_v4(),
        title: required_text(&body.title, "title")?,
        body: required_text(&body.body, "body")?,
        priority: body.priority.unwrap_or(AnnouncementPriority::Normal),
        author_id: Some(auth.user.id),
        created_at: now,
        updated_at: now,
    };
    let created = state
        .store
        .create_announcement(&auth.rls, announcement)
        .await
        .map_err(|err| api_store_error("announcement", err))?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/v1/announcements/{id}",
    tag = "announcements",
    params(("id" = String, Path, description = "Announcement id")),
    request_body = AnnouncementRequest,
    responses(
        (status = 200, description = "Announcement updated", body = Announcement),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_announcement(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AnnouncementRequest>,
) -> Result<Json<Announcement>, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Update).on(id)).await?;
    let mut announcement = state
        .store
        .get_announcement(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("announcement", err))?;
    announcement.title = required_text(&body.title, "title")?;
    announcement.body = required_text(&body.body, "body")?;
    if let Some(priority) = body.priority {
        announcement.priority = priority;
    }
    announcement.updated_at = Utc::now();
    let updated = state
        .store
        .update_announcement(&auth.rls, announcement)
        .await
        .map_err(|err| api_store_error("announcement", err))?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/announcements/{id}",
    tag = "announcements",
    params(("id" = String, Path, description = "Announcement id")),
    responses(
        (status = 204, description = "Announcement deleted"),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_announcement(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Delete).on(id)).await?;
    state
        .store
        .delete_announcement(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("announcement", err))?;
    Ok(StatusCode::NO_CONTENT)
}
