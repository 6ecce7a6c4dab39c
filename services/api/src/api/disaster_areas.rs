//! Disaster area handlers.
//!
//! Reads are public. Writes need an admin-class role plus the matching
//! `disaster_areas:*` permission; row policies enforce the same rule again.
use crate::api::error::{ApiError, api_store_error};
use crate::api::types::{DisasterAreaListResponse, DisasterAreaRequest};
use crate::api::{
    QueryParams, check_latitude, check_longitude, optional_text, parse_id, query_limit,
    required_text,
};
use crate::app::AppState;
use crate::auth::guard::{AccessRule, authorize};
use crate::model::{AreaStatus, DisasterArea};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use shovel_authz::{Action, Permission, Resource, RlsContext, RoleGate};
use uuid::Uuid;

fn rule(action: Action) -> AccessRule {
    AccessRule::new(
        RoleGate::ADMINS,
        Permission::new(Resource::DisasterAreas, action),
    )
}

fn build_area(id: Uuid, body: DisasterAreaRequest) -> Result<DisasterArea, ApiError> {
    check_latitude(body.center_lat, "center_lat")?;
    check_longitude(body.center_lng, "center_lng")?;
    let now = Utc::now();
    Ok(DisasterArea {
        id,
        name: required_text(&body.name, "name")?,
        county: optional_text(body.county),
        township: optional_text(body.township),
        description: optional_text(body.description),
        center_lat: body.center_lat,
        center_lng: body.center_lng,
        status: body.status.unwrap_or(AreaStatus::Active),
        created_at: now,
        updated_at: now,
    })
}

#[utoipa::path(
    get,
    path = "/v1/disaster-areas",
    tag = "disaster_areas",
    params(("limit" = Option<u32>, Query, description = "Maximum rows")),
    responses(
        (status = 200, description = "List disaster areas", body = DisasterAreaListResponse)
    )
)]
pub(crate) async fn list_disaster_areas(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<DisasterAreaListResponse>, ApiError> {
    let limit = state.page_limit(query_limit(&params)?);
    let items = state
        .store
        .list_disaster_areas(&RlsContext::anonymous(), limit)
        .await
        .map_err(|err| api_store_error("disaster area", err))?;
    Ok(Json(DisasterAreaListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/disaster-areas/{id}",
    tag = "disaster_areas",
    params(("id" = String, Path, description = "Disaster area id")),
    responses(
        (status = 200, description = "Disaster area", body = DisasterArea),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_disaster_area(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DisasterArea>, ApiError> {
    let id = parse_id(&id, "id")?;
    let area = state
        .store
        .get_disaster_area(&RlsContext::anonymous(), id)
        .await
        .map_err(|err| api_store_error("disaster area", err))?;
    Ok(Json(area))
}

#[utoipa::path(
    post,
    path = "/v1/disaster-areas",
    tag = "disaster_areas",
    request_body = DisasterAreaRequest,
    responses(
        (status = 201, description = "Disaster area created", body = DisasterArea),
        (status = 400, description = "Validation failed", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_disaster_area(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DisasterAreaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authorize(&state, &headers, rule(Action::Create)).await?;
    let area = build_area(Uuid::new_v4(), body)?;
    let created = state
        .store
        .create_disaster_area(&auth.rls, area)
        .await
        .map_err(|err| api_store_error("disaster area", err))?;
    tracing::info!(area_id = %created.id, user_id = %auth.user.id, "disaster area created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/v1/disaster-areas/{id}",
    tag = "disaster_areas",
    params(("id" = String, Path, description = "Disaster area id")),
    request_body = DisasterAreaRequest,
    responses(
        (status = 200, description = "Disaster area updated", body = DisasterArea),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_disaster_area(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DisasterAreaRequest>,
) -> Result<Json<DisasterArea>, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Update).on(id)).await?;
    let area = build_area(id, body)?;
    let updated = state
        .store
        .update_disaster_area(&auth.rls, area)
        .await
        .map_err(|err| api_store_error("disaster area", err))?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/disaster-areas/{id}",
    tag = "disaster_areas",
    params(("id" = String, Path, description = "Disaster area id")),
    responses(
        (status = 204, description = "Disaster area and its grids deleted"),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_disaster_area(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Delete).on(id)).await?;
    state
        .store
        .delete_disaster_area(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("disaster area", err))?;
    tracing::info!(area_id = %id, user_id = %auth.user.id, "disaster area deleted");
    Ok(StatusCode::NO_CONTENT)
}
