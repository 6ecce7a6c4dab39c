//! Grid handlers.
//!
//! Reads are public. Admins and grid managers may create grids; updates are
//! further limited by row policy to admins and the grid's own manager.
use crate::api::error::{ApiError, api_not_found, api_store_error, api_validation_error};
use crate::api::types::{GridListResponse, GridRequest};
use crate::api::{
    QueryParams, check_latitude, check_longitude, optional_text, parse_id, query_limit,
    query_uuid, required_text,
};
use crate::app::AppState;
use crate::auth::guard::{AccessRule, AuthContext, authorize};
use crate::model::{Grid, GridBounds, GridStatus, SupplyNeed};
use crate::store::StoreError;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use shovel_authz::{Action, Permission, Resource, RlsContext, Role, RoleGate};
use uuid::Uuid;

fn check_supplies(supplies: Vec<SupplyNeed>) -> Result<Vec<SupplyNeed>, ApiError> {
    supplies
        .into_iter()
        .map(|need| {
            if need.quantity <= 0 {
                return Err(api_validation_error("supply quantity must be positive"));
            }
            if need.received < 0 {
                return Err(api_validation_error("supply received must not be negative"));
            }
            Ok(SupplyNeed {
                name: required_text(&need.name, "supply name")?,
                unit: required_text(&need.unit, "supply unit")?,
                ..need
            })
        })
        .collect()
}

fn check_bounds(bounds: Option<GridBounds>) -> Result<Option<GridBounds>, ApiError> {
    let Some(bounds) = bounds else {
        return Ok(None);
    };
    check_latitude(Some(bounds.north), "bounds.north")?;
    check_latitude(Some(bounds.south), "bounds.south")?;
    check_longitude(Some(bounds.east), "bounds.east")?;
    check_longitude(Some(bounds.west), "bounds.west")?;
    if bounds.north < bounds.south {
        return Err(api_validation_error("bounds.north must not be below bounds.south"));
    }
    Ok(Some(bounds))
}

fn build_grid(id: Uuid, body: GridRequest, auth: &AuthContext) -> Result<Grid, ApiError> {
    if body.volunteer_needed < 0 {
        return Err(api_validation_error("volunteer_needed must not be negative"));
    }
    check_latitude(body.center_lat, "center_lat")?;
    check_longitude(body.center_lng, "center_lng")?;
    // A manager creating a grid without naming one manages it.
    let grid_manager_id = body
        .grid_manager_id
        .or((auth.user.role == Role::GridManager).then_some(auth.user.id));
    let now = Utc::now();
    Ok(Grid {
        id,
        disaster_area_id: body.disaster_area_id,
        code: required_text(&body.code, "code")?,
        grid_type: body.grid_type,
        status: body.status.unwrap_or(GridStatus::Open),
        volunteer_needed: body.volunteer_needed,
        volunteer_registered: 0,
        meeting_point: optional_text(body.meeting_point),
        risks_notes: optional_text(body.risks_notes),
        contact_info: optional_text(body.contact_info),
        supplies_needed: check_supplies(body.supplies_needed)?,
        center_lat: body.center_lat,
        center_lng: body.center_lng,
        bounds: check_bounds(body.bounds)?,
        grid_manager_id,
        created_at: now,
        updated_at: now,
    })
}

#[utoipa::path(
    get,
    path = "/v1/grids",
    tag = "grids",
    params(
        ("disaster_area_id" = Option<String>, Query, description = "Only grids in this area"),
        ("limit" = Option<u32>, Query, description = "Maximum rows")
    ),
    responses(
        (status = 200, description = "List grids", body = GridListResponse),
        (status = 400, description = "Malformed filter", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_grids(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<GridListResponse>, ApiError> {
    let area_id = query_uuid(&params, "disaster_area_id")?;
    let limit = state.page_limit(query_limit(&params)?);
    let items = state
        .store
        .list_grids(&RlsContext::anonymous(), area_id, limit)
        .await
        .map_err(|err| api_store_error("grid", err))?;
    Ok(Json(GridListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/grids/{id}",
    tag = "grids",
    params(("id" = String, Path, description = "Grid id")),
    responses(
        (status = 200, description = "Grid", body = Grid),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_grid(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Grid>, ApiError> {
    let id = parse_id(&id, "id")?;
    let grid = state
        .store
        .get_grid(&RlsContext::anonymous(), id)
        .await
        .map_err(|err| api_store_error("grid", err))?;
    Ok(Json(grid))
}

#[utoipa::path(
    post,
    path = "/v1/grids",
    tag = "grids",
    request_body = GridRequest,
    responses(
        (status = 201, description = "Grid created", body = Grid),
        (status = 404, description = "Disaster area not found", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Code already used in the area", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_grid(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GridRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authorize(
        &state,
        &headers,
        AccessRule::new(RoleGate::MANAGERS, Permission::new(Resource::Grids, Action::Create)),
    )
    .await?;
    let grid = build_grid(Uuid::new_v4(), body, &auth)?;
    let created = state
        .store
        .create_grid(&auth.rls, grid)
        .await
        .map_err(|err| match err {
            StoreError::NotFound(_) => api_not_found("disaster area not found"),
            err => api_store_error("grid", err),
        })?;
    tracing::info!(grid_id = %created.id, code = %created.code, "grid created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/v1/grids/{id}",
    tag = "grids",
    params(("id" = String, Path, description = "Grid id")),
    request_body = GridRequest,
    responses(
        (status = 200, description = "Grid replaced; an omitted grid_manager_id keeps the current manager", body = Grid),
        (status = 403, description = "Not this grid's manager", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_grid(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GridRequest>,
) -> Result<Json<Grid>, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(
        &state,
        &headers,
        AccessRule::new(RoleGate::MANAGERS, Permission::new(Resource::Grids, Action::Update))
            .on(id),
    )
    .await?;
    let stored = state
        .store
        .get_grid(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("grid", err))?;
    let requested_manager = body.grid_manager_id;
    let mut grid = build_grid(id, body, &auth)?;
    // Omitting the manager keeps the current one.
    grid.grid_manager_id = requested_manager.or(stored.grid_manager_id);
    grid.created_at = stored.created_at;
    grid.volunteer_registered = stored.volunteer_registered;
    let updated = state
        .store
        .update_grid(&auth.rls, grid)
        .await
        .map_err(|err| api_store_error("grid", err))?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/grids/{id}",
    tag = "grids",
    params(("id" = String, Path, description = "Grid id")),
    responses(
        (status = 204, description = "Grid and its registrations, donations and discussions deleted"),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_grid(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(
        &state,
        &headers,
        AccessRule::new(RoleGate::ADMINS, Permission::new(Resource::Grids, Action::Delete))
            .on(id),
    )
    .await?;
    state
        .store
        .delete_grid(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("grid", err))?;
    tracing::info!(grid_id = %id, user_id = %auth.user.id, "grid deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplies_need_positive_quantity_and_names() {
        let ok = check_supplies(vec![SupplyNeed {
            name: " water ".to_string(),
            quantity: 3,
            unit: "box".to_string(),
            received: 0,
        }])
        .expect("valid");
        assert_eq!(ok[0].name, "water");

        let zero = check_supplies(vec![SupplyNeed {
            name: "water".to_string(),
            quantity: 0,
            unit: "box".to_string(),
            received: 0,
        }]);
        assert!(zero.is_err());

        let unnamed = check_supplies(vec![SupplyNeed {
            name: " ".to_string(),
            quantity: 1,
            unit: "box".to_string(),
            received: 0,
        }]);
        assert!(unnamed.is_err());
    }

    #[test]
    fn bounds_must_be_ordered_and_in_range() {
        let good = GridBounds {
            north: 23.7,
            south: 23.6,
            east: 121.5,
            west: 121.4,
        };
        assert!(check_bounds(Some(good)).is_ok());
        assert!(check_bounds(Some(GridBounds { north: 23.5, ..good })).is_err());
        assert!(check_bounds(Some(GridBounds { east: 200.0, ..good })).is_err());
        assert_eq!(check_bounds(None).expect("none"), None);
    }
}
