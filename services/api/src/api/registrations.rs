//! Volunteer registration handlers.
//!
//! # Key invariants
//! - A registration is always created for the caller, in `pending`, on an
//!   open grid.
//! - Status changes follow the registration state machine; the owner may only
//!   cancel or check in, while the grid manager and admins take any valid edge.
//! - The store applies the new status only if the stored one is unchanged, so
//!   two racing transitions cannot both succeed.
use crate::api::error::{ApiError, api_conflict, api_forbidden, api_not_found, api_store_error};
use crate::api::types::{
    RegistrationCreateRequest, RegistrationListResponse, RegistrationUpdateRequest,
};
use crate::api::{QueryParams, optional_text, parse_id, query_limit, query_uuid, required_text};
use crate::app::AppState;
use crate::auth::guard::{AccessRule, AuthContext, authorize};
use crate::model::{Grid, GridStatus, VolunteerRegistration};
use crate::observability;
use crate::store::{ListFilter, StoreError};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use shovel_authz::registration::{Actor, TransitionError};
use shovel_authz::{Action, Permission, RegistrationStatus, Resource, RlsContext, RoleGate};
use uuid::Uuid;

fn rule(action: Action) -> AccessRule {
    AccessRule::new(
        RoleGate::ANY,
        Permission::new(Resource::VolunteerRegistrations, action),
    )
}

/// Drop blank entries and surrounding whitespace.
fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

async fn load_grid(state: &AppState, grid_id: Uuid) -> Result<Grid, ApiError> {
    state
        .store
        .get_grid(&RlsContext::anonymous(), grid_id)
        .await
        .map_err(|err| api_store_error("grid", err))
}

/// Steward when the caller runs the grid or is an admin, owner when the
/// registration is theirs.
fn actor_for(auth: &AuthContext, grid: &Grid, registration: &VolunteerRegistration) -> Option<Actor> {
    if auth.is_admin() || grid.grid_manager_id == Some(auth.user.id) {
        Some(Actor::Steward)
    } else if registration.user_id == auth.user.id {
        Some(Actor::Owner)
    } else {
        None
    }
}

fn transition_error(err: TransitionError) -> ApiError {
    match err {
        TransitionError::Invalid { .. } => api_conflict("invalid_transition", &err.to_string()),
        TransitionError::NotPermitted { .. } => api_forbidden(&err.to_string()),
    }
}

fn apply_update(
    mut registration: VolunteerRegistration,
    body: RegistrationUpdateRequest,
) -> Result<VolunteerRegistration, ApiError> {
    if let Some(name) = body.volunteer_name {
        registration.volunteer_name = required_text(&name, "volunteer_name")?;
    }
    if body.volunteer_phone.is_some() {
        registration.volunteer_phone = optional_text(body.volunteer_phone);
    }
    if body.available_time.is_some() {
        registration.available_time = optional_text(body.available_time);
    }
    if let Some(skills) = body.skills {
        registration.skills = clean_list(skills);
    }
    if let Some(equipment) = body.equipment {
        registration.equipment = clean_list(equipment);
    }
    if body.notes.is_some() {
        registration.notes = optional_text(body.notes);
    }
    if let Some(status) = body.status {
        registration.status = status;
    }
    registration.updated_at = Utc::now();
    Ok(registration)
}

#[utoipa::path(
    get,
    path = "/v1/volunteer-registrations",
    tag = "volunteer_registrations",
    params(
        ("grid_id" = Option<String>, Query, description = "Only registrations for this grid"),
        ("limit" = Option<u32>, Query, description = "Maximum rows")
    ),
    responses(
        (status = 200, description = "Registrations visible to the caller", body = RegistrationListResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_registrations(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
) -> Result<Json<RegistrationListResponse>, ApiError> {
    let auth = authorize(&state, &headers, rule(Action::Read)).await?;
    let filter = ListFilter {
        grid_id: query_uuid(&params, "grid_id")?,
        limit: state.page_limit(query_limit(&params)?),
    };
    let items = state
        .store
        .list_registrations(&auth.rls, filter)
        .await
        .map_err(|err| api_store_error("registration", err))?;
    Ok(Json(RegistrationListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/v1/volunteer-registrations",
    tag = "volunteer_registrations",
    request_body = RegistrationCreateRequest,
    responses(
        (status = 201, description = "Registered as pending", body = VolunteerRegistration),
        (status = 404, description = "Grid not found", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Grid not open or already registered", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_registration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegistrationCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authorize(&state, &headers, rule(Action::Create)).await?;
    let volunteer_name = required_text(&body.volunteer_name, "volunteer_name")?;
    let grid = load_grid(&state, body.grid_id).await?;
    if grid.status != GridStatus::Open {
        return Err(api_conflict(
            "grid_not_open",
            &format!("grid {} is {}", grid.code, grid.status),
        ));
    }
    let now = Utc::now();
    let registration = VolunteerRegistration {
        id: Uuid::new_v4(),
        grid_id: grid.id,
        user_id: auth.user.id,
        volunteer_name,
        volunteer_phone: optional_text(body.volunteer_phone),
        status: RegistrationStatus::Pending,
        available_time: optional_text(body.available_time),
        skills: clean_list(body.skills),
        equipment: clean_list(body.equipment),
        notes: optional_text(body.notes),
        created_at: now,
        updated_at: now,
    };
    let created = state
        .store
        .create_registration(&auth.rls, registration)
        .await
        .map_err(|err| match err {
            StoreError::Conflict(_) => {
                api_conflict("already_exists", "already registered for this grid")
            }
            StoreError::NotFound(_) => api_not_found("grid not found"),
            err => api_store_error("registration", err),
        })?;
    tracing::info!(
        registration_id = %created.id,
        grid_id = %created.grid_id,
        user_id = %created.user_id,
        "volunteer registered"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/v1/volunteer-registrations/{id}",
    tag = "volunteer_registrations",
    params(("id" = String, Path, description = "Registration id")),
    request_body = RegistrationUpdateRequest,
    responses(
        (status = 200, description = "Registration updated", body = VolunteerRegistration),
        (status = 403, description = "Transition not allowed for this caller", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Invalid or stale transition", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_registration(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegistrationUpdateRequest>,
) -> Result<Json<VolunteerRegistration>, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Update).on(id)).await?;
    let current = state
        .store
        .get_registration(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("registration", err))?;
    let grid = load_grid(&state, current.grid_id).await?;
    let Some(actor) = actor_for(&auth, &grid, &current) else {
        return Err(api_forbidden("not allowed to modify this registration"));
    };
    let expected = current.status;
    let next = body.status;
    if let Some(next) = next {
        expected
            .check_transition(next, actor)
            .map_err(transition_error)?;
    }

    let updated = apply_update(current, body)?;
    let saved = state
        .store
        .update_registration(&auth.rls, updated, expected)
        .await
        .map_err(|err| api_store_error("registration", err))?;
    if let Some(next) = next {
        observability::record_registration_transition(next.as_str());
        tracing::info!(
            registration_id = %saved.id,
            from = %expected,
            to = %next,
            user_id = %auth.user.id,
            "registration status changed"
        );
    }
    Ok(Json(saved))
}

#[utoipa::path(
    delete,
    path = "/v1/volunteer-registrations/{id}",
    tag = "volunteer_registrations",
    params(("id" = String, Path, description = "Registration id")),
    responses(
        (status = 204, description = "Registration deleted"),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_registration(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Delete).on(id)).await?;
    state
        .store
        .delete_registration(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("registration", err))?;
    Ok(StatusCode::NO_CONTENT)
}
