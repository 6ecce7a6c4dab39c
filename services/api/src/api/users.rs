//! Caller identity and user administration.
//!
//! # Security considerations
//! - Only a super admin may promote someone to an admin-class role or change
//!   the role or status of an existing admin.
//! - Every access change is written to the audit log with before/after values.
use crate::api::error::{ApiError, api_forbidden, api_store_error, api_validation_error};
use crate::api::types::{MyPermissionsResponse, UserAccessRequest, UserListResponse};
use crate::api::{QueryParams, optional_text, parse_id, query_limit};
use crate::app::AppState;
use crate::auth::audit::{self, AuditEvent, USER_ACCESS_CHANGED};
use crate::auth::guard::{AccessRule, authorize};
use crate::model::User;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use serde_json::json;
use shovel_authz::{Action, Permission, Resource, Role, RoleGate};

/// Whether `actor` may apply `request` to `target`.
fn may_change_access(actor: Role, target: Role, request: &UserAccessRequest) -> bool {
    if actor == Role::SuperAdmin {
        return true;
    }
    !target.is_admin() && !request.role.is_some_and(Role::is_admin)
}

#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "users",
    responses(
        (status = 200, description = "The authenticated user", body = User),
        (status = 401, description = "Unauthenticated", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let auth = authorize(&state, &headers, AccessRule::authenticated()).await?;
    Ok(Json(auth.user))
}

#[utoipa::path(
    get,
    path = "/v1/me/permissions",
    tag = "users",
    responses(
        (status = 200, description = "Effective permissions after overrides", body = MyPermissionsResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn my_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MyPermissionsResponse>, ApiError> {
    let auth = authorize(&state, &headers, AccessRule::authenticated()).await?;
    Ok(Json(MyPermissionsResponse {
        user_id: auth.user.id,
        role: auth.user.role,
        permissions: auth.permissions.list(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/users",
    tag = "users",
    params(("limit" = Option<u32>, Query, description = "Maximum rows")),
    responses(
        (status = 200, description = "List users", body = UserListResponse),
        (status = 403, description = "Admins only", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
) -> Result<Json<UserListResponse>, ApiError> {
    authorize(
        &state,
        &headers,
        AccessRule::new(RoleGate::ADMINS, Permission::new(Resource::Users, Action::Read)),
    )
    .await?;
    let items = state
        .store
        .list_users(state.page_limit(query_limit(&params)?))
        .await
        .map_err(|err| api_store_error("user", err))?;
    Ok(Json(UserListResponse { items }))
}

#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    request_body = UserAccessRequest,
    responses(
        (status = 200, description = "Role or status changed", body = User),
        (status = 400, description = "Nothing to change", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Admin roles need a super admin", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_user_access(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UserAccessRequest>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(
        &state,
        &headers,
        AccessRule::new(RoleGate::ADMINS, Permission::new(Resource::Users, Action::Update))
            .on(id),
    )
    .await?;
    if body.role.is_none() && body.status.is_none() {
        return Err(api_validation_error("role or status is required"));
    }
    let target = state
        .store
        .get_user(id)
        .await
        .map_err(|err| api_store_error("user", err))?;
    if !may_change_access(auth.user.role, target.role, &body) {
        return Err(api_forbidden("only a super admin may manage admin accounts"));
    }

    let updated = state
        .store
        .update_user_access(id, body.role, body.status)
        .await
        .map_err(|err| api_store_error("user", err))?;

    let mut event = AuditEvent::new(USER_ACCESS_CHANGED)
        .resource(Resource::Users.as_str(), Some(id.to_string()))
        .metadata(json!({
            "from_role": target.role,
            "to_role": updated.role,
            "from_status": target.status,
            "to_status": updated.status,
        }));
    if let Some(reason) = optional_text(body.reason) {
        event = event.reason(reason);
    }
    audit::record(&state, &auth.user, &auth.meta, event).await;
    tracing::info!(
        target_user = %id,
        actor = %auth.user.id,
        role = %updated.role,
        status = %updated.status,
        "user access changed"
    );
    Ok(Json(updated))
}
