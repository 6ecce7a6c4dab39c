//! Permission catalog and per-user overrides.
//!
//! Overrides are `grant` or `revoke` rows layered over role policies. Reading
//! them is an admin capability; changing them requires a super admin.
use crate::api::error::{ApiError, api_store_error, api_validation_error};
use crate::api::types::{
    PermissionCatalogResponse, PermissionChangeRequest, UserPermissionListResponse,
};
use crate::api::{optional_text, parse_id};
use crate::app::AppState;
use crate::auth::audit::{self, AuditEvent, PERMISSION_GRANTED, PERMISSION_REVOKED};
use crate::auth::guard::{AccessRule, authorize};
use crate::model::UserPermission;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::json;
use shovel_authz::{Action, GrantType, Permission, Resource, RoleGate, permission_catalog};
use uuid::Uuid;

fn read_rule() -> AccessRule {
    AccessRule::new(RoleGate::ADMINS, Permission::new(Resource::Permissions, Action::Read))
}

fn manage_rule(user_id: Uuid) -> AccessRule {
    AccessRule::new(
        RoleGate::SUPER_ADMIN,
        Permission::new(Resource::Permissions, Action::Manage),
    )
    .on(user_id)
}

fn parse_permission(raw: &str) -> Result<Permission, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| api_validation_error(&format!("unknown permission {raw}")))
}

fn check_expiry(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    match expires_at {
        Some(at) if at <= now => Err(api_validation_error("expires_at must be in the future")),
        other => Ok(other),
    }
}

async fn ensure_user(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    state
        .store
        .get_user(user_id)
        .await
        .map(|_| ())
        .map_err(|err| api_store_error("user", err))
}

#[utoipa::path(
    get,
    path = "/v1/permissions",
    tag = "permissions",
    responses(
        (status = 200, description = "Every resource:action pair", body = PermissionCatalogResponse),
        (status = 403, description = "Admins only", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_permission_catalog(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PermissionCatalogResponse>, ApiError> {
    authorize(&state, &headers, read_rule()).await?;
    Ok(Json(PermissionCatalogResponse {
        items: permission_catalog(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/permissions",
    tag = "permissions",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Overrides for the user", body = UserPermissionListResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_user_permissions(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserPermissionListResponse>, ApiError> {
    let id = parse_id(&id, "id")?;
    authorize(&state, &headers, read_rule().on(id)).await?;
    ensure_user(&state, id).await?;
    let items = state
        .store
        .list_user_permissions(id)
        .await
        .map_err(|err| api_store_error("permission override", err))?;
    Ok(Json(UserPermissionListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/permissions",
    tag = "permissions",
    params(("id" = String, Path, description = "User id")),
    request_body = PermissionChangeRequest,
    responses(
        (status = 200, description = "Override stored", body = UserPermission),
        (status = 400, description = "Unknown permission or past expiry", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Super admin only", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn change_user_permission(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PermissionChangeRequest>,
) -> Result<Json<UserPermission>, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, manage_rule(id)).await?;
    let permission = parse_permission(&body.permission)?;
    let now = Utc::now();
    let expires_at = check_expiry(body.expires_at, now)?;
    ensure_user(&state, id).await?;

    let stored = state
        .store
        .upsert_user_permission(UserPermission {
            user_id: id,
            permission,
            grant_type: body.grant_type,
            granted_by: Some(auth.user.id),
            reason: optional_text(body.reason),
            expires_at,
            created_at: now,
        })
        .await
        .map_err(|err| api_store_error("permission override", err))?;

    let action = match stored.grant_type {
        GrantType::Grant => PERMISSION_GRANTED,
        GrantType::Revoke => PERMISSION_REVOKED,
    };
    let mut event = AuditEvent::new(action)
        .resource(Resource::Permissions.as_str(), Some(id.to_string()))
        .metadata(json!({
            "permission": stored.permission.to_string(),
            "grant_type": stored.grant_type,
            "expires_at": stored.expires_at,
        }));
    if let Some(reason) = stored.reason.clone() {
        event = event.reason(reason);
    }
    audit::record(&state, &auth.user, &auth.meta, event).await;
    tracing::info!(
        target_user = %id,
        permission = %stored.permission,
        grant_type = %stored.grant_type,
        "permission override stored"
    );
    Ok(Json(stored))
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}/permissions/{permission}",
    tag = "permissions",
    params(
        ("id" = String, Path, description = "User id"),
        ("permission" = String, Path, description = "Permission such as audit_logs:read")
    ),
    responses(
        (status = 204, description = "Override removed; the role policy applies again"),
        (status = 404, description = "No such override", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_user_permission(
    Path((id, permission)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, manage_rule(id)).await?;
    let permission = parse_permission(&permission)?;
    state
        .store
        .delete_user_permission(id, permission)
        .await
        .map_err(|err| api_store_error("permission override", err))?;
    audit::record(
        &state,
        &auth.user,
        &auth.meta,
        AuditEvent::new(PERMISSION_REVOKED)
            .resource(Resource::Permissions.as_str(), Some(id.to_string()))
            .metadata(json!({
                "permission": permission.to_string(),
                "operation": "delete_override",
            })),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
