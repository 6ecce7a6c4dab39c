//! Audit log query handler.
use crate::api::error::{ApiError, api_store_error};
use crate::api::types::AuditLogListResponse;
use crate::api::{QueryParams, query_limit, query_uuid};
use crate::app::AppState;
use crate::auth::guard::{AccessRule, authorize};
use crate::model::AuditQuery;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use shovel_authz::{Action, Permission, Resource, RoleGate};

#[utoipa::path(
    get,
    path = "/v1/audit-logs",
    tag = "audit_logs",
    params(
        ("action" = Option<String>, Query, description = "Only entries with this action"),
        ("user_id" = Option<String>, Query, description = "Only entries by this user"),
        ("limit" = Option<u32>, Query, description = "Maximum rows")
    ),
    responses(
        (status = 200, description = "Audit entries, newest first", body = AuditLogListResponse),
        (status = 403, description = "Admins only", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
) -> Result<Json<AuditLogListResponse>, ApiError> {
    let auth = authorize(
        &state,
        &headers,
        AccessRule::new(RoleGate::ADMINS, Permission::new(Resource::AuditLogs, Action::Read)),
    )
    .await?;
    let query = AuditQuery {
        action: params
            .get("action")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        user_id: query_uuid(&params, "user_id")?,
        limit: state.page_limit(query_limit(&params)?),
    };
    let items = state
        .store
        .list_audit_logs(&auth.rls, query)
        .await
        .map_err(|err| api_store_error("audit log", err))?;
    Ok(Json(AuditLogListResponse { items }))
}
