//! RBAC request guard.
//!
//! # Purpose
//! Turns the `Authorization: Bearer` header into an [`AuthContext`] or a
//! 401/403 [`ApiError`]. The checks run in a fixed order:
//! 1. bearer present and well formed, token verifies, user exists (else 401);
//! 2. account not suspended (else 403, audited);
//! 3. role inside the route's allow-list (else 403, audited);
//! 4. required permission effective after overrides (else 403, audited).
//!
//! Exercising a high-risk permission writes a `high_risk_access` audit row and
//! lets the request through.
//!
//! # Security considerations
//! - Token failures are reported with a generic message; details go to `debug`.
//! - The returned [`RlsContext`] is the only thing the store sees, so handlers
//!   never build one themselves for authenticated calls.
use crate::api::error::{ApiError, api_forbidden, api_internal, api_internal_message, api_unauthorized};
use crate::app::AppState;
use crate::auth::audit::{self, ACCESS_DENIED, AuditEvent, HIGH_RISK_ACCESS, RequestMeta};
use crate::model::User;
use crate::observability;
use crate::store::StoreError;
use axum::http::HeaderMap;
use chrono::Utc;
use serde_json::json;
use shovel_authz::{EffectivePermissions, Permission, RlsContext, RoleGate};

/// What a route requires of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub roles: RoleGate,
    pub permission: Option<Permission>,
    /// Target row, copied into audit entries.
    pub resource_id: Option<String>,
}

impl AccessRule {
    /// Any active, authenticated user.
    pub fn authenticated() -> Self {
        Self {
            roles: RoleGate::ANY,
            permission: None,
            resource_id: None,
        }
    }

    pub fn new(roles: RoleGate, permission: Permission) -> Self {
        Self {
            roles,
            permission: Some(permission),
            resource_id: None,
        }
    }

    pub fn on(mut self, resource_id: impl ToString) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }
}

/// Authenticated caller for the rest of the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub permissions: EffectivePermissions,
    pub rls: RlsContext,
    pub meta: RequestMeta,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }
}

/// Authenticate the caller and enforce `rule`.
///
/// # Errors
/// - 401 for a missing, malformed, or invalid bearer, or an unknown user.
/// - 403 for a suspended account, a role outside the gate, or a missing
///   permission.
/// - 500 when storage fails, counted with the `error` outcome.
pub async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    rule: AccessRule,
) -> Result<AuthContext, ApiError> {
    let Some(bearer) = extract_bearer(headers) else {
        observability::record_authz_decision("unauthenticated");
        return Err(api_unauthorized("missing bearer token"));
    };
    authorize_bearer(state, headers, bearer, &rule).await
}

/// Authenticate when a bearer is present; anonymous callers get `None`.
///
/// # Errors
/// - Same as [`authorize`] with an empty gate once a bearer is sent.
pub async fn authenticate_optional(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<AuthContext>, ApiError> {
    if headers.get(axum::http::header::AUTHORIZATION).is_none() {
        return Ok(None);
    }
    authorize(state, headers, AccessRule::authenticated())
        .await
        .map(Some)
}

async fn authorize_bearer(
    state: &AppState,
    headers: &HeaderMap,
    bearer: &str,
    rule: &AccessRule,
) -> Result<AuthContext, ApiError> {
    let user_id = match state
        .verifier
        .verify(bearer)
        .and_then(|claims| claims.user_id())
    {
        Ok(user_id) => user_id,
        Err(err) => {
            tracing::debug!(error = %err, "bearer token rejected");
            observability::record_authz_decision("unauthenticated");
            return Err(api_unauthorized("invalid token"));
        }
    };
    let user = match state.store.get_user(user_id).await {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => {
            observability::record_authz_decision("unauthenticated");
            return Err(api_unauthorized("unknown user"));
        }
        Err(err) => {
            observability::record_authz_decision("error");
            return Err(api_internal("failed to load user", &err));
        }
    };
    let meta = RequestMeta::from_headers(headers);

    if user.is_suspended() {
        deny(state, &user, &meta, rule, "suspended").await;
        return Err(api_forbidden("account suspended"));
    }
    if !rule.roles.allows(user.role) {
        deny(state, &user, &meta, rule, "role").await;
        return Err(api_forbidden("role not permitted"));
    }

    let permissions = match resolve_permissions(state, &user).await {
        Ok(permissions) => permissions,
        Err(err) => {
            observability::record_authz_decision("error");
            return Err(err);
        }
    };
    if let Some(permission) = rule.permission {
        if !permissions.allows(&permission) {
            deny(state, &user, &meta, rule, "permission").await;
            return Err(api_forbidden(&format!("missing permission {permission}")));
        }
        if permission.is_high_risk() {
            audit::record(
                state,
                &user,
                &meta,
                AuditEvent::new(HIGH_RISK_ACCESS)
                    .resource(permission.resource.as_str(), rule.resource_id.clone())
                    .metadata(json!({ "permission": permission.to_string() })),
            )
            .await;
        }
    }

    observability::record_authz_decision("allowed");
    Ok(AuthContext {
        rls: RlsContext::for_user(user.id, user.role),
        user,
        permissions,
        meta,
    })
}

/// Resolve role policies plus the user's overrides as of now.
pub async fn resolve_permissions(
    state: &AppState,
    user: &User,
) -> Result<EffectivePermissions, ApiError> {
    let policies = state
        .store
        .list_role_policies()
        .await
        .map_err(|err| api_internal("failed to load role policies", &err))?;
    let overrides = state
        .store
        .list_user_permissions(user.id)
        .await
        .map_err(|err| api_internal("failed to load permission overrides", &err))?
        .iter()
        .map(|row| row.as_override())
        .collect::<Vec<_>>();
    EffectivePermissions::resolve(user.id, user.role, &policies, &overrides, Utc::now())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, user_id = %user.id, "permission resolution failed");
            api_internal_message("failed to resolve permissions")
        })
}

async fn deny(state: &AppState, user: &User, meta: &RequestMeta, rule: &AccessRule, reason: &str) {
    observability::record_authz_decision("denied");
    tracing::info!(user_id = %user.id, role = %user.role, reason, "access denied");
    let required_roles: Vec<&str> = rule.roles.roles().iter().map(|role| role.as_str()).collect();
    let mut event = AuditEvent::new(ACCESS_DENIED).reason(reason).metadata(json!({
        "permission": rule.permission.map(|permission| permission.to_string()),
        "required_roles": required_roles,
    }));
    if let Some(permission) = rule.permission {
        event = event.resource(permission.resource.as_str(), rule.resource_id.clone());
    }
    audit::record(state, user, meta, event).await;
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
