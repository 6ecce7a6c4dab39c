//! Best-effort audit log writer.
//!
//! # Key invariants
//! - A failed write never changes the HTTP response. It is logged at `warn`
//!   and counted in `shovel_audit_write_failures_total`.
//! - Client address comes from the first `x-forwarded-for` hop, then
//!   `x-real-ip`.
use crate::app::AppState;
use crate::model::{AuditEntry, User};
use crate::observability;
use axum::http::HeaderMap;
use serde_json::Value;
use shovel_authz::RlsContext;

pub const ACCESS_DENIED: &str = "access_denied";
pub const HIGH_RISK_ACCESS: &str = "high_risk_access";
pub const PERMISSION_GRANTED: &str = "permission_granted";
pub const PERMISSION_REVOKED: &str = "permission_revoked";
pub const USER_ACCESS_CHANGED: &str = "user_access_changed";

/// Request metadata copied into every audit row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = header_value(headers, "x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or_else(|| header_value(headers, "x-real-ip"))
            .map(str::to_string);
        Self {
            ip_address,
            user_agent: header_value(headers, "user-agent").map(str::to_string),
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Fields of an audit row that vary per call site.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub action: &'a str,
    pub resource: Option<&'a str>,
    pub resource_id: Option<String>,
    pub reason: Option<String>,
    pub metadata: Value,
}

impl<'a> AuditEvent<'a> {
    pub fn new(action: &'a str) -> Self {
        Self {
            action,
            resource: None,
            resource_id: None,
            reason: None,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn resource(mut self, resource: &'a str, resource_id: Option<String>) -> Self {
        self.resource = Some(resource);
        self.resource_id = resource_id;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Append one audit row on behalf of `actor`.
pub async fn record(state: &AppState, actor: &User, meta: &RequestMeta, event: AuditEvent<'_>) {
    let ctx = RlsContext::for_user(actor.id, actor.role);
    let entry = AuditEntry {
        user_id: Some(actor.id),
        user_role: Some(actor.role),
        action: event.action.to_string(),
        resource: event.resource.map(str::to_string),
        resource_id: event.resource_id,
        reason: event.reason,
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
        metadata: event.metadata,
    };
    if let Err(err) = state.store.append_audit(&ctx, entry).await {
        observability::record_audit_write_failure();
        tracing::warn!(
            error = %err,
            action = event.action,
            user_id = %actor.id,
            "failed to write audit log"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        headers.insert("user-agent", HeaderValue::from_static("relief-cli/1.0"));
        let meta = RequestMeta::from_headers(&headers);
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(meta.user_agent.as_deref(), Some("relief-cli/1.0"));
    }

    #[test]
    fn real_ip_used_without_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        let meta = RequestMeta::from_headers(&headers);
        assert_eq!(meta.ip_address.as_deref(), Some("10.0.0.2"));
        assert_eq!(meta.user_agent, None);
    }

    #[test]
    fn event_builder_sets_fields() {
        let event = AuditEvent::new(ACCESS_DENIED)
            .resource("grids", Some("g-1".to_string()))
            .reason("role")
            .metadata(serde_json::json!({"required_roles": ["admin"]}));
        assert_eq!(event.action, ACCESS_DENIED);
        assert_eq!(event.resource, Some("grids"));
        assert_eq!(event.reason.as_deref(), Some("role"));
        assert_eq!(event.metadata["required_roles"][0], "admin");
    }
}
