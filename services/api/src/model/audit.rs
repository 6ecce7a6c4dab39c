//! Audit log records.
//!
//! Entries are append-only. `action` is a short verb such as `access_denied`,
//! `high_risk_access`, `permission_granted`, `permission_revoked` or
//! `user_access_changed`.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shovel_authz::Role;
use utoipa::ToSchema;
use uuid::Uuid;

/// An audit row before storage assigns `id` and `created_at`.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Default)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub user_role: Option<Role>,
    pub action: String,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct AuditLog {
    pub id: i64,
    #[serde(flatten)]
    pub entry: AuditEntry,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
    pub limit: u32,
}
