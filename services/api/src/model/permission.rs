use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shovel_authz::{GrantType, Permission, PermissionOverride};
use utoipa::ToSchema;
use uuid::Uuid;

/// One `user_permissions` row. At most one row exists per (user, permission).
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct UserPermission {
    pub user_id: Uuid,
    #[schema(value_type = String, example = "audit_logs:read")]
    pub permission: Permission,
    pub grant_type: GrantType,
    pub granted_by: Option<Uuid>,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserPermission {
    pub fn as_override(&self) -> PermissionOverride {
        PermissionOverride {
            permission: self.permission,
            grant_type: self.grant_type,
            expires_at: self.expires_at,
        }
    }
}
