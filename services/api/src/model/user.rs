use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shovel_authz::{Role, UserStatus};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_suspended(&self) -> bool {
        self.status == UserStatus::Suspended
    }
}
