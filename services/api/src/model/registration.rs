use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shovel_authz::RegistrationStatus;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct VolunteerRegistration {
    pub id: Uuid,
    pub grid_id: Uuid,
    pub user_id: Uuid,
    pub volunteer_name: String,
    pub volunteer_phone: Option<String>,
    pub status: RegistrationStatus,
    pub available_time: Option<String>,
    pub skills: Vec<String>,
    pub equipment: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
