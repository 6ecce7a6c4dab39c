use super::text_enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementPriority {
    Low,
    Normal,
    High,
}

text_enum!(AnnouncementPriority {
    Low => "low",
    Normal => "normal",
    High => "high",
});

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub priority: AnnouncementPriority,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
