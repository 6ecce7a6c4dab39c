use super::text_enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AreaStatus {
    Active,
    Resolved,
}

text_enum!(AreaStatus {
    Active => "active",
    Resolved => "resolved",
});

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct DisasterArea {
    pub id: Uuid,
    pub name: String,
    pub county: Option<String>,
    pub township: Option<String>,
    pub description: Option<String>,
    pub center_lat: Option<f64>,
    pub center_lng: Option<f64>,
    pub status: AreaStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
