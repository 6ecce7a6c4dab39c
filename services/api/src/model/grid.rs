use super::text_enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GridType {
    Manpower,
    Equipment,
    Supply,
    Mixed,
    Accommodation,
    Food,
}

text_enum!(GridType {
    Manpower => "manpower",
    Equipment => "equipment",
    Supply => "supply",
    Mixed => "mixed",
    Accommodation => "accommodation",
    Food => "food",
});

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GridStatus {
    Open,
    Closed,
    Completed,
}

text_enum!(GridStatus {
    Open => "open",
    Closed => "closed",
    Completed => "completed",
});

/// One line of a grid's supply wish list.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct SupplyNeed {
    pub name: String,
    pub quantity: i32,
    pub unit: String,
    #[serde(default)]
    pub received: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
pub struct GridBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Grid {
    pub id: Uuid,
    pub disaster_area_id: Uuid,
    pub code: String,
    pub grid_type: GridType,
    pub status: GridStatus,
    pub volunteer_needed: i32,
    /// Non-cancelled registrations; maintained by storage, never by callers.
    pub volunteer_registered: i32,
    pub meeting_point: Option<String>,
    pub risks_notes: Option<String>,
    pub contact_info: Option<String>,
    pub supplies_needed: Vec<SupplyNeed>,
    pub center_lat: Option<f64>,
    pub center_lng: Option<f64>,
    pub bounds: Option<GridBounds>,
    pub grid_manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
