use super::text_enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Pledged,
    Delivered,
    Cancelled,
}

text_enum!(DonationStatus {
    Pledged => "pledged",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct SupplyDonation {
    pub id: Uuid,
    pub grid_id: Uuid,
    pub donor_id: Uuid,
    pub donor_name: String,
    pub donor_phone: Option<String>,
    pub supply_name: String,
    pub quantity: i32,
    pub unit: String,
    pub delivery_method: Option<String>,
    pub status: DonationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
