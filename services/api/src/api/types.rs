//! HTTP API request/response types.
//!
//! # Purpose
//! Defines shared payload shapes for the relief REST API and OpenAPI schema
//! generation. Requests carry only caller-editable fields; ids, owners and
//! timestamps are filled in by handlers.
use crate::model::{
    AnnouncementPriority, Announcement, AreaStatus, AuditLog, DisasterArea, DonationStatus, Grid,
    GridBounds, GridDiscussion, GridStatus, GridType, SupplyDonation, SupplyNeed, User,
    UserPermission, VolunteerRegistration,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shovel_authz::{GrantType, PermissionSpec, RegistrationStatus, Role, UserStatus};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub service: String,
    pub api_version: String,
    pub storage_backend: String,
    pub durable_storage: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DisasterAreaRequest {
    pub name: String,
    pub county: Option<String>,
    pub township: Option<String>,
    pub description: Option<String>,
    pub center_lat: Option<f64>,
    pub center_lng: Option<f64>,
    #[serde(default)]
    pub status: Option<AreaStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DisasterAreaListResponse {
    pub items: Vec<DisasterArea>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct GridRequest {
    pub disaster_area_id: Uuid,
    pub code: String,
    pub grid_type: GridType,
    #[serde(default)]
    pub status: Option<GridStatus>,
    #[serde(default)]
    pub volunteer_needed: i32,
    pub meeting_point: Option<String>,
    pub risks_notes: Option<String>,
    pub contact_info: Option<String>,
    #[serde(default)]
    pub supplies_needed: Vec<SupplyNeed>,
    pub center_lat: Option<f64>,
    pub center_lng: Option<f64>,
    pub bounds: Option<GridBounds>,
    pub grid_manager_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct GridListResponse {
    pub items: Vec<Grid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RegistrationCreateRequest {
    pub grid_id: Uuid,
    pub volunteer_name: String,
    pub volunteer_phone: Option<String>,
    pub available_time: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub notes: Option<String>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct RegistrationUpdateRequest {
    pub status: Option<RegistrationStatus>,
    pub volunteer_name: Option<String>,
    pub volunteer_phone: Option<String>,
    pub available_time: Option<String>,
    pub skills: Option<Vec<String>>,
    pub equipment: Option<Vec<String>>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RegistrationListResponse {
    pub items: Vec<VolunteerRegistration>,
}

/// Public view of a registration with contact data masked as needed.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct VolunteerView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub volunteer_name: String,
    pub volunteer_phone: Option<String>,
    pub status: RegistrationStatus,
    pub available_time: Option<String>,
    pub skills: Vec<String>,
    pub equipment: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct VolunteersResponse {
    pub grid_id: Uuid,
    pub items: Vec<VolunteerView>,
    pub total: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub can_view_phone: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DonationCreateRequest {
    pub grid_id: Uuid,
    pub donor_name: String,
    pub donor_phone: Option<String>,
    pub supply_name: String,
    pub quantity: i32,
    pub unit: String,
    pub delivery_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct DonationUpdateRequest {
    pub donor_name: Option<String>,
    pub donor_phone: Option<String>,
    pub supply_name: Option<String>,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub delivery_method: Option<String>,
    pub status: Option<DonationStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DonationListResponse {
    pub items: Vec<SupplyDonation>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DiscussionCreateRequest {
    pub grid_id: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DiscussionUpdateRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DiscussionListResponse {
    pub items: Vec<GridDiscussion>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AnnouncementRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub priority: Option<AnnouncementPriority>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AnnouncementListResponse {
    pub items: Vec<Announcement>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserListResponse {
    pub items: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct UserAccessRequest {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct MyPermissionsResponse {
    pub user_id: Uuid,
    pub role: Role,
    #[schema(value_type = Vec<String>, example = json!(["grids:read"]))]
    pub permissions: Vec<shovel_authz::Permission>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct PermissionCatalogResponse {
    pub items: Vec<PermissionSpec>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct PermissionChangeRequest {
    #[schema(example = "audit_logs:read")]
    pub permission: String,
    pub grant_type: GrantType,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserPermissionListResponse {
    pub items: Vec<UserPermission>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AuditLogListResponse {
    pub items: Vec<AuditLog>,
}
