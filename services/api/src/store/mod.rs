//! Storage abstraction for the relief API.
//!
//! Every method that touches a row-secured table takes the caller's
//! [`RlsContext`]. Identity lookups (users, role policies, permission
//! overrides) run unscoped because the request guard needs them before a
//! context exists.
use crate::model::{
    Announcement, AuditEntry, AuditLog, AuditQuery, DisasterArea, Grid, GridDiscussion,
    SupplyDonation, User, UserPermission, VolunteerRegistration,
};
use async_trait::async_trait;
use shovel_authz::{Permission, RegistrationStatus, RlsContext, Role, RolePolicy, UserStatus};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// A row policy rejected the write.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The row changed status between read and compare-and-set.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";
const SQLSTATE_FOREIGN_KEY_VIOLATION: &str = "23503";
const SQLSTATE_INSUFFICIENT_PRIVILEGE: &str = "42501";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(SQLSTATE_UNIQUE_VIOLATION) => StoreError::Conflict(db_err.message().to_string()),
                Some(SQLSTATE_FOREIGN_KEY_VIOLATION) => {
                    StoreError::NotFound(db_err.message().to_string())
                }
                Some(SQLSTATE_INSUFFICIENT_PRIVILEGE) => {
                    StoreError::Forbidden(db_err.message().to_string())
                }
                _ => StoreError::Unexpected(err.into()),
            },
            _ => StoreError::Unexpected(err.into()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

/// Filters shared by the per-grid list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub grid_id: Option<Uuid>,
    pub limit: u32,
}

#[async_trait]
pub trait ReliefStore: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> StoreResult<User>;
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn list_users(&self, limit: u32) -> StoreResult<Vec<User>>;
    async fn update_user_access(
        &self,
        user_id: Uuid,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> StoreResult<User>;

    async fn list_role_policies(&self) -> StoreResult<Vec<RolePolicy>>;
    async fn list_user_permissions(&self, user_id: Uuid) -> StoreResult<Vec<UserPermission>>;
    /// Insert or replace the override for `(user_id, permission)`.
    async fn upsert_user_permission(&self, entry: UserPermission) -> StoreResult<UserPermission>;
    async fn delete_user_permission(&self, user_id: Uuid, permission: Permission)
    -> StoreResult<()>;

    async fn list_disaster_areas(
        &self,
        ctx: &RlsContext,
        limit: u32,
    ) -> StoreResult<Vec<DisasterArea>>;
    async fn get_disaster_area(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<DisasterArea>;
    async fn create_disaster_area(
        &self,
        ctx: &RlsContext,
        area: DisasterArea,
    ) -> StoreResult<DisasterArea>;
    async fn update_disaster_area(
        &self,
        ctx: &RlsContext,
        area: DisasterArea,
    ) -> StoreResult<DisasterArea>;
    async fn delete_disaster_area(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()>;

    async fn list_grids(
        &self,
        ctx: &RlsContext,
        disaster_area_id: Option<Uuid>,
        limit: u32,
    ) -> StoreResult<Vec<Grid>>;
    async fn get_grid(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<Grid>;
    async fn create_grid(&self, ctx: &RlsContext, grid: Grid) -> StoreResult<Grid>;
    async fn update_grid(&self, ctx: &RlsContext, grid: Grid) -> StoreResult<Grid>;
    async fn delete_grid(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()>;

    async fn list_registrations(
        &self,
        ctx: &RlsContext,
        filter: ListFilter,
    ) -> StoreResult<Vec<VolunteerRegistration>>;
    /// Registrations for a grid regardless of row policy; callers mask contact data.
    async fn list_grid_volunteers(
        &self,
        grid_id: Uuid,
        limit: u32,
    ) -> StoreResult<Vec<VolunteerRegistration>>;
    async fn get_registration(
        &self,
        ctx: &RlsContext,
        id: Uuid,
    ) -> StoreResult<VolunteerRegistration>;
    async fn create_registration(
        &self,
        ctx: &RlsContext,
        registration: VolunteerRegistration,
    ) -> StoreResult<VolunteerRegistration>;
    /// Replace the row only if its stored status still equals `expected_status`.
    async fn update_registration(
        &self,
        ctx: &RlsContext,
        registration: VolunteerRegistration,
        expected_status: RegistrationStatus,
    ) -> StoreResult<VolunteerRegistration>;
    async fn delete_registration(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()>;

    async fn list_donations(
        &self,
        ctx: &RlsContext,
        filter: ListFilter,
    ) -> StoreResult<Vec<SupplyDonation>>;
    async fn get_donation(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<SupplyDonation>;
    async fn create_donation(
        &self,
        ctx: &RlsContext,
        donation: SupplyDonation,
    ) -> StoreResult<SupplyDonation>;
    async fn update_donation(
        &self,
        ctx: &RlsContext,
        donation: SupplyDonation,
    ) -> StoreResult<SupplyDonation>;
    async fn delete_donation(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()>;

    async fn list_discussions(
        &self,
        ctx: &RlsContext,
        filter: ListFilter,
    ) -> StoreResult<Vec<GridDiscussion>>;
    async fn get_discussion(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<GridDiscussion>;
    async fn create_discussion(
        &self,
        ctx: &RlsContext,
        discussion: GridDiscussion,
    ) -> StoreResult<GridDiscussion>;
    async fn update_discussion(
        &self,
        ctx: &RlsContext,
        discussion: GridDiscussion,
    ) -> StoreResult<GridDiscussion>;
    async fn delete_discussion(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()>;

    async fn list_announcements(
        &self,
        ctx: &RlsContext,
        limit: u32,
    ) -> StoreResult<Vec<Announcement>>;
    async fn get_announcement(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<Announcement>;
    async fn create_announcement(
        &self,
        ctx: &RlsContext,
        announcement: Announcement,
    ) -> StoreResult<Announcement>;
    async fn update_announcement(
        &self,
        ctx: &RlsContext,
        announcement: Announcement,
    ) -> StoreResult<Announcement>;
    async fn delete_announcement(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()>;

    async fn append_audit(&self, ctx: &RlsContext, entry: AuditEntry) -> StoreResult<()>;
    async fn list_audit_logs(
        &self,
        ctx: &RlsContext,
        query: AuditQuery,
    ) -> StoreResult<Vec<AuditLog>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
