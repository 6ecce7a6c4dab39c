//! OpenAPI schema aggregation for the relief API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document served
//! at `/v1/openapi.json` and rendered at `/docs`.
use crate::api::{
    announcements, audit_logs, disaster_areas, discussions, donations, grids, permissions,
    registrations, system,
    types::{
        AnnouncementListResponse, AnnouncementRequest, AuditLogListResponse,
        DisasterAreaListResponse, DisasterAreaRequest, DiscussionCreateRequest,
        DiscussionListResponse, DiscussionUpdateRequest, DonationCreateRequest,
        DonationListResponse, DonationUpdateRequest, ErrorResponse, GridListResponse, GridRequest,
        HealthStatus, MyPermissionsResponse, PermissionCatalogResponse, PermissionChangeRequest,
        RegistrationCreateRequest, RegistrationListResponse, RegistrationUpdateRequest,
        SystemInfo, UserAccessRequest, UserListResponse, UserPermissionListResponse,
        VolunteerView, VolunteersResponse,
    },
    users, volunteers,
};
use crate::model::{
    Announcement, AnnouncementPriority, AreaStatus, AuditEntry, AuditLog, DisasterArea, DonationStatus,
    Grid, GridBounds, GridDiscussion, GridStatus, GridType, SupplyDonation, SupplyNeed, User,
    UserPermission, VolunteerRegistration,
};
use shovel_authz::{Action, GrantType, PermissionSpec, RegistrationStatus, Resource, Role, UserStatus};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "shovel-api",
        version = "v1",
        description = "Shovel Heroes relief coordination HTTP API"
    ),
    paths(
        system::system_info,
        system::system_health,
        users::me,
        users::my_permissions,
        users::list_users,
        users::update_user_access,
        disaster_areas::list_disaster_areas,
        disaster_areas::get_disaster_area,
        disaster_areas::create_disaster_area,
        disaster_areas::update_disaster_area,
        disaster_areas::delete_disaster_area,
        grids::list_grids,
        grids::get_grid,
        grids::create_grid,
        grids::update_grid,
        grids::delete_grid,
        registrations::list_registrations,
        registrations::create_registration,
        registrations::update_registration,
        registrations::delete_registration,
        volunteers::list_volunteers,
        donations::list_donations,
        donations::create_donation,
        donations::update_donation,
        donations::delete_donation,
        discussions::list_discussions,
        discussions::create_discussion,
        discussions::update_discussion,
        discussions::delete_discussion,
        announcements::list_announcements,
        announcements::get_announcement,
        announcements::create_announcement,
        announcements::update_announcement,
        announcements::delete_announcement,
        permissions::list_permission_catalog,
        permissions::list_user_permissions,
        permissions::change_user_permission,
        permissions::delete_user_permission,
        audit_logs::list_audit_logs
    ),
    components(schemas(
        SystemInfo,
        HealthStatus,
        ErrorResponse,
        User,
        Role,
        UserStatus,
        UserListResponse,
        UserAccessRequest,
        MyPermissionsResponse,
        DisasterArea,
        AreaStatus,
        DisasterAreaRequest,
        DisasterAreaListResponse,
        Grid,
        GridType,
        GridStatus,
        GridBounds,
        SupplyNeed,
        GridRequest,
        GridListResponse,
        VolunteerRegistration,
        RegistrationStatus,
        RegistrationCreateRequest,
        RegistrationUpdateRequest,
        RegistrationListResponse,
        VolunteerView,
        VolunteersResponse,
        SupplyDonation,
        DonationStatus,
        DonationCreateRequest,
        DonationUpdateRequest,
        DonationListResponse,
        GridDiscussion,
        DiscussionCreateRequest,
        DiscussionUpdateRequest,
        DiscussionListResponse,
        Announcement,
        AnnouncementPriority,
        AnnouncementRequest,
        AnnouncementListResponse,
        Resource,
        Action,
        PermissionSpec,
        GrantType,
        UserPermission,
        PermissionCatalogResponse,
        PermissionChangeRequest,
        UserPermissionListResponse,
        AuditEntry,
        AuditLog,
        AuditLogListResponse
    )),
    tags(
        (name = "system", description = "System and discovery endpoints"),
        (name = "users", description = "Caller identity and user administration"),
        (name = "disaster_areas", description = "Disaster areas"),
        (name = "grids", description = "Work grids inside a disaster area"),
        (name = "volunteer_registrations", description = "Volunteer sign-ups and status changes"),
        (name = "volunteers", description = "Public volunteer rosters"),
        (name = "supply_donations", description = "Supply pledges"),
        (name = "grid_discussions", description = "Per-grid discussion posts"),
        (name = "announcements", description = "Public announcements"),
        (name = "permissions", description = "Permission catalog and per-user overrides"),
        (name = "audit_logs", description = "Security audit trail")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/v1/system/info",
            "/v1/me/permissions",
            "/v1/grids/{id}",
            "/v1/volunteer-registrations/{id}",
            "/v1/volunteers",
            "/v1/users/{id}/permissions/{permission}",
            "/v1/audit-logs",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }
}
