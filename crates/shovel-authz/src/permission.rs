//! Permission grammar, catalog, and seeded role grants.
//!
//! # Purpose
//! Defines strongly typed `resource:action` permissions and the default
//! role→permission table. The same rows are seeded by the SQL migrations so
//! the memory and Postgres backends resolve identically.
//!
//! # Key invariants
//! - Permission strings are `resource:action`, both halves snake_case.
//! - `manage` implies every other action on the same resource.
//!
//! # Examples
//! ```rust
//! use shovel_authz::{Action, Permission, Resource};
//!
//! let parsed: Permission = "audit_logs:read".parse().expect("permission");
//! assert_eq!(parsed, Permission::new(Resource::AuditLogs, Action::Read));
//! assert!(parsed.is_high_risk());
//! ```
use crate::{AuthzError, AuthzResult, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    DisasterAreas,
    Grids,
    VolunteerRegistrations,
    SupplyDonations,
    GridDiscussions,
    Announcements,
    Users,
    Permissions,
    AuditLogs,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::DisasterAreas,
        Resource::Grids,
        Resource::VolunteerRegistrations,
        Resource::SupplyDonations,
        Resource::GridDiscussions,
        Resource::Announcements,
        Resource::Users,
        Resource::Permissions,
        Resource::AuditLogs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::DisasterAreas => "disaster_areas",
            Resource::Grids => "grids",
            Resource::VolunteerRegistrations => "volunteer_registrations",
            Resource::SupplyDonations => "supply_donations",
            Resource::GridDiscussions => "grid_discussions",
            Resource::Announcements => "announcements",
            Resource::Users => "users",
            Resource::Permissions => "permissions",
            Resource::AuditLogs => "audit_logs",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resource {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        Resource::ALL
            .into_iter()
            .find(|resource| resource.as_str() == value)
            .ok_or_else(|| AuthzError::InvalidResource(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Read,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Manage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }

    /// True when holding `self` satisfies a request for `requested`.
    pub fn covers(self, requested: Action) -> bool {
        self == Action::Manage || self == requested
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AuthzError::InvalidAction(value.to_string()))
    }
}

/// A single `resource:action` permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    pub fn covers(&self, requested: &Permission) -> bool {
        self.resource == requested.resource && self.action.covers(requested.action)
    }

    /// Permissions whose use is always written to the audit log.
    pub fn is_high_risk(&self) -> bool {
        match (self.resource, self.action) {
            (Resource::Permissions, _) => true,
            (Resource::Users, Action::Update | Action::Delete | Action::Manage) => true,
            (Resource::AuditLogs, Action::Read | Action::Manage) => true,
            (Resource::DisasterAreas | Resource::Grids, Action::Delete | Action::Manage) => true,
            _ => false,
        }
    }

    pub fn parse(value: &str) -> AuthzResult<Self> {
        value.parse()
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl std::str::FromStr for Permission {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        let (resource, action) = value
            .split_once(':')
            .ok_or_else(|| AuthzError::InvalidPermission(value.to_string()))?;
        Ok(Self::new(resource.parse()?, action.parse()?))
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Catalog entry as exposed by `GET /v1/permissions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionSpec {
    pub name: String,
    pub resource: Resource,
    pub action: Action,
    pub description: String,
    pub high_risk: bool,
}

impl PermissionSpec {
    pub fn permission(&self) -> Permission {
        Permission::new(self.resource, self.action)
    }
}

pub fn permission_catalog() -> Vec<PermissionSpec> {
    let mut specs = Vec::with_capacity(Resource::ALL.len() * Action::ALL.len());
    for resource in Resource::ALL {
        for action in Action::ALL {
            let permission = Permission::new(resource, action);
            specs.push(PermissionSpec {
                name: permission.to_string(),
                resource,
                action,
                description: format!("{} {}", action, resource.as_str().replace('_', " ")),
                high_risk: permission.is_high_risk(),
            });
        }
    }
    specs
}

const USER_GRANTS: &[(Resource, Action)] = &[
    (Resource::DisasterAreas, Action::Read),
    (Resource::Grids, Action::Read),
    (Resource::VolunteerRegistrations, Action::Read),
    (Resource::VolunteerRegistrations, Action::Create),
    (Resource::VolunteerRegistrations, Action::Update),
    (Resource::VolunteerRegistrations, Action::Delete),
    (Resource::SupplyDonations, Action::Read),
    (Resource::SupplyDonations, Action::Create),
    (Resource::SupplyDonations, Action::Update),
    (Resource::SupplyDonations, Action::Delete),
    (Resource::GridDiscussions, Action::Read),
    (Resource::GridDiscussions, Action::Create),
    (Resource::GridDiscussions, Action::Update),
    (Resource::GridDiscussions, Action::Delete),
    (Resource::Announcements, Action::Read),
];

const GRID_MANAGER_GRANTS: &[(Resource, Action)] = &[
    (Resource::Grids, Action::Create),
    (Resource::Grids, Action::Update),
];

const ADMIN_GRANTS: &[(Resource, Action)] = &[
    (Resource::DisasterAreas, Action::Manage),
    (Resource::Grids, Action::Manage),
    (Resource::VolunteerRegistrations, Action::Manage),
    (Resource::SupplyDonations, Action::Manage),
    (Resource::GridDiscussions, Action::Manage),
    (Resource::Announcements, Action::Manage),
    (Resource::Users, Action::Read),
    (Resource::Users, Action::Update),
    (Resource::Permissions, Action::Read),
    (Resource::AuditLogs, Action::Read),
];

/// Seeded role grants; each role inherits the grants of the roles below it.
pub fn default_role_permissions(role: Role) -> Vec<Permission> {
    let tiers: &[&[(Resource, Action)]] = match role {
        Role::User => &[USER_GRANTS],
        Role::GridManager => &[USER_GRANTS, GRID_MANAGER_GRANTS],
        Role::Admin => &[USER_GRANTS, GRID_MANAGER_GRANTS, ADMIN_GRANTS],
        Role::SuperAdmin => {
            return Resource::ALL
                .into_iter()
                .map(|resource| Permission::new(resource, Action::Manage))
                .collect();
        }
    };
    let mut perms: Vec<Permission> = tiers
        .iter()
        .flat_map(|tier| tier.iter())
        .map(|(resource, action)| Permission::new(*resource, *action))
        .collect();
    perms.sort();
    perms.dedup();
    perms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_parse_and_render() {
        let parsed = Permission::parse("volunteer_registrations:create").expect("parse");
        assert_eq!(parsed.resource, Resource::VolunteerRegistrations);
        assert_eq!(parsed.action, Action::Create);
        assert_eq!(parsed.to_string(), "volunteer_registrations:create");
    }

    #[test]
    fn permission_parse_rejects_malformed_input() {
        assert!(matches!(
            Permission::parse("grids"),
            Err(AuthzError::InvalidPermission(_))
        ));
        assert!(matches!(
            Permission::parse("tanks:read"),
            Err(AuthzError::InvalidResource(_))
        ));
        assert!(matches!(
            Permission::parse("grids:fly"),
            Err(AuthzError::InvalidAction(_))
        ));
    }

    #[test]
    fn manage_covers_every_action_on_same_resource() {
        let manage = Permission::new(Resource::Grids, Action::Manage);
        for action in Action::ALL {
            assert!(manage.covers(&Permission::new(Resource::Grids, action)));
        }
        assert!(!manage.covers(&Permission::new(Resource::Users, Action::Read)));
        let read = Permission::new(Resource::Grids, Action::Read);
        assert!(!read.covers(&Permission::new(Resource::Grids, Action::Update)));
    }

    #[test]
    fn high_risk_classification() {
        assert!(Permission::new(Resource::Permissions, Action::Read).is_high_risk());
        assert!(Permission::new(Resource::Users, Action::Update).is_high_risk());
        assert!(Permission::new(Resource::Grids, Action::Delete).is_high_risk());
        assert!(!Permission::new(Resource::Users, Action::Read).is_high_risk());
        assert!(!Permission::new(Resource::Grids, Action::Update).is_high_risk());
    }

    #[test]
    fn catalog_covers_every_resource_action_pair() {
        let catalog = permission_catalog();
        assert_eq!(catalog.len(), Resource::ALL.len() * Action::ALL.len());
        let audit = catalog
            .iter()
            .find(|spec| spec.name == "audit_logs:read")
            .expect("audit read");
        assert!(audit.high_risk);
    }

    #[test]
    fn role_grants_are_cumulative() {
        let user = default_role_permissions(Role::User);
        let manager = default_role_permissions(Role::GridManager);
        let admin = default_role_permissions(Role::Admin);
        assert!(user.iter().all(|perm| manager.contains(perm)));
        assert!(manager.iter().all(|perm| admin.contains(perm)));
        assert!(!user.contains(&Permission::new(Resource::Grids, Action::Create)));
        assert!(manager.contains(&Permission::new(Resource::Grids, Action::Create)));
        assert!(!admin.contains(&Permission::new(Resource::Permissions, Action::Manage)));
    }

    #[test]
    fn super_admin_manages_everything() {
        let perms = default_role_permissions(Role::SuperAdmin);
        assert_eq!(perms.len(), Resource::ALL.len());
        assert!(perms.iter().all(|perm| perm.action == Action::Manage));
    }
}
