//! Roles, account status, and the role allow-list gate.
//!
//! # Key invariants
//! - String forms are snake_case and match the `users.role` CHECK constraint.
//! - `SuperAdmin` passes every gate that names at least one role.
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    GridManager,
    User,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::GridManager, Role::User];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::GridManager => "grid_manager",
            Role::User => "user",
        }
    }

    /// Admin-class roles bypass ownership checks in row policies.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        match value {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "grid_manager" => Ok(Role::GridManager),
            "user" => Ok(Role::User),
            other => Err(AuthzError::InvalidRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        match value {
            "active" => Ok(UserStatus::Active),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(AuthzError::InvalidStatus(other.to_string())),
        }
    }
}

/// Role allow-list checked before any permission lookup.
///
/// An empty list admits every authenticated role; route tables use it for
/// endpoints that only need a known user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGate {
    roles: &'static [Role],
}

impl RoleGate {
    pub const ANY: RoleGate = RoleGate { roles: &[] };
    pub const ADMINS: RoleGate = RoleGate {
        roles: &[Role::SuperAdmin, Role::Admin],
    };
    pub const MANAGERS: RoleGate = RoleGate {
        roles: &[Role::SuperAdmin, Role::Admin, Role::GridManager],
    };
    pub const SUPER_ADMIN: RoleGate = RoleGate {
        roles: &[Role::SuperAdmin],
    };

    pub const fn new(roles: &'static [Role]) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &'static [Role] {
        self.roles
    }

    pub fn allows(&self, role: Role) -> bool {
        if self.roles.is_empty() {
            return true;
        }
        role == Role::SuperAdmin || self.roles.contains(&role)
    }
}
