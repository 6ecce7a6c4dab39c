//! Shovel Heroes authorization primitives shared by the API service and its tests.
//!
//! # Purpose
//! Centralizes the role model, the `resource:action` permission grammar, the
//! permission resolver (role policies overlaid with per-user grant/revoke rows),
//! the row-level-security session context, the volunteer registration state
//! machine, and JWT helpers.
//!
//! # How it fits
//! The API service authenticates a bearer token with [`TokenVerifier`], loads the
//! user and their overrides from storage, resolves [`EffectivePermissions`], and
//! hands an [`RlsContext`] to the store so Postgres policies (or the in-memory
//! emulation in [`rls::policy_allows`]) filter rows per request.
//!
//! # Key invariants
//! - Role names and permission strings are snake_case and stable; they are
//!   persisted in the database and must match the migration seed data.
//! - A revoke override always beats a grant override, which beats the role.
//! - `manage` implies every other action on the same resource.
//!
//! # Examples
//! ```rust
//! use shovel_authz::{Action, Permission, Resource};
//!
//! let perm = Permission::new(Resource::Grids, Action::Update);
//! assert_eq!(perm.to_string(), "grids:update");
//! ```

mod casbin_model;
mod errors;
mod permission;
pub mod registration;
mod resolver;
pub mod rls;
mod role;
mod token;

pub use casbin_model::{casbin_model, casbin_model_string};
pub use errors::{AuthzError, AuthzResult};
pub use permission::{
    Action, Permission, PermissionSpec, Resource, default_role_permissions, permission_catalog,
};
pub use registration::RegistrationStatus;
pub use resolver::{EffectivePermissions, GrantType, PermissionOverride, RolePolicy};
pub use rls::RlsContext;
pub use role::{Role, RoleGate, UserStatus};
pub use token::{Claims, TokenIssuer, TokenVerifier};
