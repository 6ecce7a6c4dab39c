//! Effective-permission resolution.
//!
//! Role policies are evaluated through an in-memory Casbin enforcer; per-user
//! override rows are layered on top. Precedence: an active revoke, then an
//! active grant, then the role decision.
use crate::{AuthzError, AuthzResult, Permission, Role, casbin_model, permission_catalog};
use casbin::{CoreApi, Enforcer, MemoryAdapter, MgmtApi};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;

/// One `role_permissions` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    pub role: Role,
    pub permission: Permission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    Grant,
    Revoke,
}

impl GrantType {
    pub fn as_str(self) -> &'static str {
        match self {
            GrantType::Grant => "grant",
            GrantType::Revoke => "revoke",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GrantType {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        match value {
            "grant" => Ok(GrantType::Grant),
            "revoke" => Ok(GrantType::Revoke),
            other => Err(AuthzError::InvalidGrantType(other.to_string())),
        }
    }
}

/// A per-user grant or revoke layered over the role policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOverride {
    pub permission: Permission,
    pub grant_type: GrantType,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PermissionOverride {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

fn user_subject(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

#[derive(Debug, Clone)]
pub struct EffectivePermissions {
    user_id: Uuid,
    role: Role,
    from_role: BTreeSet<Permission>,
    grants: Vec<Permission>,
    revokes: Vec<Permission>,
}

impl EffectivePermissions {
    /// Resolve a user's permissions at `now`.
    ///
    /// Expired overrides are dropped here, so the result is valid for the
    /// lifetime of one request.
    pub async fn resolve(
        user_id: Uuid,
        role: Role,
        policies: &[RolePolicy],
        overrides: &[PermissionOverride],
        now: DateTime<Utc>,
    ) -> AuthzResult<Self> {
        let mut enforcer = build_enforcer(policies).await?;
        let subject = user_subject(user_id);
        enforcer
            .add_grouping_policy(vec![subject.clone(), role.as_str().to_string()])
            .await?;
        enforcer.build_role_links()?;

        let mut from_role = BTreeSet::new();
        for spec in permission_catalog() {
            let allowed = enforcer.enforce((
                subject.as_str(),
                spec.resource.as_str(),
                spec.action.as_str(),
            ))?;
            if allowed {
                from_role.insert(spec.permission());
            }
        }

        let (grants, revokes) = overrides
            .iter()
            .filter(|entry| entry.is_active(now))
            .fold((Vec::new(), Vec::new()), |(mut grants, mut revokes), entry| {
                match entry.grant_type {
                    GrantType::Grant => grants.push(entry.permission),
                    GrantType::Revoke => revokes.push(entry.permission),
                }
                (grants, revokes)
            });

        tracing::debug!(
            %user_id,
            role = %role,
            role_permissions = from_role.len(),
            grants = grants.len(),
            revokes = revokes.len(),
            "resolved effective permissions"
        );

        Ok(Self {
            user_id,
            role,
            from_role,
            grants,
            revokes,
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn allows(&self, requested: &Permission) -> bool {
        if self.revokes.iter().any(|held| held.covers(requested)) {
            return false;
        }
        if self.grants.iter().any(|held| held.covers(requested)) {
            return true;
        }
        self.from_role.contains(requested)
    }

    /// Flattened, sorted effective set over the permission catalog.
    pub fn list(&self) -> Vec<Permission> {
        permission_catalog()
            .iter()
            .map(|spec| spec.permission())
            .filter(|permission| self.allows(permission))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

async fn build_enforcer(policies: &[RolePolicy]) -> AuthzResult<Enforcer> {
    let model = casbin_model().await?;
    let adapter = MemoryAdapter::default();
    let mut enforcer = Enforcer::new(model, adapter).await?;
    for policy in policies {
        enforcer
            .add_policy(vec![
                policy.role.as_str().to_string(),
                policy.permission.resource.as_str().to_string(),
                policy.permission.action.as_str().to_string(),
            ])
            .await?;
    }
    Ok(enforcer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, Resource, default_role_permissions};
    use chrono::Duration;

    fn seeded_policies() -> Vec<RolePolicy> {
        Role::ALL
            .into_iter()
            .flat_map(|role| {
                default_role_permissions(role)
                    .into_iter()
                    .map(move |permission| RolePolicy { role, permission })
            })
            .collect()
    }

    fn perm(resource: Resource, action: Action) -> Permission {
        Permission::new(resource, action)
    }

    #[tokio::test]
    async fn role_policies_drive_decisions() {
        let effective = EffectivePermissions::resolve(
            Uuid::new_v4(),
            Role::User,
            &seeded_policies(),
            &[],
            Utc::now(),
        )
        .await
        .expect("resolve");
        assert!(effective.allows(&perm(Resource::Grids, Action::Read)));
        assert!(!effective.allows(&perm(Resource::Grids, Action::Create)));
        assert!(!effective.allows(&perm(Resource::AuditLogs, Action::Read)));
    }

    #[tokio::test]
    async fn manage_policy_implies_concrete_actions() {
        let effective = EffectivePermissions::resolve(
            Uuid::new_v4(),
            Role::Admin,
            &seeded_policies(),
            &[],
            Utc::now(),
        )
        .await
        .expect("resolve");
        assert!(effective.allows(&perm(Resource::Announcements, Action::Delete)));
        assert!(effective.allows(&perm(Resource::Grids, Action::Manage)));
        assert!(!effective.allows(&perm(Resource::Permissions, Action::Manage)));
    }

    #[tokio::test]
    async fn revoke_beats_grant_and_role() {
        let target = perm(Resource::Grids, Action::Read);
        let overrides = vec![
            PermissionOverride {
                permission: target,
                grant_type: GrantType::Grant,
                expires_at: None,
            },
            PermissionOverride {
                permission: target,
                grant_type: GrantType::Revoke,
                expires_at: None,
            },
        ];
        let effective = EffectivePermissions::resolve(
            Uuid::new_v4(),
            Role::User,
            &seeded_policies(),
            &overrides,
            Utc::now(),
        )
        .await
        .expect("resolve");
        assert!(!effective.allows(&target));
        assert!(!effective.list().contains(&target));
    }

    #[tokio::test]
    async fn grant_extends_role_until_expiry() {
        let now = Utc::now();
        let audit = perm(Resource::AuditLogs, Action::Read);
        let users = perm(Resource::Users, Action::Read);
        let overrides = vec![
            PermissionOverride {
                permission: audit,
                grant_type: GrantType::Grant,
                expires_at: Some(now + Duration::hours(1)),
            },
            PermissionOverride {
                permission: users,
                grant_type: GrantType::Grant,
                expires_at: Some(now - Duration::seconds(1)),
            },
        ];
        let effective = EffectivePermissions::resolve(
            Uuid::new_v4(),
            Role::User,
            &seeded_policies(),
            &overrides,
            now,
        )
        .await
        .expect("resolve");
        assert!(effective.allows(&audit));
        assert!(!effective.allows(&users));
    }

    #[tokio::test]
    async fn expired_revoke_restores_role_grant() {
        let now = Utc::now();
        let target = perm(Resource::Grids, Action::Read);
        let overrides = vec![PermissionOverride {
            permission: target,
            grant_type: GrantType::Revoke,
            expires_at: Some(now - Duration::minutes(5)),
        }];
        let effective = EffectivePermissions::resolve(
            Uuid::new_v4(),
            Role::User,
            &seeded_policies(),
            &overrides,
            now,
        )
        .await
        .expect("resolve");
        assert!(effective.allows(&target));
    }

    #[tokio::test]
    async fn list_is_sorted_and_unique() {
        let effective = EffectivePermissions::resolve(
            Uuid::new_v4(),
            Role::GridManager,
            &seeded_policies(),
            &[],
            Utc::now(),
        )
        .await
        .expect("resolve");
        let listed = effective.list();
        let mut sorted = listed.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(listed, sorted);
        assert!(listed.contains(&perm(Resource::Grids, Action::Update)));
    }

    #[test]
    fn grant_type_parse() {
        assert_eq!("revoke".parse::<GrantType>().ok(), Some(GrantType::Revoke));
        assert!("maybe".parse::<GrantType>().is_err());
    }
}
