//! Row-level security session context and the row policies it drives.
//!
//! # Purpose
//! [`RlsContext`] is what the API hands to storage for every scoped call. The
//! Postgres backend turns it into `set_config('app.user_id', …, true)` and
//! `set_config('app.user_role', …, true)` inside the request transaction; the
//! SQL policies read those settings back. The in-memory backend evaluates
//! [`policy_allows`] instead, which mirrors the SQL policy set row for row.
//!
//! # Key invariants
//! - Settings are transaction-local. A context never leaks to the next user of
//!   a pooled connection.
//! - An anonymous context sets both variables to the empty string, which the
//!   SQL helpers read as NULL.
use crate::Role;
use uuid::Uuid;

pub const SESSION_USER_ID: &str = "app.user_id";
pub const SESSION_USER_ROLE: &str = "app.user_role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RlsContext {
    pub user_id: Option<Uuid>,
    pub role: Option<Role>,
}

impl RlsContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role: Some(role),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(Role::is_admin)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    fn is(&self, other: Option<Uuid>) -> bool {
        matches!((self.user_id, other), (Some(current), Some(other)) if current == other)
    }

    /// `(setting, value)` pairs in the order they are applied.
    pub fn session_settings(&self) -> [(&'static str, String); 2] {
        [
            (
                SESSION_USER_ID,
                self.user_id.map(|id| id.to_string()).unwrap_or_default(),
            ),
            (
                SESSION_USER_ROLE,
                self.role.map(|role| role.as_str().to_string()).unwrap_or_default(),
            ),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    DisasterAreas,
    Announcements,
    Grids,
    VolunteerRegistrations,
    SupplyDonations,
    GridDiscussions,
    AuditLogs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Select,
    Insert,
    Update,
    Delete,
}

/// Row attributes the policies look at.
///
/// `owner_id` is the row's user column (registration `user_id`, donation
/// `donor_id`, discussion `author_id`); `grid_manager_id` is the manager of the
/// grid the row belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowFacts {
    pub owner_id: Option<Uuid>,
    pub grid_manager_id: Option<Uuid>,
}

impl RowFacts {
    pub fn owned_by(owner_id: Uuid) -> Self {
        Self {
            owner_id: Some(owner_id),
            grid_manager_id: None,
        }
    }

    pub fn with_grid_manager(mut self, manager: Option<Uuid>) -> Self {
        self.grid_manager_id = manager;
        self
    }
}

pub fn policy_allows(ctx: &RlsContext, table: Table, command: Command, facts: &RowFacts) -> bool {
    let admin = ctx.is_admin();
    let owner = ctx.is(facts.owner_id);
    let manager = ctx.is(facts.grid_manager_id);
    match (table, command) {
        (Table::DisasterAreas | Table::Announcements, Command::Select) => true,
        (Table::DisasterAreas | Table::Announcements, _) => admin,

        (Table::Grids, Command::Select) => true,
        (Table::Grids, Command::Insert) => admin || ctx.role == Some(Role::GridManager),
        (Table::Grids, Command::Update) => admin || manager,
        (Table::Grids, Command::Delete) => admin,

        (Table::VolunteerRegistrations, Command::Select | Command::Update) => {
            admin || owner || manager
        }
        (Table::VolunteerRegistrations, Command::Insert | Command::Delete) => admin || owner,

        (Table::SupplyDonations, Command::Select) => true,
        (Table::SupplyDonations, Command::Insert) => admin || owner,
        (Table::SupplyDonations, Command::Update | Command::Delete) => admin || owner || manager,

        (Table::GridDiscussions, Command::Select) => true,
        (Table::GridDiscussions, Command::Insert) => owner,
        (Table::GridDiscussions, Command::Update) => admin || owner,
        (Table::GridDiscussions, Command::Delete) => admin || owner || manager,

        (Table::AuditLogs, Command::Select) => admin,
        (Table::AuditLogs, Command::Insert) => true,
        (Table::AuditLogs, Command::Update | Command::Delete) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_context_sets_empty_strings() {
        let settings = RlsContext::anonymous().session_settings();
        assert_eq!(settings[0], (SESSION_USER_ID, String::new()));
        assert_eq!(settings[1], (SESSION_USER_ROLE, String::new()));
    }

    #[test]
    fn user_context_renders_id_and_role() {
        let id = Uuid::new_v4();
        let settings = RlsContext::for_user(id, Role::GridManager).session_settings();
        assert_eq!(settings[0].1, id.to_string());
        assert_eq!(settings[1].1, "grid_manager");
    }

    #[test]
    fn registrations_visible_to_owner_manager_and_admin_only() {
        let owner = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let facts = RowFacts::owned_by(owner).with_grid_manager(Some(manager));
        let table = Table::VolunteerRegistrations;

        assert!(policy_allows(&RlsContext::for_user(owner, Role::User), table, Command::Select, &facts));
        assert!(policy_allows(
            &RlsContext::for_user(manager, Role::GridManager),
            table,
            Command::Update,
            &facts
        ));
        assert!(policy_allows(
            &RlsContext::for_user(Uuid::new_v4(), Role::Admin),
            table,
            Command::Select,
            &facts
        ));
        assert!(!policy_allows(
            &RlsContext::for_user(Uuid::new_v4(), Role::User),
            table,
            Command::Select,
            &facts
        ));
        assert!(!policy_allows(&RlsContext::anonymous(), table, Command::Select, &facts));
        assert!(!policy_allows(
            &RlsContext::for_user(manager, Role::GridManager),
            table,
            Command::Delete,
            &facts
        ));
    }

    #[test]
    fn insert_requires_acting_as_self() {
        let me = Uuid::new_v4();
        let ctx = RlsContext::for_user(me, Role::User);
        assert!(policy_allows(
            &ctx,
            Table::VolunteerRegistrations,
            Command::Insert,
            &RowFacts::owned_by(me)
        ));
        assert!(!policy_allows(
            &ctx,
            Table::VolunteerRegistrations,
            Command::Insert,
            &RowFacts::owned_by(Uuid::new_v4())
        ));
        assert!(!policy_allows(
            &ctx,
            Table::GridDiscussions,
            Command::Insert,
            &RowFacts::owned_by(Uuid::new_v4())
        ));
    }

    #[test]
    fn grid_writes_follow_role_and_manager() {
        let manager = Uuid::new_v4();
        let facts = RowFacts::default().with_grid_manager(Some(manager));
        let other_manager = RlsContext::for_user(Uuid::new_v4(), Role::GridManager);
        assert!(policy_allows(&other_manager, Table::Grids, Command::Insert, &facts));
        assert!(!policy_allows(&other_manager, Table::Grids, Command::Update, &facts));
        assert!(policy_allows(
            &RlsContext::for_user(manager, Role::GridManager),
            Table::Grids,
            Command::Update,
            &facts
        ));
        assert!(!policy_allows(
            &RlsContext::for_user(manager, Role::GridManager),
            Table::Grids,
            Command::Delete,
            &facts
        ));
    }

    #[test]
    fn audit_logs_are_admin_readable_and_append_only() {
        let facts = RowFacts::default();
        let admin = RlsContext::for_user(Uuid::new_v4(), Role::SuperAdmin);
        assert!(policy_allows(&admin, Table::AuditLogs, Command::Select, &facts));
        assert!(!policy_allows(&admin, Table::AuditLogs, Command::Delete, &facts));
        assert!(policy_allows(&RlsContext::anonymous(), Table::AuditLogs, Command::Insert, &facts));
        assert!(!policy_allows(
            &RlsContext::for_user(Uuid::new_v4(), Role::GridManager),
            Table::AuditLogs,
            Command::Select,
            &facts
        ));
    }
}
