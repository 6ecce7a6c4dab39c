//! In-memory implementation of the relief store.
//!
//! # Purpose
//! Backs local development and the HTTP test suite without a database. Each
//! table is a `HashMap` behind a `tokio::sync::RwLock`.
//!
//! # Row security
//! Postgres enforces row policies itself. Here every scoped call evaluates
//! [`policy_allows`] with the caller's [`RlsContext`] so both backends return
//! the same outcomes:
//! - rows the select policy hides are `NotFound`;
//! - a visible row the write policy rejects is `Forbidden`;
//! - a written row that fails the policy check is `Forbidden`.
//!
//! # Lock order
//! `disaster_areas` → `grids` → child tables. Mutations that touch several
//! tables take their write locks in that order.
use super::{ListFilter, ReliefStore, StoreError, StoreResult};
use crate::model::{
    Announcement, AuditEntry, AuditLog, AuditQuery, DisasterArea, Grid, GridDiscussion,
    SupplyDonation, User, UserPermission, VolunteerRegistration,
};
use async_trait::async_trait;
use chrono::Utc;
use shovel_authz::rls::{Command, RowFacts, Table, policy_allows};
use shovel_authz::{
    Permission, RegistrationStatus, RlsContext, Role, RolePolicy, UserStatus,
    default_role_permissions,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    role_policies: RwLock<Vec<RolePolicy>>,
    user_permissions: RwLock<HashMap<(Uuid, Permission), UserPermission>>,
    disaster_areas: RwLock<HashMap<Uuid, DisasterArea>>,
    grids: RwLock<HashMap<Uuid, Grid>>,
    registrations: RwLock<HashMap<Uuid, VolunteerRegistration>>,
    donations: RwLock<HashMap<Uuid, SupplyDonation>>,
    discussions: RwLock<HashMap<Uuid, GridDiscussion>>,
    announcements: RwLock<HashMap<Uuid, Announcement>>,
    audit_logs: RwLock<Vec<AuditLog>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store seeded with the default role grants.
    pub fn new() -> Self {
        let policies = Role::ALL
            .into_iter()
            .flat_map(|role| {
                default_role_permissions(role)
                    .into_iter()
                    .map(move |permission| RolePolicy { role, permission })
            })
            .collect();
        Self {
            users: RwLock::new(HashMap::new()),
            role_policies: RwLock::new(policies),
            user_permissions: RwLock::new(HashMap::new()),
            disaster_areas: RwLock::new(HashMap::new()),
            grids: RwLock::new(HashMap::new()),
            registrations: RwLock::new(HashMap::new()),
            donations: RwLock::new(HashMap::new()),
            discussions: RwLock::new(HashMap::new()),
            announcements: RwLock::new(HashMap::new()),
            audit_logs: RwLock::new(Vec::new()),
        }
    }
}

fn not_found(what: &str) -> StoreError {
    StoreError::NotFound(format!("{what} not found"))
}

fn require(
    ctx: &RlsContext,
    table: Table,
    command: Command,
    facts: &RowFacts,
    what: &str,
) -> StoreResult<()> {
    if policy_allows(ctx, table, command, facts) {
        Ok(())
    } else {
        Err(StoreError::Forbidden(format!(
            "row policy rejects {command:?} on {what}"
        )))
    }
}

/// Run the select policy, then the write policy against the stored row and
/// the replacement row.
fn check_write(
    ctx: &RlsContext,
    table: Table,
    command: Command,
    stored: Option<RowFacts>,
    replacement: Option<RowFacts>,
    what: &str,
) -> StoreResult<()> {
    let stored = stored.ok_or_else(|| not_found(what))?;
    if !policy_allows(ctx, table, Command::Select, &stored) {
        return Err(not_found(what));
    }
    require(ctx, table, command, &stored, what)?;
    if let Some(replacement) = replacement {
        require(ctx, table, command, &replacement, what)?;
    }
    Ok(())
}

fn manager_of(grids: &HashMap<Uuid, Grid>, grid_id: Uuid) -> Option<Uuid> {
    grids.get(&grid_id).and_then(|grid| grid.grid_manager_id)
}

fn grid_facts(grid: &Grid) -> RowFacts {
    RowFacts::default().with_grid_manager(grid.grid_manager_id)
}

fn take_limited<T: Clone>(mut rows: Vec<T>, limit: u32) -> Vec<T> {
    rows.truncate(limit as usize);
    rows
}

fn recount_volunteers(
    grids: &mut HashMap<Uuid, Grid>,
    registrations: &HashMap<Uuid, VolunteerRegistration>,
    grid_id: Uuid,
) {
    let count = registrations
        .values()
        .filter(|row| row.grid_id == grid_id && row.status.counts_toward_grid())
        .count() as i32;
    if let Some(grid) = grids.get_mut(&grid_id) {
        grid.volunteer_registered = count;
    }
}

/// Drop every row that hangs off the given grids.
async fn cascade_grid_children(store: &InMemoryStore, grid_ids: &[Uuid]) {
    store
        .registrations
        .write()
        .await
        .retain(|_, row| !grid_ids.contains(&row.grid_id));
    store
        .donations
        .write()
        .await
        .retain(|_, row| !grid_ids.contains(&row.grid_id));
    store
        .discussions
        .write()
        .await
        .retain(|_, row| !grid_ids.contains(&row.grid_id));
}

#[async_trait]
impl ReliefStore for InMemoryStore {
    async fn get_user(&self, user_id: Uuid) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or_else(|| not_found("user"))
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(StoreError::Conflict("user exists".into()));
        }
        if let Some(email) = user.email.as_deref() {
            if users.values().any(|other| other.email.as_deref() == Some(email)) {
                return Err(StoreError::Conflict("email already registered".into()));
            }
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_users(&self, limit: u32) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(take_limited(users, limit))
    }

    async fn update_user_access(
        &self,
        user_id: Uuid,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> StoreResult<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&user_id).ok_or_else(|| not_found("user"))?;
        if let Some(role) = role {
            user.role = role;
        }
        if let Some(status) = status {
            user.status = status;
        }
        Ok(user.clone())
    }

    async fn list_role_policies(&self) -> StoreResult<Vec<RolePolicy>> {
        Ok(self.role_policies.read().await.clone())
    }

    async fn list_user_permissions(&self, user_id: Uuid) -> StoreResult<Vec<UserPermission>> {
        let mut rows: Vec<UserPermission> = self
            .user_permissions
            .read()
            .await
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.permission);
        Ok(rows)
    }

    async fn upsert_user_permission(&self, entry: UserPermission) -> StoreResult<UserPermission> {
        if !self.users.read().await.contains_key(&entry.user_id) {
            return Err(not_found("user"));
        }
        self.user_permissions
            .write()
            .await
            .insert((entry.user_id, entry.permission), entry.clone());
        Ok(entry)
    }

    async fn delete_user_permission(
        &self,
        user_id: Uuid,
        permission: Permission,
    ) -> StoreResult<()> {
        self.user_permissions
            .write()
            .await
            .remove(&(user_id, permission))
            .map(|_| ())
            .ok_or_else(|| not_found("permission override"))
    }

    async fn list_disaster_areas(
        &self,
        ctx: &RlsContext,
        limit: u32,
    ) -> StoreResult<Vec<DisasterArea>> {
        let mut rows: Vec<DisasterArea> = self
            .disaster_areas
            .read()
            .await
            .values()
            .filter(|_| policy_allows(ctx, Table::DisasterAreas, Command::Select, &RowFacts::default()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(take_limited(rows, limit))
    }

    async fn get_disaster_area(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<DisasterArea> {
        self.disaster_areas
            .read()
            .await
            .get(&id)
            .filter(|_| policy_allows(ctx, Table::DisasterAreas, Command::Select, &RowFacts::default()))
            .cloned()
            .ok_or_else(|| not_found("disaster area"))
    }

    async fn create_disaster_area(
        &self,
        ctx: &RlsContext,
        area: DisasterArea,
    ) -> StoreResult<DisasterArea> {
        require(
            ctx,
            Table::DisasterAreas,
            Command::Insert,
            &RowFacts::default(),
            "disaster area",
        )?;
        let mut areas = self.disaster_areas.write().await;
        if areas.contains_key(&area.id) {
            return Err(StoreError::Conflict("disaster area exists".into()));
        }
        areas.insert(area.id, area.clone());
        Ok(area)
    }

    async fn update_disaster_area(
        &self,
        ctx: &RlsContext,
        mut area: DisasterArea,
    ) -> StoreResult<DisasterArea> {
        let mut areas = self.disaster_areas.write().await;
        let stored = areas.get(&area.id).map(|_| RowFacts::default());
        check_write(
            ctx,
            Table::DisasterAreas,
            Command::Update,
            stored,
            None,
            "disaster area",
        )?;
        if let Some(existing) = areas.get(&area.id) {
            area.created_at = existing.created_at;
        }
        area.updated_at = Utc::now();
        areas.insert(area.id, area.clone());
        Ok(area)
    }

    async fn delete_disaster_area(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        let mut areas = self.disaster_areas.write().await;
        let stored = areas.get(&id).map(|_| RowFacts::default());
        check_write(
            ctx,
            Table::DisasterAreas,
            Command::Delete,
            stored,
            None,
            "disaster area",
        )?;
        areas.remove(&id);
        let removed: Vec<Uuid> = {
            let mut grids = self.grids.write().await;
            let ids: Vec<Uuid> = grids
                .values()
                .filter(|grid| grid.disaster_area_id == id)
                .map(|grid| grid.id)
                .collect();
            grids.retain(|_, grid| grid.disaster_area_id != id);
            ids
        };
        cascade_grid_children(self, &removed).await;
        Ok(())
    }

    async fn list_grids(
        &self,
        ctx: &RlsContext,
        disaster_area_id: Option<Uuid>,
        limit: u32,
    ) -> StoreResult<Vec<Grid>> {
        let mut rows: Vec<Grid> = self
            .grids
            .read()
            .await
            .values()
            .filter(|grid| disaster_area_id.is_none_or(|area| grid.disaster_area_id == area))
            .filter(|grid| policy_allows(ctx, Table::Grids, Command::Select, &grid_facts(grid)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code).then(a.id.cmp(&b.id)));
        Ok(take_limited(rows, limit))
    }

    async fn get_grid(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<Grid> {
        self.grids
            .read()
            .await
            .get(&id)
            .filter(|grid| policy_allows(ctx, Table::Grids, Command::Select, &grid_facts(grid)))
            .cloned()
            .ok_or_else(|| not_found("grid"))
    }

    async fn create_grid(&self, ctx: &RlsContext, mut grid: Grid) -> StoreResult<Grid> {
        require(ctx, Table::Grids, Command::Insert, &grid_facts(&grid), "grid")?;
        let areas = self.disaster_areas.read().await;
        if !areas.contains_key(&grid.disaster_area_id) {
            return Err(not_found("disaster area"));
        }
        let mut grids = self.grids.write().await;
        if grids.values().any(|other| {
            other.id == grid.id
                || (other.disaster_area_id == grid.disaster_area_id && other.code == grid.code)
        }) {
            return Err(StoreError::Conflict("grid code already used in area".into()));
        }
        grid.volunteer_registered = 0;
        grids.insert(grid.id, grid.clone());
        Ok(grid)
    }

    async fn update_grid(&self, ctx: &RlsContext, mut grid: Grid) -> StoreResult<Grid> {
        let mut grids = self.grids.write().await;
        let stored = grids.get(&grid.id).map(grid_facts);
        check_write(
            ctx,
            Table::Grids,
            Command::Update,
            stored,
            Some(grid_facts(&grid)),
            "grid",
        )?;
        if grids.values().any(|other| {
            other.id != grid.id
                && other.disaster_area_id == grid.disaster_area_id
                && other.code == grid.code
        }) {
            return Err(StoreError::Conflict("grid code already used in area".into()));
        }
        if let Some(existing) = grids.get(&grid.id) {
            grid.volunteer_registered = existing.volunteer_registered;
            grid.created_at = existing.created_at;
        }
        grid.updated_at = Utc::now();
        grids.insert(grid.id, grid.clone());
        Ok(grid)
    }

    async fn delete_grid(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        {
            let mut grids = self.grids.write().await;
            let stored = grids.get(&id).map(grid_facts);
            check_write(ctx, Table::Grids, Command::Delete, stored, None, "grid")?;
            grids.remove(&id);
        }
        cascade_grid_children(self, &[id]).await;
        Ok(())
    }

    async fn list_registrations(
        &self,
        ctx: &RlsContext,
        filter: ListFilter,
    ) -> StoreResult<Vec<VolunteerRegistration>> {
        let grids = self.grids.read().await;
        let mut rows: Vec<VolunteerRegistration> = self
            .registrations
            .read()
            .await
            .values()
            .filter(|row| filter.grid_id.is_none_or(|grid_id| row.grid_id == grid_id))
            .filter(|row| {
                let facts = RowFacts::owned_by(row.user_id)
                    .with_grid_manager(manager_of(&grids, row.grid_id));
                policy_allows(ctx, Table::VolunteerRegistrations, Command::Select, &facts)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(take_limited(rows, filter.limit))
    }

    async fn list_grid_volunteers(
        &self,
        grid_id: Uuid,
        limit: u32,
    ) -> StoreResult<Vec<VolunteerRegistration>> {
        let mut rows: Vec<VolunteerRegistration> = self
            .registrations
            .read()
            .await
            .values()
            .filter(|row| row.grid_id == grid_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(take_limited(rows, limit))
    }

    async fn get_registration(
        &self,
        ctx: &RlsContext,
        id: Uuid,
    ) -> StoreResult<VolunteerRegistration> {
        let grids = self.grids.read().await;
        self.registrations
            .read()
            .await
            .get(&id)
            .filter(|row| {
                let facts = RowFacts::owned_by(row.user_id)
                    .with_grid_manager(manager_of(&grids, row.grid_id));
                policy_allows(ctx, Table::VolunteerRegistrations, Command::Select, &facts)
            })
            .cloned()
            .ok_or_else(|| not_found("registration"))
    }

    async fn create_registration(
        &self,
        ctx: &RlsContext,
        registration: VolunteerRegistration,
    ) -> StoreResult<VolunteerRegistration> {
        let mut grids = self.grids.write().await;
        if !grids.contains_key(&registration.grid_id) {
            return Err(not_found("grid"));
        }
        let facts = RowFacts::owned_by(registration.user_id)
            .with_grid_manager(manager_of(&grids, registration.grid_id));
        require(
            ctx,
            Table::VolunteerRegistrations,
            Command::Insert,
            &facts,
            "registration",
        )?;
        let mut registrations = self.registrations.write().await;
        if registrations.values().any(|other| {
            other.id == registration.id
                || (other.grid_id == registration.grid_id
                    && other.user_id == registration.user_id
                    && other.status != RegistrationStatus::Cancelled)
        }) {
            return Err(StoreError::Conflict(
                "volunteer already registered for grid".into(),
            ));
        }
        registrations.insert(registration.id, registration.clone());
        recount_volunteers(&mut grids, &registrations, registration.grid_id);
        Ok(registration)
    }

    async fn update_registration(
        &self,
        ctx: &RlsContext,
        mut registration: VolunteerRegistration,
        expected_status: RegistrationStatus,
    ) -> StoreResult<VolunteerRegistration> {
        let mut grids = self.grids.write().await;
        let mut registrations = self.registrations.write().await;
        let stored = registrations.get(&registration.id).cloned();
        let stored_facts = stored.as_ref().map(|row| {
            RowFacts::owned_by(row.user_id).with_grid_manager(manager_of(&grids, row.grid_id))
        });
        let new_facts = RowFacts::owned_by(registration.user_id)
            .with_grid_manager(manager_of(&grids, registration.grid_id));
        check_write(
            ctx,
            Table::VolunteerRegistrations,
            Command::Update,
            stored_facts,
            Some(new_facts),
            "registration",
        )?;
        let Some(stored) = stored else {
            return Err(not_found("registration"));
        };
        if stored.status != expected_status {
            return Err(StoreError::InvalidTransition(format!(
                "registration is {} not {}",
                stored.status, expected_status
            )));
        }
        if registration.status != RegistrationStatus::Cancelled
            && registrations.values().any(|other| {
                other.id != registration.id
                    && other.grid_id == registration.grid_id
                    && other.user_id == registration.user_id
                    && other.status != RegistrationStatus::Cancelled
            })
        {
            return Err(StoreError::Conflict(
                "volunteer already registered for grid".into(),
            ));
        }
        registration.created_at = stored.created_at;
        registration.updated_at = Utc::now();
        registrations.insert(registration.id, registration.clone());
        recount_volunteers(&mut grids, &registrations, stored.grid_id);
        if stored.grid_id != registration.grid_id {
            recount_volunteers(&mut grids, &registrations, registration.grid_id);
        }
        Ok(registration)
    }

    async fn delete_registration(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        let mut grids = self.grids.write().await;
        let mut registrations = self.registrations.write().await;
        let stored = registrations.get(&id).cloned();
        let facts = stored.as_ref().map(|row| {
            RowFacts::owned_by(row.user_id).with_grid_manager(manager_of(&grids, row.grid_id))
        });
        check_write(
            ctx,
            Table::VolunteerRegistrations,
            Command::Delete,
            facts,
            None,
            "registration",
        )?;
        if let Some(removed) = registrations.remove(&id) {
            recount_volunteers(&mut grids, &registrations, removed.grid_id);
        }
        Ok(())
    }

    async fn list_donations(
        &self,
        ctx: &RlsContext,
        filter: ListFilter,
    ) -> StoreResult<Vec<SupplyDonation>> {
        let grids = self.grids.read().await;
        let mut rows: Vec<SupplyDonation> = self
            .donations
            .read()
            .await
            .values()
            .filter(|row| filter.grid_id.is_none_or(|grid_id| row.grid_id == grid_id))
            .filter(|row| {
                let facts = RowFacts::owned_by(row.donor_id)
                    .with_grid_manager(manager_of(&grids, row.grid_id));
                policy_allows(ctx, Table::SupplyDonations, Command::Select, &facts)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(take_limited(rows, filter.limit))
    }

    async fn get_donation(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<SupplyDonation> {
        let grids = self.grids.read().await;
        self.donations
            .read()
            .await
            .get(&id)
            .filter(|row| {
                let facts = RowFacts::owned_by(row.donor_id)
                    .with_grid_manager(manager_of(&grids, row.grid_id));
                policy_allows(ctx, Table::SupplyDonations, Command::Select, &facts)
            })
            .cloned()
            .ok_or_else(|| not_found("donation"))
    }

    async fn create_donation(
        &self,
        ctx: &RlsContext,
        donation: SupplyDonation,
    ) -> StoreResult<SupplyDonation> {
        let grids = self.grids.read().await;
        if !grids.contains_key(&donation.grid_id) {
            return Err(not_found("grid"));
        }
        let facts = RowFacts::owned_by(donation.donor_id)
            .with_grid_manager(manager_of(&grids, donation.grid_id));
        require(ctx, Table::SupplyDonations, Command::Insert, &facts, "donation")?;
        let mut donations = self.donations.write().await;
        if donations.contains_key(&donation.id) {
            return Err(StoreError::Conflict("donation exists".into()));
        }
        donations.insert(donation.id, donation.clone());
        Ok(donation)
    }

    async fn update_donation(
        &self,
        ctx: &RlsContext,
        mut donation: SupplyDonation,
    ) -> StoreResult<SupplyDonation> {
        let grids = self.grids.read().await;
        let mut donations = self.donations.write().await;
        let stored = donations.get(&donation.id).cloned();
        let stored_facts = stored.as_ref().map(|row| {
            RowFacts::owned_by(row.donor_id).with_grid_manager(manager_of(&grids, row.grid_id))
        });
        let new_facts = RowFacts::owned_by(donation.donor_id)
            .with_grid_manager(manager_of(&grids, donation.grid_id));
        check_write(
            ctx,
            Table::SupplyDonations,
            Command::Update,
            stored_facts,
            Some(new_facts),
            "donation",
        )?;
        if let Some(stored) = stored {
            donation.created_at = stored.created_at;
        }
        donations.insert(donation.id, donation.clone());
        Ok(donation)
    }

    async fn delete_donation(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        let grids = self.grids.read().await;
        let mut donations = self.donations.write().await;
        let facts = donations.get(&id).map(|row| {
            RowFacts::owned_by(row.donor_id).with_grid_manager(manager_of(&grids, row.grid_id))
        });
        check_write(
            ctx,
            Table::SupplyDonations,
            Command::Delete,
            facts,
            None,
            "donation",
        )?;
        donations.remove(&id);
        Ok(())
    }

    async fn list_discussions(
        &self,
        ctx: &RlsContext,
        filter: ListFilter,
    ) -> StoreResult<Vec<GridDiscussion>> {
        let grids = self.grids.read().await;
        let mut rows: Vec<GridDiscussion> = self
            .discussions
            .read()
            .await
            .values()
            .filter(|row| filter.grid_id.is_none_or(|grid_id| row.grid_id == grid_id))
            .filter(|row| {
                let facts = RowFacts::owned_by(row.author_id)
                    .with_grid_manager(manager_of(&grids, row.grid_id));
                policy_allows(ctx, Table::GridDiscussions, Command::Select, &facts)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(take_limited(rows, filter.limit))
    }

    async fn get_discussion(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<GridDiscussion> {
        let grids = self.grids.read().await;
        self.discussions
            .read()
            .await
            .get(&id)
            .filter(|row| {
                let facts = RowFacts::owned_by(row.author_id)
                    .with_grid_manager(manager_of(&grids, row.grid_id));
                policy_allows(ctx, Table::GridDiscussions, Command::Select, &facts)
            })
            .cloned()
            .ok_or_else(|| not_found("discussion"))
    }

    async fn create_discussion(
        &self,
        ctx: &RlsContext,
        discussion: GridDiscussion,
    ) -> StoreResult<GridDiscussion> {
        let grids = self.grids.read().await;
        if !grids.contains_key(&discussion.grid_id) {
            return Err(not_found("grid"));
        }
        let facts = RowFacts::owned_by(discussion.author_id)
            .with_grid_manager(manager_of(&grids, discussion.grid_id));
        require(ctx, Table::GridDiscussions, Command::Insert, &facts, "discussion")?;
        let mut discussions = self.discussions.write().await;
        if discussions.contains_key(&discussion.id) {
            return Err(StoreError::Conflict("discussion exists".into()));
        }
        discussions.insert(discussion.id, discussion.clone());
        Ok(discussion)
    }

    async fn update_discussion(
        &self,
        ctx: &RlsContext,
        mut discussion: GridDiscussion,
    ) -> StoreResult<GridDiscussion> {
        let grids = self.grids.read().await;
        let mut discussions = self.discussions.write().await;
        let stored = discussions.get(&discussion.id).cloned();
        let stored_facts = stored.as_ref().map(|row| {
            RowFacts::owned_by(row.author_id).with_grid_manager(manager_of(&grids, row.grid_id))
        });
        let new_facts = RowFacts::owned_by(discussion.author_id)
            .with_grid_manager(manager_of(&grids, discussion.grid_id));
        check_write(
            ctx,
            Table::GridDiscussions,
            Command::Update,
            stored_facts,
            Some(new_facts),
            "discussion",
        )?;
        if let Some(stored) = stored {
            discussion.created_at = stored.created_at;
        }
        discussion.updated_at = Utc::now();
        discussions.insert(discussion.id, discussion.clone());
        Ok(discussion)
    }

    async fn delete_discussion(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        let grids = self.grids.read().await;
        let mut discussions = self.discussions.write().await;
        let facts = discussions.get(&id).map(|row| {
            RowFacts::owned_by(row.author_id).with_grid_manager(manager_of(&grids, row.grid_id))
        });
        check_write(
            ctx,
            Table::GridDiscussions,
            Command::Delete,
            facts,
            None,
            "discussion",
        )?;
        discussions.remove(&id);
        Ok(())
    }

    async fn list_announcements(
        &self,
        ctx: &RlsContext,
        limit: u32,
    ) -> StoreResult<Vec<Announcement>> {
        let mut rows: Vec<Announcement> = self
            .announcements
            .read()
            .await
            .values()
            .filter(|_| policy_allows(ctx, Table::Announcements, Command::Select, &RowFacts::default()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(take_limited(rows, limit))
    }

    async fn get_announcement(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<Announcement> {
        self.announcements
            .read()
            .await
            .get(&id)
            .filter(|_| policy_allows(ctx, Table::Announcements, Command::Select, &RowFacts::default()))
            .cloned()
            .ok_or_else(|| not_found("announcement"))
    }

    async fn create_announcement(
        &self,
        ctx: &RlsContext,
        announcement: Announcement,
    ) -> StoreResult<Announcement> {
        require(
            ctx,
            Table::Announcements,
            Command::Insert,
            &RowFacts::default(),
            "announcement",
        )?;
        let mut announcements = self.announcements.write().await;
        if announcements.contains_key(&announcement.id) {
            return Err(StoreError::Conflict("announcement exists".into()));
        }
        announcements.insert(announcement.id, announcement.clone());
        Ok(announcement)
    }

    async fn update_announcement(
        &self,
        ctx: &RlsContext,
        mut announcement: Announcement,
    ) -> StoreResult<Announcement> {
        let mut announcements = self.announcements.write().await;
        let stored = announcements.get(&announcement.id).cloned();
        check_write(
            ctx,
            Table::Announcements,
            Command::Update,
            stored.as_ref().map(|_| RowFacts::default()),
            None,
            "announcement",
        )?;
        if let Some(stored) = stored {
            announcement.created_at = stored.created_at;
        }
        announcement.updated_at = Utc::now();
        announcements.insert(announcement.id, announcement.clone());
        Ok(announcement)
    }

    async fn delete_announcement(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        let mut announcements = self.announcements.write().await;
        let stored = announcements.get(&id).map(|_| RowFacts::default());
        check_write(
            ctx,
            Table::Announcements,
            Command::Delete,
            stored,
            None,
            "announcement",
        )?;
        announcements.remove(&id);
        Ok(())
    }

    async fn append_audit(&self, ctx: &RlsContext, entry: AuditEntry) -> StoreResult<()> {
        require(
            ctx,
            Table::AuditLogs,
            Command::Insert,
            &RowFacts::default(),
            "audit log",
        )?;
        let mut logs = self.audit_logs.write().await;
        let id = logs.len() as i64 + 1;
        logs.push(AuditLog {
            id,
            entry,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_audit_logs(
        &self,
        ctx: &RlsContext,
        query: AuditQuery,
    ) -> StoreResult<Vec<AuditLog>> {
        if !policy_allows(ctx, Table::AuditLogs, Command::Select, &RowFacts::default()) {
            return Ok(Vec::new());
        }
        let rows = self
            .audit_logs
            .read()
            .await
            .iter()
            .rev()
            .filter(|log| {
                query
                    .action
                    .as_deref()
                    .is_none_or(|action| log.entry.action == action)
            })
            .filter(|log| query.user_id.is_none_or(|user_id| log.entry.user_id == Some(user_id)))
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AreaStatus, GridStatus, GridType};
    use shovel_authz::Role;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: format!("{role} user"),
            email: None,
            phone: None,
            role,
            status: UserStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn area() -> DisasterArea {
        let now = Utc::now();
        DisasterArea {
            id: Uuid::new_v4(),
            name: "Guangfu".to_string(),
            county: Some("Hualien".to_string()),
            township: None,
            description: None,
            center_lat: Some(23.66),
            center_lng: Some(121.42),
            status: AreaStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn grid(area_id: Uuid, code: &str, manager: Option<Uuid>) -> Grid {
        let now = Utc::now();
        Grid {
            id: Uuid::new_v4(),
            disaster_area_id: area_id,
            code: code.to_string(),
            grid_type: GridType::Manpower,
            status: GridStatus::Open,
            volunteer_needed: 10,
            volunteer_registered: 0,
            meeting_point: None,
            risks_notes: None,
            contact_info: None,
            supplies_needed: Vec::new(),
            center_lat: None,
            center_lng: None,
            bounds: None,
            grid_manager_id: manager,
            created_at: now,
            updated_at: now,
        }
    }

    fn registration(grid_id: Uuid, user_id: Uuid) -> VolunteerRegistration {
        let now = Utc::now();
        VolunteerRegistration {
            id: Uuid::new_v4(),
            grid_id,
            user_id,
            volunteer_name: "Volunteer".to_string(),
            volunteer_phone: Some("0912345678".to_string()),
            status: RegistrationStatus::Pending,
            available_time: None,
            skills: vec!["shovel".to_string()],
            equipment: Vec::new(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct Fixture {
        store: InMemoryStore,
        admin: RlsContext,
        manager_id: Uuid,
        grid_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let admin_user = user(Role::Admin);
        let manager = user(Role::GridManager);
        let admin = RlsContext::for_user(admin_user.id, Role::Admin);
        let area = store
            .create_disaster_area(&admin, area())
            .await
            .expect("area");
        let grid = store
            .create_grid(&admin, grid(area.id, "A-1", Some(manager.id)))
            .await
            .expect("grid");
        Fixture {
            store,
            admin,
            manager_id: manager.id,
            grid_id: grid.id,
        }
    }

    #[tokio::test]
    async fn non_admin_cannot_write_disaster_areas() {
        let store = InMemoryStore::new();
        let ctx = RlsContext::for_user(Uuid::new_v4(), Role::GridManager);
        let err = store.create_disaster_area(&ctx, area()).await.expect_err("denied");
        assert!(matches!(err, StoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn registrations_are_hidden_from_other_volunteers() {
        let fx = fixture().await;
        let owner = Uuid::new_v4();
        let owner_ctx = RlsContext::for_user(owner, Role::User);
        let created = fx
            .store
            .create_registration(&owner_ctx, registration(fx.grid_id, owner))
            .await
            .expect("create");

        let stranger = RlsContext::for_user(Uuid::new_v4(), Role::User);
        let err = fx
            .store
            .get_registration(&stranger, created.id)
            .await
            .expect_err("hidden");
        assert!(matches!(err, StoreError::NotFound(_)));
        let listed = fx
            .store
            .list_registrations(
                &stranger,
                ListFilter {
                    grid_id: Some(fx.grid_id),
                    limit: 10,
                },
            )
            .await
            .expect("list");
        assert!(listed.is_empty());

        let manager = RlsContext::for_user(fx.manager_id, Role::GridManager);
        assert!(fx.store.get_registration(&manager, created.id).await.is_ok());
        assert!(fx.store.get_registration(&fx.admin, created.id).await.is_ok());
    }

    #[tokio::test]
    async fn registering_for_someone_else_is_forbidden() {
        let fx = fixture().await;
        let ctx = RlsContext::for_user(Uuid::new_v4(), Role::User);
        let err = fx
            .store
            .create_registration(&ctx, registration(fx.grid_id, Uuid::new_v4()))
            .await
            .expect_err("forbidden");
        assert!(matches!(err, StoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn volunteer_count_tracks_non_cancelled_registrations() {
        let fx = fixture().await;
        let owner = Uuid::new_v4();
        let ctx = RlsContext::for_user(owner, Role::User);
        let created = fx
            .store
            .create_registration(&ctx, registration(fx.grid_id, owner))
            .await
            .expect("create");
        let grid = fx.store.get_grid(&ctx, fx.grid_id).await.expect("grid");
        assert_eq!(grid.volunteer_registered, 1);

        let mut cancelled = created.clone();
        cancelled.status = RegistrationStatus::Cancelled;
        fx.store
            .update_registration(&ctx, cancelled, RegistrationStatus::Pending)
            .await
            .expect("cancel");
        let grid = fx.store.get_grid(&ctx, fx.grid_id).await.expect("grid");
        assert_eq!(grid.volunteer_registered, 0);

        fx.store
            .create_registration(&ctx, registration(fx.grid_id, owner))
            .await
            .expect("re-register after cancel");
        let grid = fx.store.get_grid(&ctx, fx.grid_id).await.expect("grid");
        assert_eq!(grid.volunteer_registered, 1);
    }

    #[tokio::test]
    async fn duplicate_active_registration_conflicts() {
        let fx = fixture().await;
        let owner = Uuid::new_v4();
        let ctx = RlsContext::for_user(owner, Role::User);
        fx.store
            .create_registration(&ctx, registration(fx.grid_id, owner))
            .await
            .expect("first");
        let err = fx
            .store
            .create_registration(&ctx, registration(fx.grid_id, owner))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn stale_status_is_rejected() {
        let fx = fixture().await;
        let owner = Uuid::new_v4();
        let ctx = RlsContext::for_user(owner, Role::User);
        let created = fx
            .store
            .create_registration(&ctx, registration(fx.grid_id, owner))
            .await
            .expect("create");
        let mut next = created.clone();
        next.status = RegistrationStatus::Arrived;
        let err = fx
            .store
            .update_registration(&ctx, next, RegistrationStatus::Confirmed)
            .await
            .expect_err("stale");
        assert!(matches!(err, StoreError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn grid_update_limited_to_its_manager() {
        let fx = fixture().await;
        let other = RlsContext::for_user(Uuid::new_v4(), Role::GridManager);
        let mut grid = fx.store.get_grid(&other, fx.grid_id).await.expect("visible");
        grid.meeting_point = Some("Station".to_string());
        let err = fx
            .store
            .update_grid(&other, grid.clone())
            .await
            .expect_err("not manager");
        assert!(matches!(err, StoreError::Forbidden(_)));

        let manager = RlsContext::for_user(fx.manager_id, Role::GridManager);
        let updated = fx.store.update_grid(&manager, grid).await.expect("manager");
        assert_eq!(updated.meeting_point.as_deref(), Some("Station"));
    }

    #[tokio::test]
    async fn deleting_area_cascades_to_grids_and_children() {
        let fx = fixture().await;
        let owner = Uuid::new_v4();
        let ctx = RlsContext::for_user(owner, Role::User);
        fx.store
            .create_registration(&ctx, registration(fx.grid_id, owner))
            .await
            .expect("create");
        let grid = fx.store.get_grid(&ctx, fx.grid_id).await.expect("grid");
        fx.store
            .delete_disaster_area(&fx.admin, grid.disaster_area_id)
            .await
            .expect("delete");
        assert!(fx.store.get_grid(&ctx, fx.grid_id).await.is_err());
        assert!(
            fx.store
                .list_grid_volunteers(fx.grid_id, 10)
                .await
                .expect("list")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn audit_logs_visible_to_admins_only() {
        let store = InMemoryStore::new();
        store
            .append_audit(
                &RlsContext::anonymous(),
                AuditEntry {
                    action: "access_denied".to_string(),
                    ..AuditEntry::default()
                },
            )
            .await
            .expect("append");
        let query = AuditQuery {
            limit: 10,
            ..AuditQuery::default()
        };
        let admin = RlsContext::for_user(Uuid::new_v4(), Role::Admin);
        assert_eq!(
            store.list_audit_logs(&admin, query.clone()).await.expect("list").len(),
            1
        );
        let user = RlsContext::for_user(Uuid::new_v4(), Role::User);
        assert!(store.list_audit_logs(&user, query).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn seeded_role_policies_present() {
        let store = InMemoryStore::new();
        let policies = store.list_role_policies().await.expect("policies");
        assert!(policies.iter().any(|policy| policy.role == Role::User));
        assert!(policies.iter().any(|policy| policy.role == Role::SuperAdmin));
    }
}
