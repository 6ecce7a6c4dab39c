//! Postgres-backed implementation of the relief store.
//!
//! # Row security
//! Every scoped method runs inside [`PostgresStore::begin_scoped`]: one pooled
//! connection, one transaction, `SET LOCAL ROLE` to the restricted database
//! role, then `set_config('app.user_id', …, true)` and
//! `set_config('app.user_role', …, true)`. The policies in
//! `migrations/0003_row_security.sql` read those settings back. Because the
//! settings are transaction-local they vanish on commit or rollback and never
//! leak to the next borrower of the connection.
//!
//! Outcomes map as follows:
//! - a row the select policy hides is `NotFound`;
//! - an `UPDATE`/`DELETE` that matches nothing on a visible row is `Forbidden`;
//! - SQLSTATE 42501 (`WITH CHECK` failure) is `Forbidden`;
//! - SQLSTATE 23505 is `Conflict` and 23503 is `NotFound`.
//!
//! The pool user owns the tables and policies are not forced, so the owner is
//! exempt from them. Scoped transactions therefore always switch to the
//! restricted role. [`PostgresStore::connect`] creates that role when missing,
//! grants it table access, and refuses a role that is a superuser, has
//! `BYPASSRLS`, or owns the tables.
//!
//! # Unscoped reads
//! Identity lookups and [`ReliefStore::list_grid_volunteers`] use the pool
//! directly, as the table owner.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!("./migrations")`.
//! - Avoid logging the database URL; it may carry credentials.
use super::{ListFilter, ReliefStore, StoreError, StoreResult};
use crate::config::{PostgresConfig, is_valid_role_ident};
use crate::model::{
    AnnouncementPriority, AreaStatus, Announcement, AuditEntry, AuditLog, AuditQuery,
    DisasterArea, DonationStatus, Grid, GridBounds, GridDiscussion, GridStatus, GridType,
    SupplyDonation, SupplyNeed, User, UserPermission, VolunteerRegistration,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use shovel_authz::{
    GrantType, Permission, RegistrationStatus, RlsContext, Role, RolePolicy, UserStatus,
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

pub struct PostgresStore {
    pool: PgPool,
    rls_role: String,
}

const PROVISION_LOCK_KEY: i64 = 0x5348_4f56_454c;

/// Tables the restricted role reads and writes under row policies.
const SCOPED_TABLES: &str =
    "disaster_areas, grids, volunteer_registrations, supply_donations, grid_discussions, \
     announcements";
/// Identity tables the restricted role may read.
const IDENTITY_TABLES: &str = "users, permissions, role_permissions, user_permissions";

const USER_COLUMNS: &str = "id, name, email, phone, role, status, created_at";
const AREA_COLUMNS: &str = "id, name, county, township, description, center_lat, center_lng, \
     status, created_at, updated_at";
const GRID_COLUMNS: &str = "id, disaster_area_id, code, grid_type, status, volunteer_needed, \
     volunteer_registered, meeting_point, risks_notes, contact_info, supplies_needed, \
     center_lat, center_lng, bounds, grid_manager_id, created_at, updated_at";
const REGISTRATION_COLUMNS: &str = "id, grid_id, user_id, volunteer_name, volunteer_phone, \
     status, available_time, skills, equipment, notes, created_at, updated_at";
const DONATION_COLUMNS: &str = "id, grid_id, donor_id, donor_name, donor_phone, supply_name, \
     quantity, unit, delivery_method, status, notes, created_at";
const DISCUSSION_COLUMNS: &str =
    "id, grid_id, author_id, author_name, content, created_at, updated_at";
const ANNOUNCEMENT_COLUMNS: &str =
    "id, title, body, priority, author_id, created_at, updated_at";
const USER_PERMISSION_COLUMNS: &str =
    "user_id, permission_name, grant_type, granted_by, reason, expires_at, created_at";
const AUDIT_COLUMNS: &str = "id, user_id, user_role, action, resource, resource_id, reason, \
     ip_address, user_agent, metadata, created_at";

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbDisasterArea {
    id: Uuid,
    name: String,
    county: Option<String>,
    township: Option<String>,
    description: Option<String>,
    center_lat: Option<f64>,
    center_lng: Option<f64>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbGrid {
    id: Uuid,
    disaster_area_id: Uuid,
    code: String,
    grid_type: String,
    status: String,
    volunteer_needed: i32,
    volunteer_registered: i32,
    meeting_point: Option<String>,
    risks_notes: Option<String>,
    contact_info: Option<String>,
    supplies_needed: Value,
    center_lat: Option<f64>,
    center_lng: Option<f64>,
    bounds: Option<Value>,
    grid_manager_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbRegistration {
    id: Uuid,
    grid_id: Uuid,
    user_id: Uuid,
    volunteer_name: String,
    volunteer_phone: Option<String>,
    status: String,
    available_time: Option<String>,
    skills: Vec<String>,
    equipment: Vec<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbDonation {
    id: Uuid,
    grid_id: Uuid,
    donor_id: Uuid,
    donor_name: String,
    donor_phone: Option<String>,
    supply_name: String,
    quantity: i32,
    unit: String,
    delivery_method: Option<String>,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbDiscussion {
    id: Uuid,
    grid_id: Uuid,
    author_id: Uuid,
    author_name: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbAnnouncement {
    id: Uuid,
    title: String,
    body: String,
    priority: String,
    author_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbUserPermission {
    user_id: Uuid,
    permission_name: String,
    grant_type: String,
    granted_by: Option<Uuid>,
    reason: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbRolePolicy {
    role: String,
    permission_name: String,
}

#[derive(Debug, Clone, FromRow)]
struct DbAuditLog {
    id: i64,
    user_id: Option<Uuid>,
    user_role: Option<String>,
    action: String,
    resource: Option<String>,
    resource_id: Option<String>,
    reason: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: Value,
    created_at: DateTime<Utc>,
}

/// Tables whose rows are addressed by a UUID `id`. Names come from this list only.
#[derive(Debug, Clone, Copy)]
enum ScopedTable {
    DisasterAreas,
    Grids,
    VolunteerRegistrations,
    SupplyDonations,
    GridDiscussions,
    Announcements,
}

impl ScopedTable {
    fn name(self) -> &'static str {
        match self {
            ScopedTable::DisasterAreas => "disaster_areas",
            ScopedTable::Grids => "grids",
            ScopedTable::VolunteerRegistrations => "volunteer_registrations",
            ScopedTable::SupplyDonations => "supply_donations",
            ScopedTable::GridDiscussions => "grid_discussions",
            ScopedTable::Announcements => "announcements",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ScopedTable::DisasterAreas => "disaster area",
            ScopedTable::Grids => "grid",
            ScopedTable::VolunteerRegistrations => "registration",
            ScopedTable::SupplyDonations => "donation",
            ScopedTable::GridDiscussions => "discussion",
            ScopedTable::Announcements => "announcement",
        }
    }
}

impl PostgresStore {
    /// Connect, run migrations, and provision the restricted role.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, true).await
    }

    #[cfg(any(test, feature = "pg-tests"))]
    pub async fn connect_without_migrations(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, false).await
    }

    async fn connect_internal(pg: &PostgresConfig, run_migrations: bool) -> StoreResult<Self> {
        if !is_valid_role_ident(&pg.rls_role) {
            return Err(StoreError::Unexpected(anyhow!(
                "invalid rls_role identifier: {}",
                pg.rls_role
            )));
        }
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options);
        let pool = tokio::time::timeout(Duration::from_millis(pg.connect_timeout_ms), pool)
            .await
            .map_err(|_| StoreError::Unexpected(anyhow!("postgres connect timed out")))??;

        if run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
        }
        provision_rls_role(&pool, &pg.rls_role).await?;

        Ok(Self {
            pool,
            rls_role: pg.rls_role.clone(),
        })
    }

    /// Open a transaction carrying the caller's row-security context.
    pub async fn begin_scoped(
        &self,
        ctx: &RlsContext,
    ) -> StoreResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        // `rls_role` passed identifier validation at connect time.
        sqlx::query(&format!("SET LOCAL ROLE {}", self.rls_role))
            .execute(&mut *tx)
            .await?;
        for (setting, value) in ctx.session_settings() {
            sqlx::query("SELECT set_config($1, $2, true)")
                .bind(setting)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        Ok(tx)
    }

    /// Explain why a write matched no row: hidden (`NotFound`) or refused (`Forbidden`).
    async fn missed_write(
        tx: &mut Transaction<'static, Postgres>,
        table: ScopedTable,
        id: Uuid,
    ) -> StoreError {
        let query = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)", table.name());
        match sqlx::query_scalar::<_, bool>(&query)
            .bind(id)
            .fetch_one(&mut **tx)
            .await
        {
            Ok(true) => StoreError::Forbidden(format!(
                "row policy rejects write on {}",
                table.label()
            )),
            Ok(false) => StoreError::NotFound(format!("{} not found", table.label())),
            Err(err) => err.into(),
        }
    }

    async fn delete_scoped(&self, ctx: &RlsContext, table: ScopedTable, id: Uuid) -> StoreResult<()> {
        let mut tx = self.begin_scoped(ctx).await?;
        let query = format!("DELETE FROM {} WHERE id = $1", table.name());
        let result = sqlx::query(&query).bind(id).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(Self::missed_write(&mut tx, table, id).await);
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Create the restricted role when missing, make the pool user a member, and
/// grant it what scoped transactions need. `role` must already be a valid
/// identifier.
async fn provision_rls_role(pool: &PgPool, role: &str) -> StoreResult<()> {
    let mut tx = pool.begin().await?;
    // Serialise concurrent boots; GRANT on the same object can otherwise race.
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(PROVISION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!(
        "DO $$ BEGIN \
             IF NOT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = '{role}') THEN \
                 CREATE ROLE {role} NOLOGIN; \
                 GRANT {role} TO CURRENT_USER; \
             END IF; \
         END $$"
    ))
    .execute(&mut *tx)
    .await?;

    let member: bool = sqlx::query_scalar("SELECT pg_has_role(current_user, $1, 'MEMBER')")
        .bind(role)
        .fetch_one(&mut *tx)
        .await?;
    if !member {
        sqlx::query(&format!("GRANT {role} TO CURRENT_USER"))
            .execute(&mut *tx)
            .await?;
    }

    let (bypasses, owns_tables): (bool, bool) = sqlx::query_as(
        "SELECT r.rolsuper OR r.rolbypassrls, pg_get_userbyid(c.relowner) = r.rolname \
         FROM pg_roles r, pg_class c \
         WHERE r.rolname = $1 AND c.oid = 'volunteer_registrations'::regclass",
    )
    .bind(role)
    .fetch_one(&mut *tx)
    .await?;
    if bypasses || owns_tables {
        return Err(StoreError::Unexpected(anyhow!(
            "rls_role {role} is exempt from row policies; use a NOLOGIN role without \
             SUPERUSER or BYPASSRLS that does not own the tables"
        )));
    }

    let grants = [
        format!(
            "DO $$ BEGIN \
                 EXECUTE format('GRANT USAGE ON SCHEMA %I TO {role}', current_schema()); \
             END $$"
        ),
        format!("GRANT SELECT, INSERT, UPDATE, DELETE ON {SCOPED_TABLES} TO {role}"),
        format!("GRANT SELECT, INSERT ON audit_logs TO {role}"),
        format!("GRANT USAGE ON SEQUENCE audit_logs_id_seq TO {role}"),
        format!("GRANT SELECT ON {IDENTITY_TABLES} TO {role}"),
    ];
    for statement in grants {
        sqlx::query(&statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!(role, "provisioned row-security role");
    Ok(())
}

#[async_trait]
impl ReliefStore for PostgresStore {
    async fn get_user(&self, user_id: Uuid) -> StoreResult<User> {
        let row = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("user not found".into()))?;
        user_from_db(row)
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let row = sqlx::query_as::<_, DbUser>(&format!(
            "INSERT INTO users (id, name, email, phone, role, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;
        user_from_db(row)
    }

    async fn list_users(&self, limit: u32) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(user_from_db).collect()
    }

    async fn update_user_access(
        &self,
        user_id: Uuid,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> StoreResult<User> {
        let row = sqlx::query_as::<_, DbUser>(&format!(
            "UPDATE users SET role = COALESCE($2, role), status = COALESCE($3, status) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(role.map(Role::as_str))
        .bind(status.map(UserStatus::as_str))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("user not found".into()))?;
        user_from_db(row)
    }

    async fn list_role_policies(&self) -> StoreResult<Vec<RolePolicy>> {
        let rows = sqlx::query_as::<_, DbRolePolicy>(
            "SELECT role, permission_name FROM role_permissions ORDER BY role, permission_name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(RolePolicy {
                    role: parse_text(&row.role)?,
                    permission: parse_text(&row.permission_name)?,
                })
            })
            .collect()
    }

    async fn list_user_permissions(&self, user_id: Uuid) -> StoreResult<Vec<UserPermission>> {
        let rows = sqlx::query_as::<_, DbUserPermission>(&format!(
            "SELECT {USER_PERMISSION_COLUMNS} FROM user_permissions \
             WHERE user_id = $1 ORDER BY permission_name"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(user_permission_from_db).collect()
    }

    async fn upsert_user_permission(&self, entry: UserPermission) -> StoreResult<UserPermission> {
        let row = sqlx::query_as::<_, DbUserPermission>(&format!(
            "INSERT INTO user_permissions \
                 (user_id, permission_name, grant_type, granted_by, reason, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, permission_name) DO UPDATE SET \
                 grant_type = EXCLUDED.grant_type, granted_by = EXCLUDED.granted_by, \
                 reason = EXCLUDED.reason, expires_at = EXCLUDED.expires_at, \
                 created_at = EXCLUDED.created_at \
             RETURNING {USER_PERMISSION_COLUMNS}"
        ))
        .bind(entry.user_id)
        .bind(entry.permission.to_string())
        .bind(entry.grant_type.as_str())
        .bind(entry.granted_by)
        .bind(&entry.reason)
        .bind(entry.expires_at)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;
        user_permission_from_db(row)
    }

    async fn delete_user_permission(
        &self,
        user_id: Uuid,
        permission: Permission,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "DELETE FROM user_permissions WHERE user_id = $1 AND permission_name = $2",
        )
        .bind(user_id)
        .bind(permission.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("permission override not found".into()));
        }
        Ok(())
    }

    async fn list_disaster_areas(
        &self,
        ctx: &RlsContext,
        limit: u32,
    ) -> StoreResult<Vec<DisasterArea>> {
        let mut tx = self.begin_scoped(ctx).await?;
        let rows = sqlx::query_as::<_, DbDisasterArea>(&format!(
            "SELECT {AREA_COLUMNS} FROM disaster_areas ORDER BY created_at DESC, id LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.into_iter().map(area_from_db).collect()
    }

    async fn get_disaster_area(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<DisasterArea> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbDisasterArea>(&format!(
            "SELECT {AREA_COLUMNS} FROM disaster_areas WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        area_from_db(row.ok_or_else(|| StoreError::NotFound("disaster area not found".into()))?)
    }

    async fn create_disaster_area(
        &self,
        ctx: &RlsContext,
        area: DisasterArea,
    ) -> StoreResult<DisasterArea> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbDisasterArea>(&format!(
            "INSERT INTO disaster_areas \
                 (id, name, county, township, description, center_lat, center_lng, status, \
                  created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {AREA_COLUMNS}"
        ))
        .bind(area.id)
        .bind(&area.name)
        .bind(&area.county)
        .bind(&area.township)
        .bind(&area.description)
        .bind(area.center_lat)
        .bind(area.center_lng)
        .bind(area.status.as_str())
        .bind(area.created_at)
        .bind(area.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        area_from_db(row)
    }

    async fn update_disaster_area(
        &self,
        ctx: &RlsContext,
        area: DisasterArea,
    ) -> StoreResult<DisasterArea> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbDisasterArea>(&format!(
            "UPDATE disaster_areas SET name = $2, county = $3, township = $4, description = $5, \
                 center_lat = $6, center_lng = $7, status = $8, updated_at = now() \
             WHERE id = $1 RETURNING {AREA_COLUMNS}"
        ))
        .bind(area.id)
        .bind(&area.name)
        .bind(&area.county)
        .bind(&area.township)
        .bind(&area.description)
        .bind(area.center_lat)
        .bind(area.center_lng)
        .bind(area.status.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(Self::missed_write(&mut tx, ScopedTable::DisasterAreas, area.id).await);
        };
        tx.commit().await?;
        area_from_db(row)
    }

    async fn delete_disaster_area(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        self.delete_scoped(ctx, ScopedTable::DisasterAreas, id).await
    }

    async fn list_grids(
        &self,
        ctx: &RlsContext,
        disaster_area_id: Option<Uuid>,
        limit: u32,
    ) -> StoreResult<Vec<Grid>> {
        let mut tx = self.begin_scoped(ctx).await?;
        let rows = sqlx::query_as::<_, DbGrid>(&format!(
            "SELECT {GRID_COLUMNS} FROM grids \
             WHERE ($1::uuid IS NULL OR disaster_area_id = $1) \
             ORDER BY code, id LIMIT $2"
        ))
        .bind(disaster_area_id)
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.into_iter().map(grid_from_db).collect()
    }

    async fn get_grid(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<Grid> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbGrid>(&format!(
            "SELECT {GRID_COLUMNS} FROM grids WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        grid_from_db(row.ok_or_else(|| StoreError::NotFound("grid not found".into()))?)
    }

    async fn create_grid(&self, ctx: &RlsContext, grid: Grid) -> StoreResult<Grid> {
        let supplies = to_json(&grid.supplies_needed)?;
        let bounds = grid.bounds.as_ref().map(to_json).transpose()?;
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbGrid>(&format!(
            "INSERT INTO grids \
                 (id, disaster_area_id, code, grid_type, status, volunteer_needed, \
                  volunteer_registered, meeting_point, risks_notes, contact_info, \
                  supplies_needed, center_lat, center_lng, bounds, grid_manager_id, \
                  created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {GRID_COLUMNS}"
        ))
        .bind(grid.id)
        .bind(grid.disaster_area_id)
        .bind(&grid.code)
        .bind(grid.grid_type.as_str())
        .bind(grid.status.as_str())
        .bind(grid.volunteer_needed)
        .bind(&grid.meeting_point)
        .bind(&grid.risks_notes)
        .bind(&grid.contact_info)
        .bind(supplies)
        .bind(grid.center_lat)
        .bind(grid.center_lng)
        .bind(bounds)
        .bind(grid.grid_manager_id)
        .bind(grid.created_at)
        .bind(grid.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        grid_from_db(row)
    }

    async fn update_grid(&self, ctx: &RlsContext, grid: Grid) -> StoreResult<Grid> {
        let supplies = to_json(&grid.supplies_needed)?;
        let bounds = grid.bounds.as_ref().map(to_json).transpose()?;
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbGrid>(&format!(
            "UPDATE grids SET disaster_area_id = $2, code = $3, grid_type = $4, status = $5, \
                 volunteer_needed = $6, meeting_point = $7, risks_notes = $8, \
                 contact_info = $9, supplies_needed = $10, center_lat = $11, \
                 center_lng = $12, bounds = $13, grid_manager_id = $14, updated_at = now() \
             WHERE id = $1 RETURNING {GRID_COLUMNS}"
        ))
        .bind(grid.id)
        .bind(grid.disaster_area_id)
        .bind(&grid.code)
        .bind(grid.grid_type.as_str())
        .bind(grid.status.as_str())
        .bind(grid.volunteer_needed)
        .bind(&grid.meeting_point)
        .bind(&grid.risks_notes)
        .bind(&grid.contact_info)
        .bind(supplies)
        .bind(grid.center_lat)
        .bind(grid.center_lng)
        .bind(bounds)
        .bind(grid.grid_manager_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(Self::missed_write(&mut tx, ScopedTable::Grids, grid.id).await);
        };
        tx.commit().await?;
        grid_from_db(row)
    }

    async fn delete_grid(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        self.delete_scoped(ctx, ScopedTable::Grids, id).await
    }

    async fn list_registrations(
        &self,
        ctx: &RlsContext,
        filter: ListFilter,
    ) -> StoreResult<Vec<VolunteerRegistration>> {
        let mut tx = self.begin_scoped(ctx).await?;
        let rows = sqlx::query_as::<_, DbRegistration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM volunteer_registrations \
             WHERE ($1::uuid IS NULL OR grid_id = $1) \
             ORDER BY created_at, id LIMIT $2"
        ))
        .bind(filter.grid_id)
        .bind(filter.limit as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.into_iter().map(registration_from_db).collect()
    }

    async fn list_grid_volunteers(
        &self,
        grid_id: Uuid,
        limit: u32,
    ) -> StoreResult<Vec<VolunteerRegistration>> {
        let rows = sqlx::query_as::<_, DbRegistration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM volunteer_registrations \
             WHERE grid_id = $1 ORDER BY created_at, id LIMIT $2"
        ))
        .bind(grid_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(registration_from_db).collect()
    }

    async fn get_registration(
        &self,
        ctx: &RlsContext,
        id: Uuid,
    ) -> StoreResult<VolunteerRegistration> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbRegistration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM volunteer_registrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        registration_from_db(row.ok_or_else(|| StoreError::NotFound("registration not found".into()))?)
    }

    async fn create_registration(
        &self,
        ctx: &RlsContext,
        registration: VolunteerRegistration,
    ) -> StoreResult<VolunteerRegistration> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbRegistration>(&format!(
            "INSERT INTO volunteer_registrations \
                 (id, grid_id, user_id, volunteer_name, volunteer_phone, status, \
                  available_time, skills, equipment, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(registration.id)
        .bind(registration.grid_id)
        .bind(registration.user_id)
        .bind(&registration.volunteer_name)
        .bind(&registration.volunteer_phone)
        .bind(registration.status.as_str())
        .bind(&registration.available_time)
        .bind(&registration.skills)
        .bind(&registration.equipment)
        .bind(&registration.notes)
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        registration_from_db(row)
    }

    async fn update_registration(
        &self,
        ctx: &RlsContext,
        registration: VolunteerRegistration,
        expected_status: RegistrationStatus,
    ) -> StoreResult<VolunteerRegistration> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbRegistration>(&format!(
            "UPDATE volunteer_registrations SET volunteer_name = $3, volunteer_phone = $4, \
                 status = $5, available_time = $6, skills = $7, equipment = $8, notes = $9, \
                 updated_at = now() \
             WHERE id = $1 AND status = $2 RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(registration.id)
        .bind(expected_status.as_str())
        .bind(&registration.volunteer_name)
        .bind(&registration.volunteer_phone)
        .bind(registration.status.as_str())
        .bind(&registration.available_time)
        .bind(&registration.skills)
        .bind(&registration.equipment)
        .bind(&registration.notes)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = row {
            tx.commit().await?;
            return registration_from_db(row);
        }
        let current = sqlx::query_scalar::<_, String>(
            "SELECT status FROM volunteer_registrations WHERE id = $1",
        )
        .bind(registration.id)
        .fetch_optional(&mut *tx)
        .await?;
        match current {
            None => Err(StoreError::NotFound("registration not found".into())),
            Some(status) if status != expected_status.as_str() => Err(
                StoreError::InvalidTransition(format!(
                    "registration is {status} not {expected_status}"
                )),
            ),
            Some(_) => Err(StoreError::Forbidden(
                "row policy rejects write on registration".into(),
            )),
        }
    }

    async fn delete_registration(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        self.delete_scoped(ctx, ScopedTable::VolunteerRegistrations, id)
            .await
    }

    async fn list_donations(
        &self,
        ctx: &RlsContext,
        filter: ListFilter,
    ) -> StoreResult<Vec<SupplyDonation>> {
        let mut tx = self.begin_scoped(ctx).await?;
        let rows = sqlx::query_as::<_, DbDonation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM supply_donations \
             WHERE ($1::uuid IS NULL OR grid_id = $1) \
             ORDER BY created_at DESC, id LIMIT $2"
        ))
        .bind(filter.grid_id)
        .bind(filter.limit as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.into_iter().map(donation_from_db).collect()
    }

    async fn get_donation(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<SupplyDonation> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbDonation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM supply_donations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        donation_from_db(row.ok_or_else(|| StoreError::NotFound("donation not found".into()))?)
    }

    async fn create_donation(
        &self,
        ctx: &RlsContext,
        donation: SupplyDonation,
    ) -> StoreResult<SupplyDonation> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbDonation>(&format!(
            "INSERT INTO supply_donations \
                 (id, grid_id, donor_id, donor_name, donor_phone, supply_name, quantity, unit, \
                  delivery_method, status, notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {DONATION_COLUMNS}"
        ))
        .bind(donation.id)
        .bind(donation.grid_id)
        .bind(donation.donor_id)
        .bind(&donation.donor_name)
        .bind(&donation.donor_phone)
        .bind(&donation.supply_name)
        .bind(donation.quantity)
        .bind(&donation.unit)
        .bind(&donation.delivery_method)
        .bind(donation.status.as_str())
        .bind(&donation.notes)
        .bind(donation.created_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        donation_from_db(row)
    }

    async fn update_donation(
        &self,
        ctx: &RlsContext,
        donation: SupplyDonation,
    ) -> StoreResult<SupplyDonation> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbDonation>(&format!(
            "UPDATE supply_donations SET donor_name = $2, donor_phone = $3, supply_name = $4, \
                 quantity = $5, unit = $6, delivery_method = $7, status = $8, notes = $9 \
             WHERE id = $1 RETURNING {DONATION_COLUMNS}"
        ))
        .bind(donation.id)
        .bind(&donation.donor_name)
        .bind(&donation.donor_phone)
        .bind(&donation.supply_name)
        .bind(donation.quantity)
        .bind(&donation.unit)
        .bind(&donation.delivery_method)
        .bind(donation.status.as_str())
        .bind(&donation.notes)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(Self::missed_write(&mut tx, ScopedTable::SupplyDonations, donation.id).await);
        };
        tx.commit().await?;
        donation_from_db(row)
    }

    async fn delete_donation(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        self.delete_scoped(ctx, ScopedTable::SupplyDonations, id).await
    }

    async fn list_discussions(
        &self,
        ctx: &RlsContext,
        filter: ListFilter,
    ) -> StoreResult<Vec<GridDiscussion>> {
        let mut tx = self.begin_scoped(ctx).await?;
        let rows = sqlx::query_as::<_, DbDiscussion>(&format!(
            "SELECT {DISCUSSION_COLUMNS} FROM grid_discussions \
             WHERE ($1::uuid IS NULL OR grid_id = $1) \
             ORDER BY created_at, id LIMIT $2"
        ))
        .bind(filter.grid_id)
        .bind(filter.limit as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows.into_iter().map(discussion_from_db).collect())
    }

    async fn get_discussion(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<GridDiscussion> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbDiscussion>(&format!(
            "SELECT {DISCUSSION_COLUMNS} FROM grid_discussions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.map(discussion_from_db)
            .ok_or_else(|| StoreError::NotFound("discussion not found".into()))
    }

    async fn create_discussion(
        &self,
        ctx: &RlsContext,
        discussion: GridDiscussion,
    ) -> StoreResult<GridDiscussion> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbDiscussion>(&format!(
            "INSERT INTO grid_discussions \
                 (id, grid_id, author_id, author_name, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {DISCUSSION_COLUMNS}"
        ))
        .bind(discussion.id)
        .bind(discussion.grid_id)
        .bind(discussion.author_id)
        .bind(&discussion.author_name)
        .bind(&discussion.content)
        .bind(discussion.created_at)
        .bind(discussion.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(discussion_from_db(row))
    }

    async fn update_discussion(
        &self,
        ctx: &RlsContext,
        discussion: GridDiscussion,
    ) -> StoreResult<GridDiscussion> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbDiscussion>(&format!(
            "UPDATE grid_discussions SET content = $2, updated_at = now() \
             WHERE id = $1 RETURNING {DISCUSSION_COLUMNS}"
        ))
        .bind(discussion.id)
        .bind(&discussion.content)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(
                Self::missed_write(&mut tx, ScopedTable::GridDiscussions, discussion.id).await,
            );
        };
        tx.commit().await?;
        Ok(discussion_from_db(row))
    }

    async fn delete_discussion(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        self.delete_scoped(ctx, ScopedTable::GridDiscussions, id).await
    }

    async fn list_announcements(
        &self,
        ctx: &RlsContext,
        limit: u32,
    ) -> StoreResult<Vec<Announcement>> {
        let mut tx = self.begin_scoped(ctx).await?;
        let rows = sqlx::query_as::<_, DbAnnouncement>(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements \
             ORDER BY created_at DESC, id LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.into_iter().map(announcement_from_db).collect()
    }

    async fn get_announcement(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<Announcement> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbAnnouncement>(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        announcement_from_db(
            row.ok_or_else(|| StoreError::NotFound("announcement not found".into()))?,
        )
    }

    async fn create_announcement(
        &self,
        ctx: &RlsContext,
        announcement: Announcement,
    ) -> StoreResult<Announcement> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbAnnouncement>(&format!(
            "INSERT INTO announcements (id, title, body, priority, author_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ANNOUNCEMENT_COLUMNS}"
        ))
        .bind(announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.body)
        .bind(announcement.priority.as_str())
        .bind(announcement.author_id)
        .bind(announcement.created_at)
        .bind(announcement.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        announcement_from_db(row)
    }

    async fn update_announcement(
        &self,
        ctx: &RlsContext,
        announcement: Announcement,
    ) -> StoreResult<Announcement> {
        let mut tx = self.begin_scoped(ctx).await?;
        let row = sqlx::query_as::<_, DbAnnouncement>(&format!(
            "UPDATE announcements SET title = $2, body = $3, priority = $4, updated_at = now() \
             WHERE id = $1 RETURNING {ANNOUNCEMENT_COLUMNS}"
        ))
        .bind(announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.body)
        .bind(announcement.priority.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(
                Self::missed_write(&mut tx, ScopedTable::Announcements, announcement.id).await,
            );
        };
        tx.commit().await?;
        announcement_from_db(row)
    }

    async fn delete_announcement(&self, ctx: &RlsContext, id: Uuid) -> StoreResult<()> {
        self.delete_scoped(ctx, ScopedTable::Announcements, id).await
    }

    async fn append_audit(&self, ctx: &RlsContext, entry: AuditEntry) -> StoreResult<()> {
        let mut tx = self.begin_scoped(ctx).await?;
        sqlx::query(
            "INSERT INTO audit_logs \
                 (user_id, user_role, action, resource, resource_id, reason, ip_address, \
                  user_agent, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entry.user_id)
        .bind(entry.user_role.map(Role::as_str))
        .bind(&entry.action)
        .bind(&entry.resource)
        .bind(&entry.resource_id)
        .bind(&entry.reason)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.metadata)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_audit_logs(
        &self,
        ctx: &RlsContext,
        query: AuditQuery,
    ) -> StoreResult<Vec<AuditLog>> {
        let mut tx = self.begin_scoped(ctx).await?;
        let rows = sqlx::query_as::<_, DbAuditLog>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs \
             WHERE ($1::text IS NULL OR action = $1) AND ($2::uuid IS NULL OR user_id = $2) \
             ORDER BY id DESC LIMIT $3"
        ))
        .bind(&query.action)
        .bind(query.user_id)
        .bind(query.limit as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.into_iter().map(audit_from_db).collect()
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn parse_text<T>(value: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err: T::Err| StoreError::Unexpected(anyhow!("{err}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|err| StoreError::Unexpected(err.into()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value, column: &str) -> StoreResult<T> {
    serde_json::from_value(value)
        .map_err(|err| StoreError::Unexpected(anyhow!("decode {column}: {err}")))
}

fn user_from_db(row: DbUser) -> StoreResult<User> {
    Ok(User {
        id: row.id,
        name: row.name,
        email: row.email,
        phone: row.phone,
        role: parse_text(&row.role)?,
        status: parse_text(&row.status)?,
        created_at: row.created_at,
    })
}

fn area_from_db(row: DbDisasterArea) -> StoreResult<DisasterArea> {
    Ok(DisasterArea {
        id: row.id,
        name: row.name,
        county: row.county,
        township: row.township,
        description: row.description,
        center_lat: row.center_lat,
        center_lng: row.center_lng,
        status: parse_text::<AreaStatus>(&row.status)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn grid_from_db(row: DbGrid) -> StoreResult<Grid> {
    Ok(Grid {
        id: row.id,
        disaster_area_id: row.disaster_area_id,
        code: row.code,
        grid_type: parse_text::<GridType>(&row.grid_type)?,
        status: parse_text::<GridStatus>(&row.status)?,
        volunteer_needed: row.volunteer_needed,
        volunteer_registered: row.volunteer_registered,
        meeting_point: row.meeting_point,
        risks_notes: row.risks_notes,
        contact_info: row.contact_info,
        supplies_needed: from_json::<Vec<SupplyNeed>>(row.supplies_needed, "supplies_needed")?,
        center_lat: row.center_lat,
        center_lng: row.center_lng,
        bounds: row
            .bounds
            .map(|value| from_json::<GridBounds>(value, "bounds"))
            .transpose()?,
        grid_manager_id: row.grid_manager_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn registration_from_db(row: DbRegistration) -> StoreResult<VolunteerRegistration> {
    Ok(VolunteerRegistration {
        id: row.id,
        grid_id: row.grid_id,
        user_id: row.user_id,
        volunteer_name: row.volunteer_name,
        volunteer_phone: row.volunteer_phone,
        status: parse_text::<RegistrationStatus>(&row.status)?,
        available_time: row.available_time,
        skills: row.skills,
        equipment: row.equipment,
        notes: row.notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn donation_from_db(row: DbDonation) -> StoreResult<SupplyDonation> {
    Ok(SupplyDonation {
        id: row.id,
        grid_id: row.grid_id,
        donor_id: row.donor_id,
        donor_name: row.donor_name,
        donor_phone: row.donor_phone,
        supply_name: row.supply_name,
        quantity: row.quantity,
        unit: row.unit,
        delivery_method: row.delivery_method,
        status: parse_text::<DonationStatus>(&row.status)?,
        notes: row.notes,
        created_at: row.created_at,
    })
}

fn discussion_from_db(row: DbDiscussion) -> GridDiscussion {
    GridDiscussion {
        id: row.id,
        grid_id: row.grid_id,
        author_id: row.author_id,
        author_name: row.author_name,
        content: row.content,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn announcement_from_db(row: DbAnnouncement) -> StoreResult<Announcement> {
    Ok(Announcement {
        id: row.id,
        title: row.title,
        body: row.body,
        priority: parse_text::<AnnouncementPriority>(&row.priority)?,
        author_id: row.author_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn user_permission_from_db(row: DbUserPermission) -> StoreResult<UserPermission> {
    Ok(UserPermission {
        user_id: row.user_id,
        permission: parse_text::<Permission>(&row.permission_name)?,
        grant_type: parse_text::<GrantType>(&row.grant_type)?,
        granted_by: row.granted_by,
        reason: row.reason,
        expires_at: row.expires_at,
        created_at: row.created_at,
    })
}

fn audit_from_db(row: DbAuditLog) -> StoreResult<AuditLog> {
    Ok(AuditLog {
        id: row.id,
        entry: AuditEntry {
            user_id: row.user_id,
            user_role: row.user_role.as_deref().map(parse_text::<Role>).transpose()?,
            action: row.action,
            resource: row.resource,
            resource_id: row.resource_id,
            reason: row.reason,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            metadata: row.metadata,
        },
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_reports_unknown_values() {
        assert!(parse_text::<Role>("admin").is_ok());
        let err = parse_text::<GridType>("spaceship").expect_err("unknown grid type");
        assert!(matches!(err, StoreError::Unexpected(_)));
    }

    #[test]
    fn grid_from_db_decodes_json_columns() {
        let now = Utc::now();
        let row = DbGrid {
            id: Uuid::new_v4(),
            disaster_area_id: Uuid::new_v4(),
            code: "B-2".to_string(),
            grid_type: "supply".to_string(),
            status: "open".to_string(),
            volunteer_needed: 5,
            volunteer_registered: 2,
            meeting_point: None,
            risks_notes: None,
            contact_info: None,
            supplies_needed: serde_json::json!([
                {"name": "water", "quantity": 20, "unit": "box", "received": 4}
            ]),
            center_lat: Some(23.6),
            center_lng: Some(121.4),
            bounds: Some(serde_json::json!({
                "north": 23.7, "south": 23.5, "east": 121.5, "west": 121.3
            })),
            grid_manager_id: None,
            created_at: now,
            updated_at: now,
        };
        let grid = grid_from_db(row).expect("grid");
        assert_eq!(grid.grid_type, GridType::Supply);
        assert_eq!(grid.supplies_needed[0].received, 4);
        assert_eq!(grid.bounds.expect("bounds").north, 23.7);
    }

    #[test]
    fn grid_from_db_rejects_malformed_supplies() {
        let now = Utc::now();
        let row = DbGrid {
            id: Uuid::new_v4(),
            disaster_area_id: Uuid::new_v4(),
            code: "B-3".to_string(),
            grid_type: "food".to_string(),
            status: "closed".to_string(),
            volunteer_needed: 0,
            volunteer_registered: 0,
            meeting_point: None,
            risks_notes: None,
            contact_info: None,
            supplies_needed: serde_json::json!({"not": "a list"}),
            center_lat: None,
            center_lng: None,
            bounds: None,
            grid_manager_id: None,
            created_at: now,
            updated_at: now,
        };
        assert!(grid_from_db(row).is_err());
    }

    #[test]
    fn audit_from_db_parses_role() {
        let row = DbAuditLog {
            id: 7,
            user_id: None,
            user_role: Some("grid_manager".to_string()),
            action: "access_denied".to_string(),
            resource: Some("grids".to_string()),
            resource_id: None,
            reason: Some("role".to_string()),
            ip_address: None,
            user_agent: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        };
        let log = audit_from_db(row).expect("audit");
        assert_eq!(log.entry.user_role, Some(Role::GridManager));
        assert_eq!(log.id, 7);
    }
}
