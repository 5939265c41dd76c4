//! Postgres-backed tenant directory.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Unavailable` |
//! | PoolClosed / Io / Other | N/A | `Unavailable` |
//!
//! Every write filters on `tenant_id` as well as `id`. `update` and `delete`
//! lock the tenant's rows (`SELECT ... FOR UPDATE`) and re-check the
//! administrator floor inside the same transaction as the write.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use parish_auth::admin::policy::ensure_administrator_retained;
use parish_auth::{
    DirectoryWriter, PermissionSet, Profile, Role, StoreError, TenantDirectory, WriteOutcome,
};
use parish_core::{IdentityId, TenantId};

const SCHEMA: &str = include_str!("../../migrations/0001_identities.sql");

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        tenant_id,
        email,
        display_name,
        role,
        manage_identities,
        manage_groups,
        edit_records,
        record_attendance,
        manage_assessments,
        view_reports
    FROM identities
"#;

#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: Arc<PgPool>,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `identities` table if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn fetch_optional(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Option<Profile>, StoreError> {
        let row = query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        row.map(|row| {
            IdentityRow::from_row(&row)
                .map_err(|e| map_sqlx_error(operation, e))
                .and_then(IdentityRow::into_profile)
        })
        .transpose()
    }
}

#[async_trait]
impl TenantDirectory for PostgresDirectory {
    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE email = lower(trim($1))");
        self.fetch_optional("find_by_email", sqlx::query(&sql).bind(email))
            .await
    }

    #[instrument(skip(self), fields(identity_id = %id), err)]
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Profile>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
        self.fetch_optional("find_by_id", sqlx::query(&sql).bind(*id.as_uuid()))
            .await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_tenant(&self, tenant_id: TenantId) -> Result<Vec<Profile>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE tenant_id = $1 ORDER BY display_name, email");
        let rows = sqlx::query(&sql)
            .bind(*tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_tenant", e))?;

        rows.iter()
            .map(|row| {
                IdentityRow::from_row(row)
                    .map_err(|e| map_sqlx_error("list_tenant", e))
                    .and_then(IdentityRow::into_profile)
            })
            .collect()
    }
}

#[async_trait]
impl DirectoryWriter for PostgresDirectory {
    #[instrument(skip(self, profile), fields(identity_id = %profile.id, tenant_id = %profile.tenant_id), err)]
    async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        let p = &profile.permissions;
        sqlx::query(
            r#"
            INSERT INTO identities (
                id, tenant_id, email, display_name, role,
                manage_identities, manage_groups, edit_records,
                record_attendance, manage_assessments, view_reports
            )
            VALUES ($1, $2, lower(trim($3)), $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*profile.id.as_uuid())
        .bind(*profile.tenant_id.as_uuid())
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(profile.role.as_str())
        .bind(p.manage_identities)
        .bind(p.manage_groups)
        .bind(p.edit_records)
        .bind(p.record_attendance)
        .bind(p.manage_assessments)
        .bind(p.view_reports)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;
        Ok(())
    }

    #[instrument(skip(self, profile), fields(identity_id = %profile.id, tenant_id = %profile.tenant_id), err)]
    async fn update(&self, profile: &Profile) -> Result<WriteOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let members = lock_tenant(&mut tx, profile.tenant_id).await?;
        if !members.iter().any(|m| m.id == profile.id) {
            return Ok(WriteOutcome::NotFound);
        }
        if ensure_administrator_retained(&members, profile.id, Some(profile)).is_err() {
            return Ok(WriteOutcome::LastAdministrator);
        }

        let p = &profile.permissions;
        sqlx::query(
            r#"
            UPDATE identities SET
                email = lower(trim($3)),
                display_name = $4,
                role = $5,
                manage_identities = $6,
                manage_groups = $7,
                edit_records = $8,
                record_attendance = $9,
                manage_assessments = $10,
                view_reports = $11,
                updated_at = now()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(*profile.id.as_uuid())
        .bind(*profile.tenant_id.as_uuid())
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(profile.role.as_str())
        .bind(p.manage_identities)
        .bind(p.manage_groups)
        .bind(p.edit_records)
        .bind(p.record_attendance)
        .bind(p.manage_assessments)
        .bind(p.view_reports)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        Ok(WriteOutcome::Applied)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, identity_id = %id), err)]
    async fn delete(&self, tenant_id: TenantId, id: IdentityId) -> Result<WriteOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let members = lock_tenant(&mut tx, tenant_id).await?;
        if !members.iter().any(|m| m.id == id) {
            return Ok(WriteOutcome::NotFound);
        }
        if ensure_administrator_retained(&members, id, None).is_err() {
            return Ok(WriteOutcome::LastAdministrator);
        }

        sqlx::query("DELETE FROM identities WHERE id = $1 AND tenant_id = $2")
            .bind(*id.as_uuid())
            .bind(*tenant_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        Ok(WriteOutcome::Applied)
    }
}

/// Lock every row of the tenant for the rest of the transaction.
///
/// Concurrent guarded writes in the same tenant queue here and re-read the
/// committed state once the lock is released.
async fn lock_tenant(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
) -> Result<Vec<Profile>, StoreError> {
    let sql = format!("{SELECT_COLUMNS} WHERE tenant_id = $1 ORDER BY id FOR UPDATE");
    let rows = sqlx::query(&sql)
        .bind(*tenant_id.as_uuid())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_tenant", e))?;

    rows.iter()
        .map(|row| {
            IdentityRow::from_row(row)
                .map_err(|e| map_sqlx_error("lock_tenant", e))
                .and_then(IdentityRow::into_profile)
        })
        .collect()
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, other)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row Types
// ─────────────────────────────────────────────────────────────────────────────

struct IdentityRow {
    id: Uuid,
    tenant_id: Uuid,
    email: String,
    display_name: String,
    role: String,
    manage_identities: bool,
    manage_groups: bool,
    edit_records: bool,
    record_attendance: bool,
    manage_assessments: bool,
    view_reports: bool,
}

impl IdentityRow {
    fn into_profile(self) -> Result<Profile, StoreError> {
        let role: Role = self.role.parse().map_err(|e| {
            StoreError::Unavailable(format!("identity {} has an unreadable role: {}", self.id, e))
        })?;

        Ok(Profile {
            id: IdentityId::from_uuid(self.id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            email: self.email,
            display_name: self.display_name,
            role,
            permissions: PermissionSet {
                manage_identities: self.manage_identities,
                manage_groups: self.manage_groups,
                edit_records: self.edit_records,
                record_attendance: self.record_attendance,
                manage_assessments: self.manage_assessments,
                view_reports: self.view_reports,
            },
        })
    }
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for IdentityRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(IdentityRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            role: row.try_get("role")?,
            manage_identities: row.try_get("manage_identities")?,
            manage_groups: row.try_get("manage_groups")?,
            edit_records: row.try_get("edit_records")?,
            record_attendance: row.try_get("record_attendance")?,
            manage_assessments: row.try_get("manage_assessments")?,
            view_reports: row.try_get("view_reports")?,
        })
    }
}
