//! Database helpers for roles and role assignment.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::permissions::PermissionMap;
use crate::api::handlers::auth::utils::is_unique_violation;

pub(super) struct RoleRecord {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) description: Option<String>,
    pub(super) permissions: PermissionMap,
    pub(super) subscription_tier: String,
    pub(super) is_superadmin: bool,
    pub(super) is_active: bool,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

pub(super) struct RoleMember {
    pub(super) id: Uuid,
    pub(super) first_name: String,
    pub(super) last_name: String,
    pub(super) email: String,
    pub(super) is_active: bool,
}

#[derive(Debug)]
pub(super) enum WriteOutcome {
    Done,
    Conflict,
}

fn role_from_row(row: &sqlx::postgres::PgRow) -> RoleRecord {
    let Json(permissions): Json<PermissionMap> = row.get("permissions");
    RoleRecord {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        permissions,
        subscription_tier: row.get("subscription_tier"),
        is_superadmin: row.get("is_superadmin"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const ROLE_COLUMNS: &str = "id, name, description, permissions, subscription_tier, \
                            is_superadmin, is_active, created_at, updated_at";

/// Insert the built-in roles when they are absent. Existing rows are left
/// untouched so operator edits survive restarts.
pub async fn seed_default_roles(pool: &PgPool) -> Result<()> {
    let full = serde_json::to_string(&PermissionMap::full()).context("serialize permissions")?;
    let employee =
        serde_json::to_string(&PermissionMap::employee()).context("serialize permissions")?;

    let query = r"
        INSERT INTO roles (name, description, permissions, subscription_tier, is_superadmin)
        VALUES
            ('superadmin', 'Full access to everything', $1::jsonb, 'enterprise', TRUE),
            ('admin', 'Administrative access', $1::jsonb, 'premium', FALSE),
            ('employee', 'Standard CRM access', $2::jsonb, 'basic', FALSE)
        ON CONFLICT (name) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(full)
        .bind(employee)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to seed default roles")?;

    Ok(())
}

pub(super) async fn create_role(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    permissions: &PermissionMap,
    subscription_tier: &str,
    is_superadmin: bool,
) -> Result<Option<RoleRecord>> {
    let permissions_text = serde_json::to_string(permissions).context("serialize permissions")?;

    let query = format!(
        r"
        INSERT INTO roles (name, description, permissions, subscription_tier, is_superadmin)
        VALUES ($1, $2, $3::jsonb, $4, $5)
        RETURNING {ROLE_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(description)
        .bind(permissions_text)
        .bind(subscription_tier)
        .bind(is_superadmin)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(Some(role_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err).context("failed to insert role"),
    }
}

pub(super) async fn list_roles(pool: &PgPool) -> Result<Vec<RoleRecord>> {
    let query = format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY created_at");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list roles")?;

    Ok(rows.iter().map(role_from_row).collect())
}

pub(super) async fn fetch_role(pool: &PgPool, role_id: Uuid) -> Result<Option<RoleRecord>> {
    let query = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(role_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch role")?;

    Ok(row.as_ref().map(role_from_row))
}

pub(super) async fn update_role(
    pool: &PgPool,
    role_id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    subscription_tier: Option<&str>,
    is_active: Option<bool>,
) -> Result<Option<WriteOutcome>> {
    let query = r"
        UPDATE roles
        SET name = COALESCE($2, name),
            description = COALESCE($3, description),
            subscription_tier = COALESCE($4, subscription_tier),
            is_active = COALESCE($5, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(role_id)
        .bind(name)
        .bind(description)
        .bind(subscription_tier)
        .bind(is_active)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(_)) => Ok(Some(WriteOutcome::Done)),
        Ok(None) => Ok(None),
        Err(err) if is_unique_violation(&err) => Ok(Some(WriteOutcome::Conflict)),
        Err(err) => Err(err).context("failed to update role"),
    }
}

pub(super) async fn update_role_permissions(
    pool: &PgPool,
    role_id: Uuid,
    permissions: &PermissionMap,
) -> Result<bool> {
    let permissions_text = serde_json::to_string(permissions).context("serialize permissions")?;

    let query = r"
        UPDATE roles
        SET permissions = $2::jsonb, updated_at = NOW()
        WHERE id = $1
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(role_id)
        .bind(permissions_text)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update role permissions")?;

    Ok(row.is_some())
}

/// Deactivate a role instead of removing the row, so historical references
/// stay intact. Superadmin roles cannot be deactivated this way.
pub(super) async fn deactivate_role(pool: &PgPool, role_id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE roles
        SET is_active = FALSE, updated_at = NOW()
        WHERE id = $1 AND NOT is_superadmin
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(role_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to delete role")?;

    Ok(row.is_some())
}

pub(super) async fn count_role_members(pool: &PgPool, role_id: Uuid) -> Result<i64> {
    let query = "SELECT COUNT(*) AS members FROM accounts WHERE role_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(role_id)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count role members")?;

    Ok(row.get("members"))
}

pub(super) async fn list_role_members(pool: &PgPool, role_id: Uuid) -> Result<Vec<RoleMember>> {
    let query = r"
        SELECT id, first_name, last_name, email, is_active
        FROM accounts
        WHERE role_id = $1
        ORDER BY created_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(role_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list role members")?;

    Ok(rows
        .iter()
        .map(|row| RoleMember {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            is_active: row.get("is_active"),
        })
        .collect())
}

/// Assign a role to an account. Returns `false` when either id is unknown.
pub(super) async fn assign_role(pool: &PgPool, role_id: Uuid, account_id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET role_id = roles.id, updated_at = NOW()
        FROM roles
        WHERE accounts.id = $2 AND roles.id = $1 AND roles.is_active
        RETURNING accounts.id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(role_id)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to assign role")?;

    Ok(row.is_some())
}
