//! Database helpers for accounts, sessions, and credential state.
//!
//! Every mutation is an explicit statement; lockout counters in particular are
//! updated in a single atomic UPDATE so concurrent login attempts cannot lose
//! increments.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{types::Json, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;
use crate::api::handlers::roles::permissions::PermissionMap;

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(super) enum RegisterOutcome {
    Created,
    Conflict,
}

/// Fields needed to decide a login attempt.
pub(super) struct CredentialRecord {
    pub(super) id: Uuid,
    pub(super) password_hash: String,
    pub(super) locked_until: Option<DateTime<Utc>>,
    pub(super) is_active: bool,
}

/// Authenticated context resolved from a session token digest.
pub(crate) struct PrincipalRecord {
    pub(crate) account_id: Uuid,
    pub(crate) email: String,
    pub(crate) role_name: String,
    pub(crate) permissions: PermissionMap,
    pub(crate) is_superadmin: bool,
}

/// Profile fields exposed on `/api/users/me`.
pub(crate) struct AccountProfile {
    pub(crate) id: Uuid,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) email: String,
    pub(crate) role_name: String,
    pub(crate) company: Option<String>,
    pub(crate) position: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) is_email_verified: bool,
    pub(crate) theme: String,
    pub(crate) notify_email: bool,
    pub(crate) notify_push: bool,
    pub(crate) timezone: String,
    pub(crate) last_login_at: Option<DateTime<Utc>>,
    pub(crate) created_at: DateTime<Utc>,
}

/// Input for a new account row. The id is generated by the caller so the
/// verification token can be issued before the transaction starts.
pub(super) struct NewAccount<'a> {
    pub(super) id: Uuid,
    pub(super) first_name: &'a str,
    pub(super) last_name: &'a str,
    pub(super) email: &'a str,
    pub(super) password_hash: &'a str,
    pub(super) company: Option<&'a str>,
    pub(super) position: Option<&'a str>,
    pub(super) phone: Option<&'a str>,
}

/// Create the account, store the verification token digest, and enqueue the
/// verification email in one transaction.
pub(super) async fn register_account(
    pool: &PgPool,
    account: &NewAccount<'_>,
    verification_token_hash: &[u8],
    verification_ttl_seconds: i64,
    verify_url: &str,
) -> Result<RegisterOutcome> {
    let mut tx = pool.begin().await.context("begin register transaction")?;

    let query = r"
        INSERT INTO accounts
            (id, first_name, last_name, email, password_hash, role_id,
             company, position, phone,
             verification_token_hash, verification_token_expires_at)
        SELECT $1, $2, $3, $4, $5, roles.id, $6, $7, $8,
               $9, NOW() + ($10 * INTERVAL '1 second')
        FROM roles
        WHERE roles.name = 'employee' AND roles.is_active
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account.id)
        .bind(account.first_name)
        .bind(account.last_name)
        .bind(account.email)
        .bind(account.password_hash)
        .bind(account.company)
        .bind(account.position)
        .bind(account.phone)
        .bind(verification_token_hash)
        .bind(verification_ttl_seconds)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await;

    match row {
        Ok(Some(_)) => {}
        Ok(None) => {
            let _ = tx.rollback().await;
            anyhow::bail!("default role 'employee' is missing, seed roles first");
        }
        Err(err) if is_unique_violation(&err) => {
            let _ = tx.rollback().await;
            return Ok(RegisterOutcome::Conflict);
        }
        Err(err) => return Err(err).context("failed to insert account"),
    }

    let payload = json!({
        "email": account.email,
        "first_name": account.first_name,
        "verify_url": verify_url,
    });
    insert_outbox(
        &mut tx,
        account.email,
        crate::api::email::TEMPLATE_VERIFY_EMAIL,
        &payload,
    )
    .await?;

    tx.commit().await.context("commit register transaction")?;

    Ok(RegisterOutcome::Created)
}

pub(super) async fn insert_outbox(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    to_email: &str,
    template: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    let payload_text = serde_json::to_string(payload).context("failed to serialize email payload")?;

    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(to_email)
        .bind(template)
        .bind(payload_text)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;

    Ok(())
}

/// Look up login data by normalized email.
pub(super) async fn find_credentials(pool: &PgPool, email: &str) -> Result<Option<CredentialRecord>> {
    let query = r"
        SELECT id, password_hash, locked_until, is_active
        FROM accounts
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credentials")?;

    Ok(row.map(|row| CredentialRecord {
        id: row.get("id"),
        password_hash: row.get("password_hash"),
        locked_until: row.get("locked_until"),
        is_active: row.get("is_active"),
    }))
}

/// Count a failed attempt and lock the account when the threshold is reached.
/// Returns `true` when this attempt triggered (or extended) a lock.
pub(super) async fn record_login_failure(
    pool: &PgPool,
    account_id: Uuid,
    threshold: i32,
    lockout_seconds: i64,
) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET failed_login_attempts = failed_login_attempts + 1,
            locked_until = CASE
                WHEN failed_login_attempts + 1 >= $2
                    THEN NOW() + ($3 * INTERVAL '1 second')
                ELSE locked_until
            END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING locked_until IS NOT NULL AND locked_until > NOW() AS locked
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .bind(threshold)
        .bind(lockout_seconds)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to record login failure")?;

    Ok(row.is_some_and(|row| row.get("locked")))
}

/// Reset the failure counter and stamp the login time.
pub(super) async fn record_login_success(pool: &PgPool, account_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET failed_login_attempts = 0,
            locked_until = NULL,
            last_login_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to record login success")?;

    Ok(())
}

/// Append a session row; only the token digest is stored.
pub(super) async fn insert_session(
    pool: &PgPool,
    account_id: Uuid,
    token_hash: &[u8],
    device: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO account_sessions (account_id, token_hash, device, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(token_hash)
        .bind(device)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert session")?;

    Ok(())
}

/// Resolve a session token digest into a principal.
///
/// Only unexpired sessions of active accounts with active roles qualify; a
/// valid signature alone is never enough.
pub(crate) async fn lookup_session_principal(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<PrincipalRecord>> {
    let query = r"
        SELECT accounts.id, accounts.email,
               roles.name AS role_name, roles.permissions, roles.is_superadmin
        FROM account_sessions
        JOIN accounts ON accounts.id = account_sessions.account_id
        JOIN roles ON roles.id = accounts.role_id
        WHERE account_sessions.token_hash = $1
          AND account_sessions.expires_at > NOW()
          AND accounts.is_active
          AND roles.is_active
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    let Some(row) = row else {
        return Ok(None);
    };

    // Record activity for session listings without extending the TTL.
    let query = r"
        UPDATE account_sessions
        SET last_used_at = NOW()
        WHERE token_hash = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update session last_used_at")?;

    let Json(permissions): Json<PermissionMap> = row.get("permissions");

    Ok(Some(PrincipalRecord {
        account_id: row.get("id"),
        email: row.get("email"),
        role_name: row.get("role_name"),
        permissions,
        is_superadmin: row.get("is_superadmin"),
    }))
}

/// Remove exactly the presented session. Returns the number of rows removed.
pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<u64> {
    let query = "DELETE FROM account_sessions WHERE token_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;

    Ok(result.rows_affected())
}

/// Remove every session for the account. Returns the number of rows removed.
pub(super) async fn delete_all_sessions(pool: &PgPool, account_id: Uuid) -> Result<u64> {
    let query = "DELETE FROM account_sessions WHERE account_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete account sessions")?;

    Ok(result.rows_affected())
}

/// Store a reset token digest and enqueue the reset email, if the account
/// exists and is active. Returns `false` when there is no such account, which
/// callers must not reveal.
pub(super) async fn set_reset_token(
    pool: &PgPool,
    email: &str,
    token_hash: &[u8],
    ttl_seconds: i64,
    reset_url: &str,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let query = r"
        UPDATE accounts
        SET reset_token_hash = $2,
            reset_token_expires_at = NOW() + ($3 * INTERVAL '1 second'),
            updated_at = NOW()
        WHERE email = $1 AND is_active
        RETURNING first_name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(token_hash)
        .bind(ttl_seconds)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to store reset token")?;

    let Some(row) = row else {
        tx.commit().await.context("commit reset noop")?;
        return Ok(false);
    };

    let first_name: String = row.get("first_name");
    let payload = json!({
        "email": email,
        "first_name": first_name,
        "reset_url": reset_url,
    });
    insert_outbox(
        &mut tx,
        email,
        crate::api::email::TEMPLATE_RESET_PASSWORD,
        &payload,
    )
    .await?;

    tx.commit().await.context("commit reset transaction")?;

    Ok(true)
}

/// Consume a reset token: set the new hash and clear the token fields in one
/// statement so the token is single-use. A lock in progress is cleared too,
/// since proving mailbox ownership resets the account.
pub(super) async fn consume_reset_token(
    pool: &PgPool,
    account_id: Uuid,
    token_hash: &[u8],
    new_password_hash: &str,
) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET password_hash = $3,
            reset_token_hash = NULL,
            reset_token_expires_at = NULL,
            failed_login_attempts = 0,
            locked_until = NULL,
            updated_at = NOW()
        WHERE id = $1
          AND reset_token_hash = $2
          AND reset_token_expires_at > NOW()
          AND is_active
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .bind(token_hash)
        .bind(new_password_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume reset token")?;

    Ok(row.is_some())
}

/// Consume a verification token and mark the address verified.
pub(super) async fn consume_verification_token(
    pool: &PgPool,
    account_id: Uuid,
    token_hash: &[u8],
) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET is_email_verified = TRUE,
            verification_token_hash = NULL,
            verification_token_expires_at = NULL,
            updated_at = NOW()
        WHERE id = $1
          AND verification_token_hash = $2
          AND verification_token_expires_at > NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume verification token")?;

    Ok(row.is_some())
}

pub(super) async fn fetch_password_hash(pool: &PgPool, account_id: Uuid) -> Result<Option<String>> {
    let query = "SELECT password_hash FROM accounts WHERE id = $1 AND is_active";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch password hash")?;

    Ok(row.map(|row| row.get("password_hash")))
}

pub(super) async fn update_password(
    pool: &PgPool,
    account_id: Uuid,
    new_password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET password_hash = $2, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(new_password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;

    Ok(())
}

pub(crate) async fn fetch_profile(pool: &PgPool, account_id: Uuid) -> Result<Option<AccountProfile>> {
    let query = r"
        SELECT accounts.id, first_name, last_name, email,
               roles.name AS role_name,
               company, position, phone, is_email_verified,
               theme, notify_email, notify_push, timezone,
               last_login_at, accounts.created_at
        FROM accounts
        JOIN roles ON roles.id = accounts.role_id
        WHERE accounts.id = $1 AND accounts.is_active
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch profile")?;

    Ok(row.map(|row| AccountProfile {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        role_name: row.get("role_name"),
        company: row.get("company"),
        position: row.get("position"),
        phone: row.get("phone"),
        is_email_verified: row.get("is_email_verified"),
        theme: row.get("theme"),
        notify_email: row.get("notify_email"),
        notify_push: row.get("notify_push"),
        timezone: row.get("timezone"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
    }))
}

/// Apply allow-listed profile updates; absent fields keep their value.
pub(crate) async fn update_profile(
    pool: &PgPool,
    account_id: Uuid,
    first_name: Option<&str>,
    last_name: Option<&str>,
    company: Option<&str>,
    position: Option<&str>,
    phone: Option<&str>,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            company = COALESCE($4, company),
            position = COALESCE($5, position),
            phone = COALESCE($6, phone),
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(first_name)
        .bind(last_name)
        .bind(company)
        .bind(position)
        .bind(phone)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update profile")?;

    Ok(())
}

pub(crate) async fn update_preferences(
    pool: &PgPool,
    account_id: Uuid,
    theme: Option<&str>,
    notify_email: Option<bool>,
    notify_push: Option<bool>,
    timezone: Option<&str>,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET theme = COALESCE($2, theme),
            notify_email = COALESCE($3, notify_email),
            notify_push = COALESCE($4, notify_push),
            timezone = COALESCE($5, timezone),
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(theme)
        .bind(notify_email)
        .bind(notify_push)
        .bind(timezone)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update preferences")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CredentialRecord, RegisterOutcome};
    use uuid::Uuid;

    #[test]
    fn register_outcome_debug_names() {
        assert_eq!(format!("{:?}", RegisterOutcome::Created), "Created");
        assert_eq!(format!("{:?}", RegisterOutcome::Conflict), "Conflict");
    }

    #[test]
    fn credential_record_holds_values() {
        let record = CredentialRecord {
            id: Uuid::nil(),
            password_hash: "$argon2id$stub".to_string(),
            locked_until: None,
            is_active: true,
        };
        assert_eq!(record.id, Uuid::nil());
        assert!(record.locked_until.is_none());
        assert!(record.is_active);
    }
}
