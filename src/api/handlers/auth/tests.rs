//! Auth storage tests against a containerized Postgres.
//!
//! Each test starts its own throwaway Postgres, runs the embedded migrations,
//! and seeds the default roles, then drives the storage helpers directly.
//! Tests skip themselves when no container runtime is reachable.

use super::password::hash_password;
use super::storage::{
    consume_reset_token, delete_session, find_credentials, insert_session,
    lookup_session_principal, record_login_failure, record_login_success, register_account,
    set_reset_token, NewAccount, RegisterOutcome,
};
use super::utils::{hash_token, normalize_email};
use crate::api::handlers::roles::seed_default_roles;
use crate::test_support::{postgres::PostgresContainer, TestNetwork};
use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

struct TestDb {
    _postgres: PostgresContainer,
    pool: PgPool,
}

impl TestDb {
    async fn new() -> Result<Self> {
        let network = TestNetwork::new("klienta-auth");
        let postgres = match PostgresContainer::start(network.name()).await {
            Ok(postgres) => postgres,
            Err(err) => {
                eprintln!("Skipping database test: {err}");
                return Err(err);
            }
        };
        postgres.wait_until_ready().await?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&postgres.dsn())
            .await
            .context("failed to connect test pool")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;
        seed_default_roles(&pool).await?;

        Ok(Self {
            _postgres: postgres,
            pool,
        })
    }
}

async fn create_account(pool: &PgPool, email: &str) -> Result<Uuid> {
    let account_id = Uuid::new_v4();
    let password_hash = hash_password("Password1")?;
    let account = NewAccount {
        id: account_id,
        first_name: "Test",
        last_name: "Account",
        email,
        password_hash: &password_hash,
        company: None,
        position: None,
        phone: None,
    };

    let outcome = register_account(
        pool,
        &account,
        &hash_token("verify-token"),
        3600,
        "https://app.klienta.dev/verify-email",
    )
    .await?;

    match outcome {
        RegisterOutcome::Created => Ok(account_id),
        RegisterOutcome::Conflict => anyhow::bail!("unexpected duplicate email"),
    }
}

#[tokio::test]
async fn register_duplicate_email_conflicts() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let email = normalize_email("Alice@Example.com");
    create_account(&db.pool, &email).await?;

    let password_hash = hash_password("Password1")?;
    let duplicate = NewAccount {
        id: Uuid::new_v4(),
        first_name: "Other",
        last_name: "Account",
        email: &email,
        password_hash: &password_hash,
        company: None,
        position: None,
        phone: None,
    };
    let outcome = register_account(
        &db.pool,
        &duplicate,
        &hash_token("other-token"),
        3600,
        "https://app.klienta.dev/verify-email",
    )
    .await?;
    assert!(matches!(outcome, RegisterOutcome::Conflict));

    let row = sqlx::query("SELECT COUNT(*) AS accounts FROM accounts WHERE email = $1")
        .bind(&email)
        .fetch_one(&db.pool)
        .await
        .context("failed to count accounts")?;
    let accounts: i64 = row.get("accounts");
    assert_eq!(accounts, 1);

    Ok(())
}

#[tokio::test]
async fn lockout_at_threshold_and_reset_on_success() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let email = "bob@example.com";
    let account_id = create_account(&db.pool, email).await?;

    for _ in 0..4 {
        assert!(!record_login_failure(&db.pool, account_id, 5, 1800).await?);
    }
    assert!(record_login_failure(&db.pool, account_id, 5, 1800).await?);

    let credentials = find_credentials(&db.pool, email)
        .await?
        .context("account should exist")?;
    assert!(credentials.locked_until.is_some());

    record_login_success(&db.pool, account_id).await?;

    let credentials = find_credentials(&db.pool, email)
        .await?
        .context("account should exist")?;
    assert!(credentials.locked_until.is_none());

    // The counter restarted, so a single new failure does not lock again.
    assert!(!record_login_failure(&db.pool, account_id, 5, 1800).await?);

    Ok(())
}

#[tokio::test]
async fn reset_token_is_single_use() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let email = "carol@example.com";
    let account_id = create_account(&db.pool, email).await?;

    let token_hash = hash_token("reset-token");
    let stored = set_reset_token(
        &db.pool,
        email,
        &token_hash,
        3600,
        "https://app.klienta.dev/reset-password",
    )
    .await?;
    assert!(stored);

    // Unknown addresses are a silent no-op.
    let missing = set_reset_token(
        &db.pool,
        "missing@example.com",
        &token_hash,
        3600,
        "https://app.klienta.dev/reset-password",
    )
    .await?;
    assert!(!missing);

    let new_hash = hash_password("Password2")?;
    assert!(consume_reset_token(&db.pool, account_id, &token_hash, &new_hash).await?);
    assert!(!consume_reset_token(&db.pool, account_id, &token_hash, &new_hash).await?);

    Ok(())
}

#[tokio::test]
async fn logout_removes_only_presented_session() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let email = "dave@example.com";
    let account_id = create_account(&db.pool, email).await?;

    let first = hash_token("session-one");
    let second = hash_token("session-two");
    insert_session(&db.pool, account_id, &first, "cli", 3600).await?;
    insert_session(&db.pool, account_id, &second, "browser", 3600).await?;

    assert_eq!(delete_session(&db.pool, &first).await?, 1);

    assert!(lookup_session_principal(&db.pool, &first).await?.is_none());
    let principal = lookup_session_principal(&db.pool, &second)
        .await?
        .context("second session should survive")?;
    assert_eq!(principal.account_id, account_id);
    assert_eq!(principal.role_name, "employee");

    Ok(())
}
