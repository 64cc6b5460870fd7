//! Postgres-backed account store.

use super::{AccountStore, CreateOutcome, UpdateOutcome};
use crate::accounts::model::{
    Account, AccountChanges, AccountId, NewAccount, TokenGuard, VerifyChanges,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::Json,
    Connection, PgPool, Postgres, QueryBuilder, Row,
};
use std::time::Duration;
use tracing::Instrument;

const SCHEMA: &str = include_str!("../../../sql/schema.sql");

#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Create the `users` table and its indexes if missing.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be applied.
    pub async fn migrate(&self) -> Result<()> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "MIGRATE"
        );
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to apply schema")?;
        Ok(())
    }

    async fn fetch_one_by(&self, query: &'static str, value: &str) -> Result<Option<Account>> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account")?;
        row.as_ref().map(account_from_row).transpose()
    }
}

fn account_from_row(row: &PgRow) -> Result<Account> {
    let verify_changes: Option<Json<VerifyChanges>> = row
        .try_get("verify_changes")
        .context("failed to decode verify_changes")?;
    Ok(Account {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_verified: row.try_get("is_verified")?,
        verify_token: row.try_get("verify_token")?,
        verify_short_token: row.try_get("verify_short_token")?,
        verify_expires: row.try_get("verify_expires")?,
        verify_changes: verify_changes.map(|changes| changes.0),
        reset_token: row.try_get("reset_token")?,
        reset_short_token: row.try_get("reset_short_token")?,
        reset_expires: row.try_get("reset_expires")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Build `UPDATE users SET ... WHERE id = $n [AND <guard>] RETURNING *`.
fn update_query(
    id: AccountId,
    changes: &AccountChanges,
    guard: Option<&TokenGuard>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");

    if let Some(email) = &changes.email {
        builder.push(", email = ").push_bind(email.clone());
    }
    if let Some(hash) = &changes.password_hash {
        builder.push(", password_hash = ").push_bind(hash.clone());
    }
    if let Some(is_verified) = changes.is_verified {
        builder.push(", is_verified = ").push_bind(is_verified);
    }
    if let Some(verification) = &changes.verification {
        let verification = verification.clone();
        builder
            .push(", verify_token = ")
            .push_bind(verification.as_ref().map(|v| v.token.clone()))
            .push(", verify_short_token = ")
            .push_bind(verification.as_ref().map(|v| v.short_token.clone()))
            .push(", verify_expires = ")
            .push_bind(verification.as_ref().map(|v| v.expires))
            .push(", verify_changes = ")
            .push_bind(verification.and_then(|v| v.changes).map(Json));
    }
    if let Some(reset) = &changes.reset {
        builder
            .push(", reset_token = ")
            .push_bind(reset.as_ref().map(|r| r.token.clone()))
            .push(", reset_short_token = ")
            .push_bind(reset.as_ref().map(|r| r.short_token.clone()))
            .push(", reset_expires = ")
            .push_bind(reset.as_ref().map(|r| r.expires));
    }

    builder.push(" WHERE id = ").push_bind(id);
    match guard {
        Some(TokenGuard::Verify(digest)) => {
            builder.push(" AND verify_token = ").push_bind(digest.clone());
        }
        Some(TokenGuard::Reset(digest)) => {
            builder.push(" AND reset_token = ").push_bind(digest.clone());
        }
        None => {}
    }
    builder.push(" RETURNING *");
    builder
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let query = "SELECT * FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by id")?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.fetch_one_by("SELECT * FROM users WHERE email = $1", email)
            .await
    }

    async fn find_by_verify_token(&self, digest: &str) -> Result<Option<Account>> {
        self.fetch_one_by("SELECT * FROM users WHERE verify_token = $1", digest)
            .await
    }

    async fn list(&self) -> Result<Vec<Account>> {
        let query = "SELECT * FROM users ORDER BY id";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list accounts")?;
        rows.iter().map(account_from_row).collect()
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        let query = r"
            INSERT INTO users
                (email, password_hash, verify_token, verify_short_token, verify_expires, verify_changes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let verification = account.verification;
        let row = sqlx::query(query)
            .bind(account.email)
            .bind(account.password_hash)
            .bind(verification.token)
            .bind(verification.short_token)
            .bind(verification.expires)
            .bind(verification.changes.map(Json))
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(CreateOutcome::Created(account_from_row(&row)?)),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::EmailTaken),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn update(
        &self,
        id: AccountId,
        changes: &AccountChanges,
        guard: Option<&TokenGuard>,
    ) -> Result<UpdateOutcome> {
        let mut builder = update_query(id, changes, guard);
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = builder.sql()
        );
        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(Some(row)) => Ok(UpdateOutcome::Updated(account_from_row(&row)?)),
            Ok(None) => Ok(UpdateOutcome::GuardFailed),
            Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::EmailTaken),
            Err(err) => Err(err).context("failed to update account"),
        }
    }

    async fn remove(&self, id: AccountId) -> Result<Option<Account>> {
        let query = "DELETE FROM users WHERE id = $1 RETURNING *";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete account")?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn ping(&self) -> Result<()> {
        let span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire database connection")?;
        conn.ping()
            .instrument(span)
            .await
            .context("Failed to ping database")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::model::{PendingReset, PendingVerification};
    use chrono::Utc;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn update_query_guards_on_verify_token() {
        let changes = AccountChanges {
            is_verified: Some(true),
            verification: Some(None),
            ..AccountChanges::default()
        };
        let guard = TokenGuard::Verify("digest".to_string());
        let builder = update_query(7, &changes, Some(&guard));
        let sql = builder.sql();
        assert!(sql.starts_with("UPDATE users SET updated_at = NOW(), is_verified = $1"));
        assert!(sql.contains("verify_changes = $5"));
        assert!(sql.contains("WHERE id = $6 AND verify_token = $7"));
        assert!(sql.ends_with("RETURNING *"));
    }

    #[test]
    fn update_query_sets_reset_and_password() {
        let changes = AccountChanges {
            password_hash: Some("hash".to_string()),
            reset: Some(Some(PendingReset {
                token: "t".to_string(),
                short_token: "s".to_string(),
                expires: Utc::now(),
            })),
            ..AccountChanges::default()
        };
        let builder = update_query(7, &changes, None);
        let sql = builder.sql();
        assert!(sql.contains("password_hash = $1"));
        assert!(sql.contains("reset_token = $2"));
        assert!(sql.contains("reset_expires = $4"));
        assert!(sql.contains("WHERE id = $5 RETURNING *"));
        assert!(!sql.contains("verify_token"));
    }

    #[test]
    fn update_query_without_changes_touches_timestamp_only() {
        let builder = update_query(1, &AccountChanges::default(), None);
        assert_eq!(
            builder.sql(),
            "UPDATE users SET updated_at = NOW() WHERE id = $1 RETURNING *"
        );
    }

    #[test]
    fn update_query_carries_pending_changes() {
        let changes = AccountChanges {
            verification: Some(Some(PendingVerification {
                token: "t".to_string(),
                short_token: "s".to_string(),
                expires: Utc::now(),
                changes: Some(VerifyChanges {
                    email: "b@b.com".to_string(),
                }),
            })),
            ..AccountChanges::default()
        };
        let builder = update_query(1, &changes, None);
        assert!(builder.sql().contains("verify_changes = $4"));
    }

    #[tokio::test]
    async fn ping_fails_when_database_unreachable() {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://custodia@127.0.0.1:1/custodia");
        let Ok(pool) = pool else {
            return;
        };
        let store = PgAccountStore::new(pool);
        assert!(store.ping().await.is_err());
    }
}
