use chrono::{Local, NaiveDateTime};
use sqlx::{query, query_as};
use std::sync::Arc;
use tracing::error;

#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;

#[cfg(feature = "postgres")]
use sqlx::PgPool;

use crate::account::{AccountRecord, AccountStatus};
use crate::config::get_config;
use crate::errors::{AccountError, AccountResult};

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
///
/// Every bookkeeping update the reconciliation job performs is a single
/// conditional UPDATE whose WHERE clause re-checks the previously read
/// state, so a concurrent recipient link can never be lost and an
/// interrupted cycle leaves re-processable rows.
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

impl Database {
    /// Initialize the database connection based on configuration.
    ///
    /// Uses the global configuration from `config.toml` and environment
    /// variables. See `crate::config` for configuration options.
    pub async fn new() -> AccountResult<Arc<Self>> {
        let config = get_config()?;
        let db_config = &config.database;

        match db_config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(Arc::new(Self::connect_sqlite(&db_config.sqlite_url).await?)),
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(AccountError::Config(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => Ok(Arc::new(
                Self::connect_postgres(&db_config.postgres_url).await?,
            )),
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(AccountError::Config(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(AccountError::Config(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Connect to a SQLite database by URL (also used by the test suites
    /// against `sqlite::memory:`).
    #[cfg(feature = "sqlite")]
    pub async fn connect_sqlite(url: &str) -> AccountResult<Self> {
        let pool = SqlitePool::connect(url).await.map_err(|e| {
            error!("Failed to connect to SQLite: {e}");
            AccountError::Store(format!("failed to connect to SQLite: {e}"))
        })?;
        Ok(Database::SQLite(pool))
    }

    /// Connect to a PostgreSQL database by URL.
    #[cfg(feature = "postgres")]
    pub async fn connect_postgres(url: &str) -> AccountResult<Self> {
        let pool = PgPool::connect(url).await.map_err(|e| {
            error!("Failed to connect to PostgreSQL: {e}");
            AccountError::Store(format!("failed to connect to PostgreSQL: {e}"))
        })?;
        Ok(Database::Postgres(pool))
    }

    /// Name of the active backend, for health reporting.
    pub fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Create the `accounts` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> AccountResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"
                    CREATE TABLE IF NOT EXISTS accounts (
                        account_number TEXT PRIMARY KEY,
                        license TEXT NOT NULL,
                        recipient_id TEXT,
                        expire_date_raw TEXT NOT NULL,
                        expire_date_resolved TEXT,
                        status TEXT NOT NULL DEFAULT 'valid',
                        notified INTEGER NOT NULL DEFAULT 0,
                        last_notified_status TEXT,
                        last_nearly_expired_notified_at TEXT,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    )
                    "#,
                )
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("SQLite ensure_schema failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"
                    CREATE TABLE IF NOT EXISTS accounts (
                        account_number TEXT PRIMARY KEY,
                        license TEXT NOT NULL,
                        recipient_id TEXT,
                        expire_date_raw TEXT NOT NULL,
                        expire_date_resolved TIMESTAMP,
                        status TEXT NOT NULL DEFAULT 'valid',
                        notified BOOLEAN NOT NULL DEFAULT FALSE,
                        last_notified_status TEXT,
                        last_nearly_expired_notified_at TIMESTAMP,
                        created_at TIMESTAMP NOT NULL,
                        updated_at TIMESTAMP NOT NULL
                    )
                    "#,
                )
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("Postgres ensure_schema failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Cheap connectivity probe for health reporting.
    pub async fn ping(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("SELECT 1").execute(pool).await.is_ok(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("SELECT 1").execute(pool).await.is_ok(),
        }
    }

    /// Insert a new account or update an existing one.
    ///
    /// This acts like an "upsert" keyed on `account_number`:
    /// - if the account doesn't exist, it is created
    /// - if it exists, the fields are updated (`created_at` is preserved)
    pub async fn upsert_account(&self, account: AccountRecord) -> AccountResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"
                    INSERT INTO accounts (
                        account_number,
                        license,
                        recipient_id,
                        expire_date_raw,
                        expire_date_resolved,
                        status,
                        notified,
                        last_notified_status,
                        last_nearly_expired_notified_at,
                        created_at,
                        updated_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(account_number) DO UPDATE SET
                        license                         = excluded.license,
                        recipient_id                    = excluded.recipient_id,
                        expire_date_raw                 = excluded.expire_date_raw,
                        expire_date_resolved            = excluded.expire_date_resolved,
                        status                          = excluded.status,
                        notified                        = excluded.notified,
                        last_notified_status            = excluded.last_notified_status,
                        last_nearly_expired_notified_at = excluded.last_nearly_expired_notified_at,
                        updated_at                      = excluded.updated_at
                    "#,
                )
                .bind(&account.account_number)
                .bind(&account.license)
                .bind(&account.recipient_id)
                .bind(&account.expire_date_raw)
                .bind(account.expire_date_resolved)
                .bind(account.status.as_str())
                .bind(account.notified)
                .bind(&account.last_notified_status)
                .bind(account.last_nearly_expired_notified_at)
                .bind(account.created_at)
                .bind(account.updated_at)
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("SQLite upsert_account failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"
                    INSERT INTO accounts (
                        account_number,
                        license,
                        recipient_id,
                        expire_date_raw,
                        expire_date_resolved,
                        status,
                        notified,
                        last_notified_status,
                        last_nearly_expired_notified_at,
                        created_at,
                        updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    ON CONFLICT (account_number) DO UPDATE SET
                        license                         = EXCLUDED.license,
                        recipient_id                    = EXCLUDED.recipient_id,
                        expire_date_raw                 = EXCLUDED.expire_date_raw,
                        expire_date_resolved            = EXCLUDED.expire_date_resolved,
                        status                          = EXCLUDED.status,
                        notified                        = EXCLUDED.notified,
                        last_notified_status            = EXCLUDED.last_notified_status,
                        last_nearly_expired_notified_at = EXCLUDED.last_nearly_expired_notified_at,
                        updated_at                      = EXCLUDED.updated_at
                    "#,
                )
                .bind(&account.account_number)
                .bind(&account.license)
                .bind(&account.recipient_id)
                .bind(&account.expire_date_raw)
                .bind(account.expire_date_resolved)
                .bind(account.status.as_str())
                .bind(account.notified)
                .bind(&account.last_notified_status)
                .bind(account.last_nearly_expired_notified_at)
                .bind(account.created_at)
                .bind(account.updated_at)
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("Postgres upsert_account failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Fetch an account by its number.
    ///
    /// Returns:
    /// - `Ok(Some(AccountRecord))` if found
    /// - `Ok(None)` if not found
    /// - `Err(AccountError::Store)` on DB failure
    pub async fn get_account(&self, account_number: &str) -> AccountResult<Option<AccountRecord>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let account = query_as::<_, AccountRecord>(
                    "SELECT * FROM accounts WHERE account_number = ?",
                )
                .bind(account_number)
                .fetch_optional(pool)
                .await
                .map_err(|e| {
                    error!("SQLite get_account failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })?;

                Ok(account)
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let account = query_as::<_, AccountRecord>(
                    "SELECT * FROM accounts WHERE account_number = $1",
                )
                .bind(account_number)
                .fetch_optional(pool)
                .await
                .map_err(|e| {
                    error!("Postgres get_account failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })?;

                Ok(account)
            }
        }
    }

    /// List accounts, optionally filtered by status.
    pub async fn list_accounts(
        &self,
        status: Option<AccountStatus>,
    ) -> AccountResult<Vec<AccountRecord>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let rows = match status {
                    Some(status) => {
                        query_as::<_, AccountRecord>(
                            "SELECT * FROM accounts WHERE status = ? ORDER BY account_number",
                        )
                        .bind(status.as_str())
                        .fetch_all(pool)
                        .await
                    }
                    None => {
                        query_as::<_, AccountRecord>(
                            "SELECT * FROM accounts ORDER BY account_number",
                        )
                        .fetch_all(pool)
                        .await
                    }
                };

                rows.map_err(|e| {
                    error!("SQLite list_accounts failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let rows = match status {
                    Some(status) => {
                        query_as::<_, AccountRecord>(
                            "SELECT * FROM accounts WHERE status = $1 ORDER BY account_number",
                        )
                        .bind(status.as_str())
                        .fetch_all(pool)
                        .await
                    }
                    None => {
                        query_as::<_, AccountRecord>(
                            "SELECT * FROM accounts ORDER BY account_number",
                        )
                        .fetch_all(pool)
                        .await
                    }
                };

                rows.map_err(|e| {
                    error!("Postgres list_accounts failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })
            }
        }
    }

    /// Count accounts per status value.
    pub async fn status_counts(&self) -> AccountResult<Vec<(String, i64)>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, (String, i64)>(
                    "SELECT status, COUNT(*) FROM accounts GROUP BY status",
                )
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    error!("SQLite status_counts failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, (String, i64)>(
                    "SELECT status, COUNT(*) FROM accounts GROUP BY status",
                )
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    error!("Postgres status_counts failed: {e}");
                    AccountError::Store(format!("database error: {e}"))
                })
            }
        }
    }

    /// Assign the notification recipient for an account.
    ///
    /// Returns:
    /// - `Ok(true)` if a row was updated
    /// - `Ok(false)` if no matching account exists
    pub async fn link_recipient(
        &self,
        account_number: &str,
        recipient_id: &str,
    ) -> AccountResult<bool> {
        let now = Local::now().naive_local();

        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "UPDATE accounts \
                     SET recipient_id = ?, updated_at = ? \
                     WHERE account_number = ?",
            )
            .bind(recipient_id)
            .bind(now)
            .bind(account_number)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("SQLite link_recipient failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "UPDATE accounts \
                     SET recipient_id = $1, updated_at = $2 \
                     WHERE account_number = $3",
            )
            .bind(recipient_id)
            .bind(now)
            .bind(account_number)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("Postgres link_recipient failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Administratively force an account's status (suspend, invalidate,
    /// reinstate). Entering `valid` re-arms the notification flag.
    pub async fn set_status(
        &self,
        account_number: &str,
        status: AccountStatus,
    ) -> AccountResult<bool> {
        let now = Local::now().naive_local();
        let rearm = status == AccountStatus::Valid;

        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "UPDATE accounts \
                     SET status = ?, \
                         notified = (CASE WHEN ? THEN 0 ELSE notified END), \
                         updated_at = ? \
                     WHERE account_number = ?",
            )
            .bind(status.as_str())
            .bind(rearm)
            .bind(now)
            .bind(account_number)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("SQLite set_status failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "UPDATE accounts \
                     SET status = $1, \
                         notified = (CASE WHEN $2 THEN FALSE ELSE notified END), \
                         updated_at = $3 \
                     WHERE account_number = $4",
            )
            .bind(status.as_str())
            .bind(rearm)
            .bind(now)
            .bind(account_number)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("Postgres set_status failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Persist an evaluated status transition, conditional on the status the
    /// caller previously read (compare-and-set). Also refreshes the resolved
    /// expiry cache, and re-arms the notification flag when the account
    /// returns to `valid`.
    ///
    /// Returns `Ok(false)` when the account changed concurrently; the caller
    /// simply leaves it for the next cycle.
    pub async fn update_status_checked(
        &self,
        account_number: &str,
        new_status: AccountStatus,
        expected_status: AccountStatus,
        resolved: Option<NaiveDateTime>,
        rearm: bool,
    ) -> AccountResult<bool> {
        let now = Local::now().naive_local();

        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "UPDATE accounts \
                     SET status = ?, \
                         expire_date_resolved = ?, \
                         notified = (CASE WHEN ? THEN 0 ELSE notified END), \
                         updated_at = ? \
                     WHERE account_number = ? AND status = ?",
            )
            .bind(new_status.as_str())
            .bind(resolved)
            .bind(rearm)
            .bind(now)
            .bind(account_number)
            .bind(expected_status.as_str())
            .execute(pool)
            .await
            .map_err(|e| {
                error!("SQLite update_status_checked failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "UPDATE accounts \
                     SET status = $1, \
                         expire_date_resolved = $2, \
                         notified = (CASE WHEN $3 THEN FALSE ELSE notified END), \
                         updated_at = $4 \
                     WHERE account_number = $5 AND status = $6",
            )
            .bind(new_status.as_str())
            .bind(resolved)
            .bind(rearm)
            .bind(now)
            .bind(account_number)
            .bind(expected_status.as_str())
            .execute(pool)
            .await
            .map_err(|e| {
                error!("Postgres update_status_checked failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Record a successful expired/suspended notification, conditional on
    /// the firing condition still holding (status unchanged, occupancy still
    /// unnotified). Runs only after transport success.
    pub async fn mark_notified_checked(
        &self,
        account_number: &str,
        status: AccountStatus,
    ) -> AccountResult<bool> {
        let now = Local::now().naive_local();

        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "UPDATE accounts \
                     SET notified = 1, last_notified_status = ?, updated_at = ? \
                     WHERE account_number = ? AND status = ? \
                       AND (notified = 0 \
                            OR last_notified_status IS NULL \
                            OR last_notified_status <> ?)",
            )
            .bind(status.as_str())
            .bind(now)
            .bind(account_number)
            .bind(status.as_str())
            .bind(status.as_str())
            .execute(pool)
            .await
            .map_err(|e| {
                error!("SQLite mark_notified_checked failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "UPDATE accounts \
                     SET notified = TRUE, last_notified_status = $1, updated_at = $2 \
                     WHERE account_number = $3 AND status = $4 \
                       AND (notified = FALSE \
                            OR last_notified_status IS NULL \
                            OR last_notified_status <> $5)",
            )
            .bind(status.as_str())
            .bind(now)
            .bind(account_number)
            .bind(status.as_str())
            .bind(status.as_str())
            .execute(pool)
            .await
            .map_err(|e| {
                error!("Postgres mark_notified_checked failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Record a successful near-expiry reminder, conditional on the account
    /// still being `nearly_expired`. Runs only after transport success.
    pub async fn mark_reminder_sent_checked(
        &self,
        account_number: &str,
        sent_at: NaiveDateTime,
    ) -> AccountResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "UPDATE accounts \
                     SET last_nearly_expired_notified_at = ?, updated_at = ? \
                     WHERE account_number = ? AND status = 'nearly_expired'",
            )
            .bind(sent_at)
            .bind(sent_at)
            .bind(account_number)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("SQLite mark_reminder_sent_checked failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "UPDATE accounts \
                     SET last_nearly_expired_notified_at = $1, updated_at = $2 \
                     WHERE account_number = $3 AND status = 'nearly_expired'",
            )
            .bind(sent_at)
            .bind(sent_at)
            .bind(account_number)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("Postgres mark_reminder_sent_checked failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Clear the notification flag on every `valid` account that still
    /// carries one. Returns the number of re-armed rows.
    pub async fn rearm_valid_accounts(&self) -> AccountResult<u64> {
        let now = Local::now().naive_local();

        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "UPDATE accounts \
                     SET notified = 0, updated_at = ? \
                     WHERE status = 'valid' AND notified = 1",
            )
            .bind(now)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("SQLite rearm_valid_accounts failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "UPDATE accounts \
                     SET notified = FALSE, updated_at = $1 \
                     WHERE status = 'valid' AND notified = TRUE",
            )
            .bind(now)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("Postgres rearm_valid_accounts failed: {e}");
                AccountError::Store(format!("database error: {e}"))
            })?
            .rows_affected(),
        };

        Ok(rows_affected)
    }
}
