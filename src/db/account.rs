/// Account database models and operations
///
/// Every query takes any SQLite executor so callers can run it against the
/// pool or inside an open transaction.
use crate::error::HelpdeskResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use uuid::Uuid;

/// Account record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub lockout_expires_at: Option<DateTime<Utc>>,
    pub access_failed_count: i64,
}

impl Account {
    /// Whether a lockout is in force at `now`
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_expires_at.map_or(false, |until| until > now)
    }
}

/// Role reference record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

/// Refresh token record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, created_at, email_confirmed_at,
     lockout_expires_at, access_failed_count";

pub async fn find_account_by_email<'e, E>(exec: E, email: &str) -> HelpdeskResult<Option<Account>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM users WHERE email = ?1", ACCOUNT_COLUMNS);
    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(email)
        .fetch_optional(exec)
        .await?;

    Ok(account)
}

pub async fn find_account_by_id<'e, E>(exec: E, id: Uuid) -> HelpdeskResult<Option<Account>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM users WHERE id = ?1", ACCOUNT_COLUMNS);
    let account = sqlx::query_as::<_, Account>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(account)
}

/// Insert a new account row. Unique violations surface as `sqlx::Error`.
pub async fn insert_account<'e, E>(exec: E, account: &Account) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, created_at, email_confirmed_at,
                            lockout_expires_at, access_failed_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(account.id)
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(account.created_at)
    .bind(account.email_confirmed_at)
    .bind(account.lockout_expires_at)
    .bind(account.access_failed_count)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn find_role_by_name<'e, E>(exec: E, name: &str) -> HelpdeskResult<Option<Role>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE name = ?1")
        .bind(name)
        .fetch_optional(exec)
        .await?;

    Ok(role)
}

pub async fn assign_role<'e, E>(exec: E, user_id: Uuid, role_id: Uuid) -> HelpdeskResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT OR IGNORE INTO users_roles (user_id, role_id) VALUES (?1, ?2)")
        .bind(user_id)
        .bind(role_id)
        .execute(exec)
        .await?;

    Ok(())
}

/// Role names of an account, ordered by name
pub async fn role_names_for<'e, E>(exec: E, user_id: Uuid) -> HelpdeskResult<Vec<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let names = sqlx::query_scalar(
        "SELECT r.name FROM roles r
         INNER JOIN users_roles ur ON ur.role_id = r.id
         WHERE ur.user_id = ?1
         ORDER BY r.name",
    )
    .bind(user_id)
    .fetch_all(exec)
    .await?;

    Ok(names)
}

/// Count one failed login in a single statement
///
/// Reaching `max_failed_logins` (when positive) sets `lockout_expires_at` and
/// zeroes the counter. Returns the counter after the update.
pub async fn increment_failed_logins<'e, E>(
    exec: E,
    user_id: Uuid,
    max_failed_logins: i64,
    lockout_expires_at: DateTime<Utc>,
) -> HelpdeskResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count = sqlx::query_scalar(
        "UPDATE users SET
             access_failed_count = CASE
                 WHEN ?1 > 0 AND access_failed_count + 1 >= ?1 THEN 0
                 ELSE access_failed_count + 1
             END,
             lockout_expires_at = CASE
                 WHEN ?1 > 0 AND access_failed_count + 1 >= ?1 THEN ?2
                 ELSE lockout_expires_at
             END
         WHERE id = ?3
         RETURNING access_failed_count",
    )
    .bind(max_failed_logins)
    .bind(lockout_expires_at)
    .bind(user_id)
    .fetch_one(exec)
    .await?;

    Ok(count)
}

pub async fn reset_failed_logins<'e, E>(exec: E, user_id: Uuid) -> HelpdeskResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE users SET access_failed_count = 0, lockout_expires_at = NULL WHERE id = ?1",
    )
    .bind(user_id)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn insert_refresh_token<'e, E>(exec: E, record: &RefreshToken) -> HelpdeskResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO refresh_tokens (id, token, user_id, created_at, expires_at, revoked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(record.id)
    .bind(&record.token)
    .bind(record.user_id)
    .bind(record.created_at)
    .bind(record.expires_at)
    .bind(record.revoked_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn find_refresh_token<'e, E>(exec: E, token: &str) -> HelpdeskResult<Option<RefreshToken>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = sqlx::query_as::<_, RefreshToken>(
        "SELECT id, token, user_id, created_at, expires_at, revoked_at
         FROM refresh_tokens WHERE token = ?1",
    )
    .bind(token)
    .fetch_optional(exec)
    .await?;

    Ok(record)
}

/// Set `revoked_at` unless already set. Returns whether a row changed.
pub async fn revoke_refresh_token<'e, E>(
    exec: E,
    token: &str,
    revoked_at: DateTime<Utc>,
) -> HelpdeskResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = ?1 WHERE token = ?2 AND revoked_at IS NULL",
    )
    .bind(revoked_at)
    .bind(token)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Revoke an unrevoked token and return its record, or `None` if no row matched
///
/// A write is the first statement, so inside a deferred transaction the
/// write lock is taken before any snapshot is read.
pub async fn claim_refresh_token<'e, E>(
    exec: E,
    token: &str,
    revoked_at: DateTime<Utc>,
) -> HelpdeskResult<Option<RefreshToken>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = sqlx::query_as::<_, RefreshToken>(
        "UPDATE refresh_tokens SET revoked_at = ?1
         WHERE token = ?2 AND revoked_at IS NULL
         RETURNING id, token, user_id, created_at, expires_at, revoked_at",
    )
    .bind(revoked_at)
    .bind(token)
    .fetch_optional(exec)
    .await?;

    Ok(record)
}
