//! Email + password verification.
use crate::{
    auth::password::CredentialHasher,
    db::account::{self, Account},
    error::{HelpdeskError, HelpdeskResult},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated account, as embedded in access tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

/// Failed-login lockout settings. `max_failed_logins <= 0` disables lockout.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_failed_logins: i64,
    pub lockout: Duration,
}

/// Verifies credentials against stored accounts
pub struct Authenticator {
    db: SqlitePool,
    hasher: Arc<CredentialHasher>,
    policy: LockoutPolicy,
}

impl Authenticator {
    pub fn new(db: SqlitePool, hasher: Arc<CredentialHasher>, policy: LockoutPolicy) -> Self {
        Self { db, hasher, policy }
    }

    /// Check email and password, returning the principal on success
    ///
    /// Every failure is the same `AuthenticationFailed`. The password hash is
    /// verified on every path, including unknown emails and locked accounts.
    pub async fn authenticate(&self, email: &str, password: &str) -> HelpdeskResult<Principal> {
        let account = match account::find_account_by_email(&self.db, email).await? {
            Some(account) => account,
            None => {
                self.hasher.verify(password, self.hasher.dummy_hash());
                tracing::warn!("Login rejected");
                return Err(HelpdeskError::AuthenticationFailed);
            }
        };

        let now = Utc::now();
        let password_ok = self.hasher.verify(password, &account.password_hash);

        if account.is_locked_out(now) {
            tracing::warn!(account_id = %account.id, "Login rejected during lockout");
            return Err(HelpdeskError::AuthenticationFailed);
        }

        if !password_ok {
            self.record_failure(&account, now).await?;
            tracing::warn!("Login rejected");
            return Err(HelpdeskError::AuthenticationFailed);
        }

        if account.access_failed_count > 0 || account.lockout_expires_at.is_some() {
            account::reset_failed_logins(&self.db, account.id).await?;
        }

        let roles = account::role_names_for(&self.db, account.id).await?;
        tracing::debug!(account_id = %account.id, "Credentials verified");

        Ok(Principal {
            id: account.id,
            username: account.username,
            email: account.email,
            roles,
        })
    }

    /// Counter arithmetic happens in SQL so concurrent failures all count
    async fn record_failure(&self, account: &Account, now: DateTime<Utc>) -> HelpdeskResult<()> {
        let max = self.policy.max_failed_logins;
        let failed =
            account::increment_failed_logins(&self.db, account.id, max, now + self.policy.lockout)
                .await?;

        if max > 0 && failed == 0 {
            tracing::info!(account_id = %account.id, "Account locked after repeated failed logins");
        }

        Ok(())
    }
}
