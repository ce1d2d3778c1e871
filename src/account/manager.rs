/// Account manager: registration, login, refresh, logout, profile
///
/// Uses sqlx runtime queries; the login and refresh flows each run in one
/// transaction so a refresh-token record and the returned tokens appear together or not at all.

use crate::{
    account::{TokenPair, UserProfile},
    auth::{Authenticator, CredentialHasher, LockoutPolicy, Principal, TokenCodec, TokenIssuer},
    config::ServerConfig,
    db::{
        self,
        account::{self, Account},
    },
    error::{HelpdeskError, HelpdeskResult, TokenError},
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    hasher: Arc<CredentialHasher>,
    authenticator: Authenticator,
    issuer: TokenIssuer,
    default_role: String,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(
        db: SqlitePool,
        config: &ServerConfig,
        codec: Arc<TokenCodec>,
    ) -> HelpdeskResult<Self> {
        let auth = &config.authentication;
        let hasher = Arc::new(CredentialHasher::new()?);

        let authenticator = Authenticator::new(
            db.clone(),
            hasher.clone(),
            LockoutPolicy {
                max_failed_logins: auth.max_failed_logins,
                lockout: Duration::seconds(auth.lockout_secs),
            },
        );
        let issuer = TokenIssuer::new(
            codec,
            Duration::seconds(auth.access_token_ttl_secs),
            Duration::seconds(auth.refresh_token_ttl_secs),
        );

        Ok(Self {
            db,
            hasher,
            authenticator,
            issuer,
            default_role: auth.default_role.clone(),
        })
    }

    /// Register a new account with the default role
    pub async fn create_user(&self, email: &str, password: &str) -> HelpdeskResult<Account> {
        // Pre-check only; the UNIQUE constraint decides races
        if account::find_account_by_email(&self.db, email).await?.is_some() {
            return Err(HelpdeskError::AccountAlreadyExists(email.to_string()));
        }

        let role = account::find_role_by_name(&self.db, &self.default_role)
            .await?
            .ok_or_else(|| {
                HelpdeskError::Configuration(format!("Role '{}' not found.", self.default_role))
            })?;

        let password_hash = self.hasher.hash(password)?;

        let new_account = Account {
            id: Uuid::new_v4(),
            username: email.to_string(),
            email: email.to_string(),
            password_hash,
            created_at: Utc::now(),
            email_confirmed_at: None,
            lockout_expires_at: None,
            access_failed_count: 0,
        };

        let mut tx = self.db.begin().await?;

        if let Err(e) = account::insert_account(&mut *tx, &new_account).await {
            if db::is_unique_violation(&e) {
                return Err(HelpdeskError::AccountAlreadyExists(email.to_string()));
            }
            return Err(e.into());
        }
        account::assign_role(&mut *tx, new_account.id, role.id).await?;

        tx.commit().await?;

        tracing::info!(account_id = %new_account.id, "Account registered");
        Ok(new_account)
    }

    /// Verify credentials and issue an access/refresh token pair
    pub async fn login(&self, email: &str, password: &str) -> HelpdeskResult<TokenPair> {
        let principal = self.authenticator.authenticate(email, password).await?;

        let mut tx = self.db.begin().await?;
        let refresh_token = self.issuer.create_refresh_token(&mut tx, &principal).await?;
        let access_token = self.issuer.create_access_token(&principal)?;
        tx.commit().await?;

        tracing::info!(account_id = %principal.id, "Login succeeded");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new pair. The old one is revoked.
    pub async fn refresh(&self, refresh_token: &str) -> HelpdeskResult<TokenPair> {
        let mut tx = self.db.begin().await?;

        let account_id = self.issuer.consume(&mut tx, refresh_token).await?;
        let owner = account::find_account_by_id(&mut *tx, account_id)
            .await?
            .ok_or(TokenError::Malformed)?;
        let roles = account::role_names_for(&mut *tx, account_id).await?;

        let principal = Principal {
            id: owner.id,
            username: owner.username,
            email: owner.email,
            roles,
        };

        let refresh_token = self.issuer.create_refresh_token(&mut tx, &principal).await?;
        let access_token = self.issuer.create_access_token(&principal)?;
        tx.commit().await?;

        tracing::debug!(account_id = %principal.id, "Tokens refreshed");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Revoke a refresh token
    pub async fn logout(&self, refresh_token: &str) -> HelpdeskResult<()> {
        let mut conn = self.db.acquire().await?;
        self.issuer.revoke(&mut conn, refresh_token).await
    }

    /// Profile by account id
    pub async fn get_profile(&self, account_id: Uuid) -> HelpdeskResult<UserProfile> {
        let found = account::find_account_by_id(&self.db, account_id)
            .await?
            .ok_or_else(|| HelpdeskError::AccountNotFound(account_id.to_string()))?;

        let roles = account::role_names_for(&self.db, found.id).await?;

        Ok(UserProfile {
            id: found.id,
            email: found.email,
            roles,
        })
    }
}
