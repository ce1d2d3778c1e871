//! Access/refresh token issuance and refresh-token bookkeeping.
use crate::{
    auth::{
        authenticator::Principal,
        token::{ClaimSet, IssuedToken, TokenCodec},
    },
    db::account::{self, RefreshToken},
    error::{HelpdeskResult, TokenError},
};
use chrono::{Duration, Utc};
use sqlx::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

/// Builds claim sets and mints tokens through the codec
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, access_lifetime: Duration, refresh_lifetime: Duration) -> Self {
        Self {
            codec,
            access_lifetime,
            refresh_lifetime,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Short-lived token embedding username and roles
    pub fn create_access_token(&self, principal: &Principal) -> HelpdeskResult<IssuedToken> {
        let claims = ClaimSet {
            sub: principal.id,
            username: Some(principal.username.clone()),
            roles: Some(principal.roles.clone()),
            jti: None,
        };

        self.codec.issue(claims, self.access_lifetime)
    }

    /// Long-lived token, recorded in `refresh_tokens`
    ///
    /// The write goes through `conn`; pass an open transaction so the token
    /// is only handed out once the surrounding work commits.
    pub async fn create_refresh_token(
        &self,
        conn: &mut SqliteConnection,
        principal: &Principal,
    ) -> HelpdeskResult<IssuedToken> {
        let record_id = Uuid::new_v4();
        let claims = ClaimSet {
            jti: Some(record_id.to_string()),
            ..ClaimSet::subject(principal.id)
        };
        let issued = self.codec.issue(claims, self.refresh_lifetime)?;

        account::insert_refresh_token(
            &mut *conn,
            &RefreshToken {
                id: record_id,
                token: issued.token.clone(),
                user_id: principal.id,
                created_at: issued.issued_at,
                expires_at: issued.expires_at,
                revoked_at: None,
            },
        )
        .await?;

        tracing::debug!(account_id = %principal.id, "Refresh token recorded");

        Ok(issued)
    }

    /// Mark a refresh token revoked. Revoking twice is a no-op.
    pub async fn revoke(&self, conn: &mut SqliteConnection, token: &str) -> HelpdeskResult<()> {
        if account::revoke_refresh_token(&mut *conn, token, Utc::now()).await? {
            return Ok(());
        }

        match account::find_refresh_token(&mut *conn, token).await? {
            Some(_) => Ok(()),
            None => Err(TokenError::Malformed.into()),
        }
    }

    /// Validate a refresh token for re-issuance and revoke it
    ///
    /// Returns the owning account id. A token can be consumed once. The
    /// revoking UPDATE runs before any read so concurrent callers queue on
    /// the write lock and the loser sees `Revoked`. On error the caller's
    /// transaction must be rolled back to undo the revocation.
    pub async fn consume(&self, conn: &mut SqliteConnection, token: &str) -> HelpdeskResult<Uuid> {
        let claims = self.codec.verify(token)?;
        let now = Utc::now();

        let record = match account::claim_refresh_token(&mut *conn, token, now).await? {
            Some(record) => record,
            None => {
                return match account::find_refresh_token(&mut *conn, token).await? {
                    Some(_) => Err(TokenError::Revoked.into()),
                    None => Err(TokenError::Malformed.into()),
                };
            }
        };

        if record.user_id != claims.set.sub {
            return Err(TokenError::Malformed.into());
        }
        if record.expires_at <= now {
            return Err(TokenError::Expired.into());
        }

        Ok(record.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, db::account::Account, error::HelpdeskError};
    use sqlx::SqlitePool;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    async fn setup() -> (SqlitePool, TokenIssuer, Principal) {
        let pool = db::create_memory_pool().await.unwrap();
        let id = Uuid::new_v4();
        account::insert_account(
            &pool,
            &Account {
                id,
                username: "a@b.com".to_string(),
                email: "a@b.com".to_string(),
                password_hash: "$argon2id$placeholder".to_string(),
                created_at: Utc::now(),
                email_confirmed_at: None,
                lockout_expires_at: None,
                access_failed_count: 0,
            },
        )
        .await
        .unwrap();

        let codec = Arc::new(TokenCodec::new(SECRET, &[]).unwrap());
        let issuer = TokenIssuer::new(codec, Duration::minutes(30), Duration::days(1));
        let principal = Principal {
            id,
            username: "a@b.com".to_string(),
            email: "a@b.com".to_string(),
            roles: vec!["ROLE_USER".to_string()],
        };

        (pool, issuer, principal)
    }

    #[tokio::test]
    async fn test_access_token_embeds_roles() {
        let (_pool, issuer, principal) = setup().await;
        let token = issuer.create_access_token(&principal).unwrap();

        let claims = issuer.codec().verify(&token.token).unwrap();
        assert_eq!(claims.set.sub, principal.id);
        assert_eq!(claims.set.username.as_deref(), Some("a@b.com"));
        assert_eq!(claims.set.roles, Some(vec!["ROLE_USER".to_string()]));
        assert_eq!(token.expires_at - token.issued_at, Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_refresh_token_is_persisted() {
        let (pool, issuer, principal) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let token = issuer.create_refresh_token(&mut conn, &principal).await.unwrap();

        let record = account::find_refresh_token(&mut *conn, &token.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, principal.id);
        assert_eq!(record.expires_at, token.expires_at);
        assert_eq!(record.created_at, token.issued_at);
        assert!(record.revoked_at.is_none());

        let claims = issuer.codec().verify(&token.token).unwrap();
        assert!(claims.set.roles.is_none());
        assert_eq!(claims.set.jti, Some(record.id.to_string()));
    }

    #[tokio::test]
    async fn test_refresh_tokens_never_repeat() {
        let (pool, issuer, principal) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let a = issuer.create_refresh_token(&mut conn, &principal).await.unwrap();
        let b = issuer.create_refresh_token(&mut conn, &principal).await.unwrap();
        assert_ne!(a.token, b.token);
    }

    #[tokio::test]
    async fn test_rolled_back_transaction_leaves_no_record() {
        let (pool, issuer, principal) = setup().await;

        let token = {
            let mut tx = pool.begin().await.unwrap();
            let token = issuer.create_refresh_token(&mut tx, &principal).await.unwrap();
            tx.rollback().await.unwrap();
            token
        };

        let record = account::find_refresh_token(&pool, &token.token).await.unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_consume_once() {
        let (pool, issuer, principal) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let token = issuer.create_refresh_token(&mut conn, &principal).await.unwrap();

        let owner = issuer.consume(&mut conn, &token.token).await.unwrap();
        assert_eq!(owner, principal.id);

        let again = issuer.consume(&mut conn, &token.token).await;
        assert!(matches!(
            again,
            Err(HelpdeskError::InvalidToken(TokenError::Revoked))
        ));
    }

    #[tokio::test]
    async fn test_revoked_token_cannot_be_consumed() {
        let (pool, issuer, principal) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let token = issuer.create_refresh_token(&mut conn, &principal).await.unwrap();

        issuer.revoke(&mut conn, &token.token).await.unwrap();
        // Second revoke is a no-op
        issuer.revoke(&mut conn, &token.token).await.unwrap();

        let result = issuer.consume(&mut conn, &token.token).await;
        assert!(matches!(
            result,
            Err(HelpdeskError::InvalidToken(TokenError::Revoked))
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let (pool, issuer, principal) = setup().await;
        let mut conn = pool.acquire().await.unwrap();

        // Validly signed but never recorded
        let stray = issuer
            .codec()
            .issue(ClaimSet::subject(principal.id), Duration::days(1))
            .unwrap();

        assert!(matches!(
            issuer.consume(&mut conn, &stray.token).await,
            Err(HelpdeskError::InvalidToken(TokenError::Malformed))
        ));
        assert!(matches!(
            issuer.revoke(&mut conn, &stray.token).await,
            Err(HelpdeskError::InvalidToken(TokenError::Malformed))
        ));
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_refresh_token() {
        let (pool, issuer, principal) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let access = issuer.create_access_token(&principal).unwrap();

        assert!(issuer.consume(&mut conn, &access.token).await.is_err());
    }
}
