/// Application context and dependency injection
use crate::{
    account::AccountManager,
    auth::TokenCodec,
    config::ServerConfig,
    db,
    error::HelpdeskResult,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub token_codec: Arc<TokenCodec>,
    pub account_manager: Arc<AccountManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> HelpdeskResult<Self> {
        // Validate configuration
        config.validate()?;

        let options = db::DatabaseOptions {
            max_connections: config.storage.max_connections,
            ..Default::default()
        };
        let pool = db::create_pool(&config.storage.database_path, options).await?;

        // Run migrations
        db::run_migrations(&pool).await?;

        // Test connection
        db::test_connection(&pool).await?;

        Self::with_pool(config, pool)
    }

    /// Build the context over an already migrated pool
    pub fn with_pool(config: ServerConfig, pool: SqlitePool) -> HelpdeskResult<Self> {
        let token_codec = Arc::new(TokenCodec::new(
            &config.authentication.jwt_secret,
            &config.authentication.previous_jwt_secrets,
        )?);

        let account_manager = Arc::new(AccountManager::new(
            pool.clone(),
            &config,
            token_codec.clone(),
        )?);

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            token_codec,
            account_manager,
        })
    }

    /// Get service address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.config.service.hostname, self.config.service.port)
    }
}
