/// Configuration management for the helpdesk account service
use crate::error::{HelpdeskError, HelpdeskResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// HMAC-SHA256 keys shorter than this are rejected
pub const MIN_SECRET_LENGTH: usize = 32;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub cookie: CookieConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Active signing key
    pub jwt_secret: String,
    /// Keys still accepted for verification while a rotation is in progress
    pub previous_jwt_secrets: Vec<String>,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// Role assigned to every new account
    pub default_role: String,
    pub max_failed_logins: i64,
    pub lockout_secs: i64,
}

/// Refresh-token cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub secure: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl ServerConfig {
    /// Configuration with default values for everything but the signing key
    pub fn with_jwt_secret(jwt_secret: impl Into<String>) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                database_path: PathBuf::from("./data/helpdesk.sqlite"),
                max_connections: 10,
            },
            authentication: AuthConfig {
                jwt_secret: jwt_secret.into(),
                previous_jwt_secrets: Vec::new(),
                access_token_ttl_secs: 30 * 60,
                refresh_token_ttl_secs: 24 * 60 * 60,
                default_role: "ROLE_USER".to_string(),
                max_failed_logins: 5,
                lockout_secs: 15 * 60,
            },
            cookie: CookieConfig {
                name: "refresh-token".to_string(),
                path: "/".to_string(),
                secure: true,
            },
            logging: LoggingConfig {
                level: "helpdesk_accounts=debug,tower_http=debug".to_string(),
                json: false,
            },
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> HelpdeskResult<Self> {
        dotenv::dotenv().ok();

        let jwt_secret = env::var("HELPDESK_JWT_SECRET")
            .map_err(|_| HelpdeskError::Validation("JWT secret required".to_string()))?;
        let mut config = Self::with_jwt_secret(jwt_secret);

        if let Ok(hostname) = env::var("HELPDESK_HOSTNAME") {
            config.service.hostname = hostname;
        }
        if let Ok(port) = env::var("HELPDESK_PORT") {
            config.service.port = port
                .parse()
                .map_err(|_| HelpdeskError::Validation("Invalid port number".to_string()))?;
        }

        if let Ok(path) = env::var("HELPDESK_DATABASE_PATH") {
            config.storage.database_path = PathBuf::from(path);
        }
        config.storage.max_connections = env::var("HELPDESK_DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.storage.max_connections);

        // Parse previous secrets from comma-separated list
        config.authentication.previous_jwt_secrets = env::var("HELPDESK_JWT_PREVIOUS_SECRETS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        config.authentication.access_token_ttl_secs = parse_or(
            "HELPDESK_ACCESS_TOKEN_TTL_SECS",
            config.authentication.access_token_ttl_secs,
        );
        config.authentication.refresh_token_ttl_secs = parse_or(
            "HELPDESK_REFRESH_TOKEN_TTL_SECS",
            config.authentication.refresh_token_ttl_secs,
        );
        if let Ok(role) = env::var("HELPDESK_DEFAULT_ROLE") {
            config.authentication.default_role = role;
        }
        config.authentication.max_failed_logins = parse_or(
            "HELPDESK_MAX_FAILED_LOGINS",
            config.authentication.max_failed_logins,
        );
        config.authentication.lockout_secs =
            parse_or("HELPDESK_LOCKOUT_SECS", config.authentication.lockout_secs);

        if let Ok(name) = env::var("HELPDESK_REFRESH_COOKIE_NAME") {
            config.cookie.name = name;
        }
        if let Ok(path) = env::var("HELPDESK_REFRESH_COOKIE_PATH") {
            config.cookie.path = path;
        }
        config.cookie.secure = env::var("HELPDESK_REFRESH_COOKIE_SECURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);

        if let Ok(level) = env::var("HELPDESK_LOG_LEVEL") {
            config.logging.level = level;
        }
        config.logging.json = env::var("HELPDESK_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> HelpdeskResult<()> {
        if self.service.hostname.is_empty() {
            return Err(HelpdeskError::Validation("Hostname cannot be empty".to_string()));
        }

        let auth = &self.authentication;
        if auth.jwt_secret.len() < MIN_SECRET_LENGTH
            || auth
                .previous_jwt_secrets
                .iter()
                .any(|s| s.len() < MIN_SECRET_LENGTH)
        {
            return Err(HelpdeskError::Validation(format!(
                "JWT secrets must be at least {} characters",
                MIN_SECRET_LENGTH
            )));
        }

        if auth.access_token_ttl_secs <= 0 || auth.refresh_token_ttl_secs <= 0 {
            return Err(HelpdeskError::Validation(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        if auth.default_role.is_empty() {
            return Err(HelpdeskError::Validation("Default role cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn parse_or(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::with_jwt_secret(SECRET);
        assert!(config.validate().is_ok());
        assert_eq!(config.authentication.access_token_ttl_secs, 1800);
        assert_eq!(config.authentication.refresh_token_ttl_secs, 86400);
        assert_eq!(config.authentication.default_role, "ROLE_USER");
        assert_eq!(config.cookie.name, "refresh-token");
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = ServerConfig::with_jwt_secret("too-short");
        assert!(matches!(config.validate(), Err(HelpdeskError::Validation(_))));
    }

    #[test]
    fn test_short_previous_secret_rejected() {
        let mut config = ServerConfig::with_jwt_secret(SECRET);
        config.authentication.previous_jwt_secrets = vec!["old".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_lifetime_rejected() {
        let mut config = ServerConfig::with_jwt_secret(SECRET);
        config.authentication.refresh_token_ttl_secs = 0;
        assert!(config.validate().is_err());
    }
}
