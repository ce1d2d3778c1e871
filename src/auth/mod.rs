/// Authentication: password hashing, signed tokens, credential checks
/// and the request extractor for bearer access tokens.
pub mod authenticator;
pub mod issuer;
pub mod password;
pub mod token;

pub use authenticator::{Authenticator, LockoutPolicy, Principal};
pub use issuer::TokenIssuer;
pub use password::CredentialHasher;
pub use token::{ClaimSet, Claims, IssuedToken, TokenCodec};

use crate::{
    context::AppContext,
    error::{HelpdeskError, TokenError},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Authenticated context - verifies the bearer access token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = HelpdeskError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or(HelpdeskError::MissingCredentials)?;

        let claims = state.token_codec.verify(&token)?;

        // Only access tokens carry a username; refresh tokens are not accepted here
        let username = claims.set.username.ok_or(TokenError::Malformed)?;

        Ok(AuthContext {
            account_id: claims.set.sub,
            username,
            roles: claims.set.roles.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123token"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123token".to_string()));

        headers.insert("authorization", HeaderValue::from_static("abc123token"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
