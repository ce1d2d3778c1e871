//! Compact signed tokens (JWT, HMAC-SHA256).
//!
//! The codec holds one active signing key and any number of older keys that
//! are still accepted for verification, so the secret can be rotated without
//! invalidating tokens issued moments before.
use crate::{
    config::MIN_SECRET_LENGTH,
    error::{HelpdeskError, HelpdeskResult, TokenError},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims supplied by the caller when issuing a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Account id
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    /// Unique token id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl ClaimSet {
    pub fn subject(sub: Uuid) -> Self {
        Self {
            sub,
            username: None,
            roles: None,
            jti: None,
        }
    }
}

/// Full decoded payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub set: ClaimSet,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiration (seconds since epoch)
    pub exp: i64,
}

/// Issued token handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Whole seconds from `now` until expiry, floored at zero
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Signs and verifies tokens
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_keys: Vec<DecodingKey>,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec from the active secret and any previous secrets
    pub fn new(active_secret: &str, previous_secrets: &[String]) -> HelpdeskResult<Self> {
        let too_short = active_secret.len() < MIN_SECRET_LENGTH
            || previous_secrets.iter().any(|s| s.len() < MIN_SECRET_LENGTH);
        if too_short {
            return Err(HelpdeskError::Configuration(format!(
                "HMAC-SHA256 keys must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }

        let decoding_keys = std::iter::once(active_secret)
            .chain(previous_secrets.iter().map(String::as_str))
            .map(|s| DecodingKey::from_secret(s.as_bytes()))
            .collect();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(active_secret.as_bytes()),
            decoding_keys,
            validation,
        })
    }

    /// Sign `claims` plus `iat`/`exp` for the given lifetime
    pub fn issue(&self, claims: ClaimSet, lifetime: Duration) -> HelpdeskResult<IssuedToken> {
        let now = Utc::now().timestamp();
        let issued_at = DateTime::from_timestamp(now, 0)
            .ok_or_else(|| HelpdeskError::Internal("Clock out of range".to_string()))?;
        let expires_at = issued_at + lifetime;

        let payload = Claims {
            set: claims,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| HelpdeskError::Internal(format!("Failed to sign token: {}", e)))?;

        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Check signature, structure and expiry; return the claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        for key in &self.decoding_keys {
            match decode::<Claims>(token, key, &self.validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => match e.kind() {
                    // Try the next key
                    ErrorKind::InvalidSignature => continue,
                    ErrorKind::ExpiredSignature => return Err(TokenError::Expired),
                    _ => {
                        tracing::debug!("Token decode failed: {}", e);
                        return Err(TokenError::Malformed);
                    }
                },
            }
        }

        Err(TokenError::BadSignature)
    }

    /// Verify and project a single claim
    pub fn get_claim<T, F>(&self, token: &str, extractor: F) -> Result<T, TokenError>
    where
        F: FnOnce(&Claims) -> T,
    {
        let claims = self.verify(token)?;
        Ok(extractor(&claims))
    }

    pub fn subject(&self, token: &str) -> Result<Uuid, TokenError> {
        self.get_claim(token, |c| c.set.sub)
    }

    pub fn expiration(&self, token: &str) -> Result<DateTime<Utc>, TokenError> {
        self.get_claim(token, |c| DateTime::from_timestamp(c.exp, 0))?
            .ok_or(TokenError::Malformed)
    }

    pub fn roles(&self, token: &str) -> Result<Vec<String>, TokenError> {
        self.get_claim(token, |c| c.set.roles.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";
    const OLD_SECRET: &str = "fedcba9876543210fedcba9876543210";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, &[]).unwrap()
    }

    fn access_claims() -> ClaimSet {
        ClaimSet {
            sub: Uuid::new_v4(),
            username: Some("a@b.com".to_string()),
            roles: Some(vec!["ROLE_ADMIN".to_string(), "ROLE_USER".to_string()]),
            jti: None,
        }
    }

    fn tamper_signature(token: &str) -> String {
        let (head, sig) = token.rsplit_once('.').unwrap();
        let mut bytes = sig.as_bytes().to_vec();
        bytes[3] = if bytes[3] == b'A' { b'B' } else { b'A' };
        format!("{}.{}", head, String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_issue_then_verify_returns_claims() {
        let codec = codec();
        let claims = access_claims();
        let issued = codec.issue(claims.clone(), Duration::minutes(30)).unwrap();

        let decoded = codec.verify(&issued.token).unwrap();
        assert_eq!(decoded.set, claims);
        assert_eq!(decoded.iat, issued.issued_at.timestamp());
        assert_eq!(decoded.exp, issued.expires_at.timestamp());
        assert_eq!(issued.expires_at - issued.issued_at, Duration::minutes(30));
    }

    #[test]
    fn test_subject_only_claims_round_trip() {
        let codec = codec();
        let claims = ClaimSet::subject(Uuid::new_v4());
        let issued = codec.issue(claims.clone(), Duration::days(1)).unwrap();

        assert_eq!(codec.verify(&issued.token).unwrap().set, claims);
        assert!(codec.roles(&issued.token).unwrap().is_empty());
    }

    #[test]
    fn test_three_part_wire_format() {
        let issued = codec().issue(access_claims(), Duration::minutes(5)).unwrap();
        assert_eq!(issued.token.split('.').count(), 3);
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec();
        let issued = codec.issue(access_claims(), Duration::seconds(-60)).unwrap();

        assert_eq!(codec.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_altered_signature_rejected() {
        let codec = codec();
        let issued = codec.issue(access_claims(), Duration::minutes(5)).unwrap();

        let tampered = tamper_signature(&issued.token);
        assert_eq!(codec.verify(&tampered), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_expiry_and_signature_errors_differ() {
        let codec = codec();
        let expired = codec.issue(access_claims(), Duration::seconds(-60)).unwrap();
        let valid = codec.issue(access_claims(), Duration::minutes(5)).unwrap();

        let a = codec.verify(&expired.token).unwrap_err();
        let b = codec.verify(&tamper_signature(&valid.token)).unwrap_err();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(codec.verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let other = TokenCodec::new(OLD_SECRET, &[]).unwrap();
        let issued = other.issue(access_claims(), Duration::minutes(5)).unwrap();

        assert_eq!(codec().verify(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_previous_key_still_verifies() {
        let old = TokenCodec::new(OLD_SECRET, &[]).unwrap();
        let issued = old.issue(access_claims(), Duration::minutes(5)).unwrap();

        let rotated = TokenCodec::new(SECRET, &[OLD_SECRET.to_string()]).unwrap();
        assert!(rotated.verify(&issued.token).is_ok());

        // New tokens are signed with the active key only
        let fresh = rotated.issue(access_claims(), Duration::minutes(5)).unwrap();
        assert_eq!(old.verify(&fresh.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_claim_projections() {
        let codec = codec();
        let claims = access_claims();
        let issued = codec.issue(claims.clone(), Duration::minutes(30)).unwrap();

        assert_eq!(codec.subject(&issued.token).unwrap(), claims.sub);
        assert_eq!(codec.expiration(&issued.token).unwrap(), issued.expires_at);
        assert_eq!(codec.roles(&issued.token).unwrap(), claims.roles.unwrap());
        assert_eq!(
            codec.get_claim(&issued.token, |c| c.set.username.clone()).unwrap(),
            Some("a@b.com".to_string())
        );
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            TokenCodec::new("short", &[]),
            Err(HelpdeskError::Configuration(_))
        ));
        assert!(TokenCodec::new(SECRET, &["short".to_string()]).is_err());
    }

    #[test]
    fn test_seconds_remaining() {
        let issued = codec().issue(access_claims(), Duration::days(1)).unwrap();
        assert_eq!(issued.seconds_remaining(issued.issued_at), 86400);
        assert_eq!(issued.seconds_remaining(issued.expires_at + Duration::seconds(5)), 0);
    }
}
