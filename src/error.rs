/// Unified error types for the helpdesk account service
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a token was rejected
///
/// The public message is the same for every kind; the distinction is kept
/// so callers and logs can tell an expired session from a forged one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token is malformed")]
    Malformed,

    #[error("token has been revoked")]
    Revoked,
}

/// Main error type for the service
#[derive(Error, Debug)]
pub enum HelpdeskError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed input; carries the first failing field's message
    #[error("{0}")]
    Validation(String),

    /// Registration with an email that is already taken
    #[error("User '{0}' already exists.")]
    AccountAlreadyExists(String),

    /// Profile lookup miss
    #[error("User '{0}' not found.")]
    AccountNotFound(String),

    /// Bad email or password. Never says which one.
    #[error("Bad credentials.")]
    AuthenticationFailed,

    /// No bearer token on a protected endpoint
    #[error("Authentication is required.")]
    MissingCredentials,

    /// Token rejected by the codec or the refresh-token table
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Deployment precondition not met (e.g. missing default role)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// RFC 7807 problem document
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl HelpdeskError {
    /// HTTP status for this error kind
    pub fn status(&self) -> StatusCode {
        match self {
            HelpdeskError::Validation(_) => StatusCode::BAD_REQUEST,
            HelpdeskError::AccountAlreadyExists(_) => StatusCode::CONFLICT,
            HelpdeskError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            HelpdeskError::AuthenticationFailed
            | HelpdeskError::MissingCredentials
            | HelpdeskError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            HelpdeskError::Configuration(_)
            | HelpdeskError::Database(_)
            | HelpdeskError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller
    pub fn public_detail(&self) -> String {
        match self {
            HelpdeskError::InvalidToken(_) => "Invalid or expired token.".to_string(),
            // Don't leak details
            HelpdeskError::Configuration(_)
            | HelpdeskError::Database(_)
            | HelpdeskError::Internal(_) => "Unexpected error occurred.".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Convert HelpdeskError to HTTP response
impl IntoResponse for HelpdeskError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = ?self, "Unexpected error occurred");
        } else if let HelpdeskError::InvalidToken(kind) = &self {
            tracing::warn!(%kind, "Rejected token");
        }

        let body = Json(ProblemDetail {
            kind: "about:blank".to_string(),
            title: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            status: status.as_u16(),
            detail: self.public_detail(),
        });

        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

/// Result type alias for service operations
pub type HelpdeskResult<T> = Result<T, HelpdeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            HelpdeskError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HelpdeskError::AccountAlreadyExists("a@b.com".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            HelpdeskError::AccountNotFound("id".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            HelpdeskError::AuthenticationFailed.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            HelpdeskError::InvalidToken(TokenError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            HelpdeskError::Configuration("role".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conflict_detail_names_email() {
        let err = HelpdeskError::AccountAlreadyExists("a@b.com".into());
        assert_eq!(err.public_detail(), "User 'a@b.com' already exists.");
    }

    #[test]
    fn test_token_kinds_share_public_message() {
        let expired = HelpdeskError::InvalidToken(TokenError::Expired).public_detail();
        let forged = HelpdeskError::InvalidToken(TokenError::BadSignature).public_detail();
        assert_eq!(expired, forged);
    }

    #[test]
    fn test_server_errors_are_opaque() {
        let err = HelpdeskError::Configuration("Role 'ROLE_USER' not found.".into());
        assert_eq!(err.public_detail(), "Unexpected error occurred.");

        let err = HelpdeskError::Internal("hash failure".into());
        assert!(!err.public_detail().contains("hash"));
    }
}
