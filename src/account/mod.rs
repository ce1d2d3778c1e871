/// Account management system
///
/// Handles registration, login, token refresh/logout and profile lookup.

mod manager;

pub use manager::AccountManager;

use crate::{
    auth::IssuedToken,
    validation::{not_blank, ValidatedRequest},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        custom(function = "not_blank", message = "Email address must be not empty."),
        email(message = "Email address has invalid format."),
        length(max = 320, message = "Email address must not be longer than 320 characters.")
    )]
    pub email: String,

    #[validate(
        custom(function = "not_blank", message = "Password must be not empty."),
        length(min = 6, max = 72, message = "Password must be between 6 and 72 characters.")
    )]
    pub password: String,
}

impl ValidatedRequest for CreateUserRequest {
    const FIELD_ORDER: &'static [&'static str] = &["email", "password"];
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginUserRequest {
    #[validate(
        custom(function = "not_blank", message = "Email address must be not empty."),
        email(message = "Email address has invalid format."),
        length(max = 320, message = "Email address must not be longer than 320 characters.")
    )]
    pub email: String,

    #[validate(
        custom(function = "not_blank", message = "Password must be not empty."),
        length(min = 6, max = 72, message = "Password must be between 6 and 72 characters.")
    )]
    pub password: String,
}

impl ValidatedRequest for LoginUserRequest {
    const FIELD_ORDER: &'static [&'static str] = &["email", "password"];
}

/// Refresh/logout body, used when the cookie is absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Token pair returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: IssuedToken,
    pub refresh_token: IssuedToken,
}

/// Profile view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}
