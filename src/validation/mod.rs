/// Request validation
///
/// Wraps `validator` derive checks so a failing request is reported with the
/// first failing field's message, fields taken in declaration order.
use crate::error::{HelpdeskError, HelpdeskResult};
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

const NOT_BLANK: &str = "not_blank";

/// A request body with a fixed field reporting order
pub trait ValidatedRequest: Validate {
    /// Field names in declaration order
    const FIELD_ORDER: &'static [&'static str];
}

/// Run the derive checks and collapse failures to one message
pub fn validate_request<T: ValidatedRequest>(request: &T) -> HelpdeskResult<()> {
    request
        .validate()
        .map_err(|errors| HelpdeskError::Validation(first_message(&errors, T::FIELD_ORDER)))
}

/// Message of the first failing field in `field_order`
pub fn first_message(errors: &ValidationErrors, field_order: &[&str]) -> String {
    let field_errors = errors.field_errors();

    let ordered = field_order.iter().find_map(|field| {
        field_errors
            .iter()
            .find(|(name, _)| &***name == *field)
            .and_then(|(name, errs)| field_message(name, errs))
    });

    ordered
        .or_else(|| {
            field_errors
                .iter()
                .find_map(|(name, errs)| field_message(name, errs))
        })
        .unwrap_or_else(|| "Request is invalid.".to_string())
}

/// A blank value is reported as such, ahead of format or length failures
fn field_message(field: &str, errors: &[ValidationError]) -> Option<String> {
    errors
        .iter()
        .find(|e| e.code == NOT_BLANK)
        .or_else(|| errors.first())
        .map(|e| describe(field, e))
}

fn describe(field: &str, error: &ValidationError) -> String {
    error
        .message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("Field '{}' is invalid.", field))
}

/// Rejects strings that are empty or only whitespace
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(NOT_BLANK));
    }
    Ok(())
}

/// JSON body extractor that validates before the handler runs
///
/// Unparseable bodies become `Validation` errors instead of axum's plain-text rejection.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + ValidatedRequest,
    S: Send + Sync,
{
    type Rejection = HelpdeskError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| HelpdeskError::Validation(rejection.body_text()))?;

        validate_request(&value)?;

        Ok(ValidatedJson(value))
    }
}
