/// /api/users/* endpoints
use crate::{
    account::{
        CreateUserRequest, LoginUserRequest, MessageResponse, RefreshTokenRequest, TokenPair,
        UserProfile,
    },
    auth::{AuthContext, IssuedToken},
    config::CookieConfig,
    context::AppContext,
    error::{HelpdeskError, HelpdeskResult},
    validation::ValidatedJson,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/users/register", post(register_user))
        .route("/api/users/login", post(login_user))
        .route("/api/users/refresh", post(refresh_tokens))
        .route("/api/users/logout", post(logout_user))
        .route("/api/users/profile", get(get_user_profile))
}

/// Register endpoint
async fn register_user(
    State(ctx): State<AppContext>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> HelpdeskResult<Json<MessageResponse>> {
    ctx.account_manager
        .create_user(&req.email, &req.password)
        .await?;

    Ok(Json(MessageResponse {
        message: format!("User '{}' has been registered successfully.", req.email),
    }))
}

/// Login endpoint
///
/// Both tokens go in the body; the refresh token is also set as an HTTP-only cookie.
async fn login_user(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginUserRequest>,
) -> HelpdeskResult<(CookieJar, Json<TokenPair>)> {
    let tokens = ctx.account_manager.login(&req.email, &req.password).await?;

    let jar = jar.add(refresh_cookie(&ctx.config.cookie, &tokens.refresh_token));
    Ok((jar, Json(tokens)))
}

/// Refresh endpoint
async fn refresh_tokens(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> HelpdeskResult<(CookieJar, Json<TokenPair>)> {
    let presented = presented_refresh_token(&ctx.config.cookie, &jar, body)?;
    let tokens = ctx.account_manager.refresh(&presented).await?;

    let jar = jar.add(refresh_cookie(&ctx.config.cookie, &tokens.refresh_token));
    Ok((jar, Json(tokens)))
}

/// Logout endpoint
async fn logout_user(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> HelpdeskResult<(CookieJar, Json<MessageResponse>)> {
    let presented = presented_refresh_token(&ctx.config.cookie, &jar, body)?;
    ctx.account_manager.logout(&presented).await?;

    let removal = Cookie::build((ctx.config.cookie.name.clone(), ""))
        .path(ctx.config.cookie.path.clone());
    Ok((
        jar.remove(removal),
        Json(MessageResponse {
            message: "Logged out.".to_string(),
        }),
    ))
}

/// Profile of the authenticated account
async fn get_user_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HelpdeskResult<Json<UserProfile>> {
    let profile = ctx.account_manager.get_profile(auth.account_id).await?;
    Ok(Json(profile))
}

/// Cookie first, then JSON body
fn presented_refresh_token(
    config: &CookieConfig,
    jar: &CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> HelpdeskResult<String> {
    jar.get(&config.name)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .filter(|t| !t.is_empty())
        .ok_or(HelpdeskError::MissingCredentials)
}

/// Secure, HTTP-only cookie living as long as the token
fn refresh_cookie(config: &CookieConfig, token: &IssuedToken) -> Cookie<'static> {
    let max_age = token.seconds_remaining(Utc::now());

    Cookie::build((config.name.clone(), token.token.clone()))
        .path(config.path.clone())
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(max_age))
        .build()
}
