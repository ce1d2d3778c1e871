/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{HelpdeskError, HelpdeskResult, ProblemDetail},
};
use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(crate::api::routes())
        .fallback(not_found)
        // Provide state - converts Router<AppContext> to Router<()>
        .with_state(ctx)
        // Layers go last so they also wrap the fallback
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// 404 handler
async fn not_found() -> Response {
    let status = StatusCode::NOT_FOUND;
    let mut response = (
        status,
        Json(ProblemDetail {
            kind: "about:blank".to_string(),
            title: "Not Found".to_string(),
            status: status.as_u16(),
            detail: "Endpoint not found".to_string(),
        }),
    )
        .into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/problem+json"),
    );
    response
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> HelpdeskResult<()> {
    let addr = ctx.bind_address();

    info!("Helpdesk account service listening on {}", addr);
    info!("   Database: {:?}", ctx.config.storage.database_path);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HelpdeskError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| HelpdeskError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
