/// Health check endpoints
///
/// `/health` answers as long as the process is up; `/health/ready` also
/// checks the database.
use crate::{context::AppContext, db};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessStatus {
    pub status: String,
    pub database: String,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/ready", get(readiness_probe))
}

/// Basic health check
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: can we reach the database?
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> (StatusCode, Json<ReadinessStatus>) {
    match db::test_connection(&ctx.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessStatus {
                status: "ready".to_string(),
                database: "healthy".to_string(),
            }),
        ),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessStatus {
                    status: "not_ready".to_string(),
                    database: "unhealthy".to_string(),
                }),
            )
        }
    }
}
