// handlers/public/system.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::audit::AUDIT_POOL;
use crate::state::AppState;

/// GET / - Service information and the entity endpoints it serves
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let endpoints: Vec<Value> = state
        .catalog
        .iter()
        .map(|d| json!({ "slug": d.slug, "title": d.title, "endpoint": d.endpoint }))
        .collect();

    Json(json!({
        "success": true,
        "data": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "auth_mode": state.config.auth.mode,
            "endpoints": {
                "public": ["/", "/health", "/auth/login"],
                "protected": ["/api/auth/whoami", "/api/auth/logout", "/api/schemas", "/api/users", "/api/lookups/:slug/:field"],
                "entities": endpoints,
            }
        }
    }))
}

/// GET /health - Liveness plus a ping of the core pool when one is configured
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    let Some(url) = state.config.pool_url(AUDIT_POOL) else {
        return (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "database": "not_configured", "timestamp": timestamp }
            })),
        );
    };

    let ping = match state.registry.resolve(AUDIT_POOL, Some(url)).await {
        Ok(pool) => pool.ping().await,
        Err(e) => Err(e),
    };

    match ping {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "database": "connected", "timestamp": timestamp }
            })),
        ),
        Err(e) => {
            tracing::warn!(pool = AUDIT_POOL, error = %e, "Health check ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "data": { "status": "degraded", "database": "unreachable", "timestamp": timestamp }
                })),
            )
        }
    }
}
