use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::server::AppState;

/// GET / - service name, version and endpoint index
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": state.config.helpdesk.title,
            "version": version,
            "api": state.config.api.version,
            "endpoints": {
                "health": "/health (public)",
                "auth": "/api/v1/auth/login, /api/v1/auth/refresh (public); /api/v1/auth/me, /api/v1/auth/logout (protected)",
                "tickets": "/api/v1/tickets[/:id[/thread|/events|/reply|/note]] (protected)",
                "topics": "/api/v1/topics[/:id] (public, staff see more)",
                "departments": "/api/v1/departments[/:id] (protected)",
                "statuses": "/api/v1/statuses (protected)",
                "priorities": "/api/v1/priorities (protected)",
                "cron": "/api/v1/cron (admin or API key)",
                "legacy": "/api/tickets.json (not yet supported)",
            }
        }
    }))
}

/// GET /health - 503 when the database cannot be reached
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
