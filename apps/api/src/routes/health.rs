use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
pub async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "AI Resume Analyzer API" }))
}

/// GET /api/health
/// Always 200. An unreachable engine degrades the status instead of failing.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let engine = state.engine.ping().await;

    let (status, engine_payload) = if engine.reachable {
        ("healthy", engine.detail)
    } else {
        ("degraded", Value::String("not connected".to_string()))
    };

    Json(json!({
        "status": status,
        "backend": "running",
        "engine": engine_payload,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
