//! Health check endpoint.

use axum::{routing::get, Json, Router};
use mf_common::config::{API_TITLE, API_VERSION};
use serde_json::{json, Value};

pub fn router() -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/healthz/", get(health_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "ok": true,
        "status": "healthy",
        "service": API_TITLE,
        "version": API_VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
