//! API routes module.

mod download;
pub mod envelope;
mod health;
pub mod middleware;

use crate::AppState;
use axum::Router;
use mf_common::AppError;
use std::sync::Arc;

/// Build the API router with all sub-routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(download::router(state))
        .merge(health::router())
        .fallback(|| async { AppError::NotFound("Not Found".into()) })
        .method_not_allowed_fallback(|| async { AppError::MethodNotAllowed })
}
