//! # Modula Files API server
//!
//! Serves single members out of gzip tar archives stored on a mounted
//! bucket, behind a shared-secret header check.

pub mod api;
pub mod services;

#[cfg(test)]
mod test_support;

use std::any::Any;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{middleware, Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use mf_common::error::error_body;
use mf_common::AppConfig;

/// Shared application state available to all handlers.
pub struct AppState {
    pub config: AppConfig,
}

/// Build the full application router with its middleware stack.
pub fn app(state: Arc<AppState>) -> Router {
    with_layers(api::router(state.clone()), state)
}

// Layers wrap bottom-up: the last one added sees the request first.
fn with_layers(router: Router, state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_content_length;

    router
        .layer(middleware::from_fn(api::envelope::wrap_json))
        .layer(middleware::from_fn_with_state(
            state,
            api::middleware::require_api_key,
        ))
        .layer(middleware::from_fn(api::middleware::request_context))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("0"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(DefaultBodyLimit::max(body_limit))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let body = error_body(status, &format!("Unexpected error: {detail}"));
    (status, Json(body)).into_response()
}
