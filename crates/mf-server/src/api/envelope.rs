//! Response envelope. Successful JSON object bodies gain `"ok": true`.
//!
//! Attachments and other non-JSON bodies are passed through untouched.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use mf_common::AppError;

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Body with `ok: true` added, or `None` when it should be left alone.
fn wrap(bytes: &[u8]) -> Option<Vec<u8>> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(mut map)) if !map.contains_key("ok") => {
            map.insert("ok".into(), Value::Bool(true));
            serde_json::to_vec(&map).ok()
        }
        _ => None,
    }
}

pub async fn wrap_json(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if !response.status().is_success() || !is_json(response.headers()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::Internal(anyhow::anyhow!("Failed to buffer response: {e}"))
                .into_response()
        }
    };

    match wrap(&bytes) {
        Some(wrapped) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(wrapped))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_adds_ok_to_objects() {
        let wrapped = wrap(br#"{"data":"x"}"#).unwrap();
        let value: Value = serde_json::from_slice(&wrapped).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["data"], "x");
    }

    #[test]
    fn test_wrap_leaves_existing_ok_and_non_objects() {
        assert!(wrap(br#"{"ok":false}"#).is_none());
        assert!(wrap(b"[1,2,3]").is_none());
        assert!(wrap(b"not json").is_none());
    }
}
