//! Archive member download endpoint.
//!
//! `GET /download?filename=<member>&tar_path=<archive path>` extracts one
//! member from a gzip tar archive under the configured root and returns it
//! as an attachment.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::services::archive;
use crate::services::tar_path::TarRelPath;
use crate::AppState;
use mf_common::{AppError, AppResult, FieldErrors};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/download", get(download_file))
        .route("/download/", get(download_file))
        .with_state(state)
}

// ─── Request ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    filename: Option<String>,
    tar_path: Option<String>,
}

/// Validated download parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub filename: String,
    pub tar_path: String,
}

fn required(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<String>,
) -> Option<String> {
    match value {
        None => {
            errors
                .entry(field)
                .or_default()
                .push("Missing data for required field.".into());
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors
                .entry(field)
                .or_default()
                .push(format!("{field} must not be empty"));
            None
        }
        Some(v) => Some(v),
    }
}

impl DownloadQuery {
    fn validate(self) -> AppResult<DownloadRequest> {
        let mut errors = FieldErrors::new();
        let filename = required(&mut errors, "filename", self.filename);
        let tar_path = required(&mut errors, "tar_path", self.tar_path);

        match (filename, tar_path) {
            (Some(filename), Some(tar_path)) => Ok(DownloadRequest { filename, tar_path }),
            _ => Err(AppError::InvalidFields(errors)),
        }
    }
}

// ─── Handler ─────────────────────────────────────────────────

async fn download_file(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let request = query.validate()?;

    let rel = TarRelPath::extract(&request.tar_path)?;
    let archive_path = rel.resolve(&state.config.root);

    let member = request.filename.clone();
    let data = tokio::task::spawn_blocking(move || archive::read_member(&archive_path, &member))
        .await
        .map_err(anyhow::Error::from)??;

    tracing::info!(
        tar_path = rel.as_str(),
        filename = %request.filename,
        bytes = data.len(),
        "Serving archive member"
    );

    attachment(data, &request.filename)
}

// ─── Response ────────────────────────────────────────────────

/// Wrap `data` as a downloadable file named `filename`.
pub fn attachment(data: Vec<u8>, filename: &str) -> AppResult<Response> {
    let len = data.len();
    let disposition = content_disposition(filename)?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
        ],
        Body::from(data),
    )
        .into_response())
}

fn is_plain_byte(b: u8) -> bool {
    (0x20..=0x7e).contains(&b) && b != b'"' && b != b'\\'
}

fn is_plain_filename(filename: &str) -> bool {
    filename.bytes().all(is_plain_byte)
}

/// `Content-Disposition` value for `filename`.
///
/// Names that cannot be quoted verbatim get an ASCII fallback plus an
/// RFC 5987 `filename*` parameter carrying the exact UTF-8 name.
fn content_disposition(filename: &str) -> AppResult<HeaderValue> {
    let value = if is_plain_filename(filename) {
        format!("attachment; filename=\"{filename}\"")
    } else {
        let fallback: String = filename
            .chars()
            .map(|c| match u8::try_from(c) {
                Ok(b) if is_plain_byte(b) => c,
                _ => '_',
            })
            .collect();
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            percent_encode(filename)
        )
    };

    // Both branches emit visible ASCII only, so this cannot fail for any `&str`.
    HeaderValue::from_str(&value).map_err(|e| {
        AppError::Internal(anyhow::anyhow!("Invalid Content-Disposition for {filename:?}: {e}"))
    })
}

fn percent_encode(value: &str) -> String {
    const ATTR_CHARS: &[u8] = b"!#$&+-.^_`|~";

    let mut out = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || ATTR_CHARS.contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
