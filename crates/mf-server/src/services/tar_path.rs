//! Archive path validation.
//!
//! Callers may send any prefix (absolute mount paths, bucket URLs), but only
//! a trailing segment that matches the storage naming convention is kept:
//!
//! ```text
//! {stg|prd}-modula-NNNNN/DD/DD/DD/NNN/NN_NN-NN.tar.gz
//! ```
//!
//! That segment is made only of ASCII digits, fixed literals and `/`, so
//! joining it onto the storage root cannot escape the root.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use mf_common::AppError;
use regex::Regex;

pub const INVALID_TAR_PATH: &str = "Invalid 'tar_path' format";

static TAR_REL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"((?:stg|prd)-modula-[0-9]{5}/[0-9]{2}/[0-9]{2}/[0-9]{2}/[0-9]{3}/[0-9]{2}_[0-9]{2}-[0-9]{2}\.tar\.gz)$",
    )
    .expect("archive path pattern is valid")
});

/// Relative archive path extracted from a caller-supplied `tar_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarRelPath(String);

impl TarRelPath {
    /// Extract the canonical suffix from `tar_path`.
    pub fn extract(tar_path: &str) -> Result<Self, AppError> {
        let matched = TAR_REL_PATTERN
            .captures(tar_path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|rel| !rel.is_empty())
            .ok_or_else(|| AppError::Validation(INVALID_TAR_PATH.into()))?;

        Ok(Self(matched.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute archive location under `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}
