use std::path::PathBuf;

use serde::Deserialize;

/// Human-readable service title.
pub const API_TITLE: &str = "Modula Files API";
/// Public API version.
pub const API_VERSION: &str = "1.0.0";
/// One-line API description.
pub const API_DESCRIPTION: &str = "Modula Internal Files Management API";
/// Default request body cap, 2 GiB.
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 2 * 1024 * 1024 * 1024;

/// Top-level application configuration.
/// Loaded from `FILES_*` environment variables (and an optional `.env` file).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root directory of the mounted archive bucket (default: /gcp-bucket)
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Shared API key expected in `X-M-Api-Key` (empty: auth disabled)
    #[serde(default)]
    pub api_key: String,
    /// Shared API secret expected in `X-M-Api-Secret` (empty: auth disabled)
    #[serde(default)]
    pub api_secret: String,
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,
    /// HTTP port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log level used when `RUST_LOG` is unset (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Maximum accepted request body in bytes (default: 2 GiB)
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_content_length: default_max_content_length(),
        }
    }
}

impl AppConfig {
    /// Load config from `.env` and the process environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from(config::Environment::default())
    }

    /// Load config from the given environment source.
    ///
    /// `FILES_ROOT` maps to `root`, `FILES_SERVER__PORT` to `server.port`.
    pub fn load_from(env: config::Environment) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(
                env.prefix("FILES")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }

    /// Whether the shared-secret header check is active.
    pub fn auth_enabled(&self) -> bool {
        !self.api_key.is_empty() || !self.api_secret.is_empty()
    }

    /// Config rooted at `root` with every other value defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            api_key: String::new(),
            api_secret: String::new(),
            server: ServerConfig::default(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/gcp-bucket")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
/// Saturates on targets where 2 GiB does not fit in `usize`.
fn default_max_content_length() -> usize {
    usize::try_from(DEFAULT_MAX_CONTENT_LENGTH).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::load_from(env(&[])).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/gcp-bucket"));
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.max_content_length, default_max_content_length());
        assert!(!cfg.auth_enabled());
    }

    #[test]
    fn test_env_overrides() {
        let cfg = AppConfig::load_from(env(&[
            ("FILES_ROOT", "/mnt/bucket"),
            ("FILES_API_KEY", "key"),
            ("FILES_API_SECRET", "secret"),
            ("FILES_SERVER__PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(cfg.root, PathBuf::from("/mnt/bucket"));
        assert_eq!(cfg.api_key, "key");
        assert_eq!(cfg.api_secret, "secret");
        assert_eq!(cfg.server.port, 9000);
        assert!(cfg.auth_enabled());
    }

    #[test]
    fn test_max_content_length_override() {
        let cfg =
            AppConfig::load_from(env(&[("FILES_SERVER__MAX_CONTENT_LENGTH", "1048576")])).unwrap();
        assert_eq!(cfg.server.max_content_length, 1024 * 1024);
        assert_eq!(DEFAULT_MAX_CONTENT_LENGTH, 2_147_483_648);
    }

    #[test]
    fn test_unrelated_vars_ignored() {
        let cfg = AppConfig::load_from(env(&[("OTHER_ROOT", "/nope")])).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/gcp-bucket"));
    }
}
