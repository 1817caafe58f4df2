//! # mf-common
//!
//! Shared configuration and error types for the Modula Files API.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{AppError, AppResult, FieldErrors};
