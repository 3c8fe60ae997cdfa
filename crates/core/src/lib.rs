//! Simserver Core Library
//!
//! This crate provides the foundational utilities shared by the index engine
//! and the CLI:
//! - Error handling (`AppError`, `AppResult`, `ErrorKind`)
//! - Logging infrastructure
//! - Global configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorKind};
