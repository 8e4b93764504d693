//! QuizForge Common Library
//!
//! Shared code for the QuizForge services including:
//! - Database entities and repository patterns
//! - Error types and handling
//! - Configuration management
//! - Metrics and tracing setup

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod telemetry;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{DbPool, Repository};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pages processed per pipeline batch unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 10;
