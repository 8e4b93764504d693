//! Configuration management for QuizForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use crate::errors::AppError;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Extraction pipeline configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origin (any origin when unset)
    pub cors_origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create missing tables from the entity definitions on startup
    #[serde(default = "default_bootstrap_schema")]
    pub bootstrap_schema: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Pages read and persisted per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on text extraction for one batch, 0 disables the limit
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,

    /// Directory relative textbook paths are resolved against
    #[serde(default = "default_library_dir")]
    pub library_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 30 }
fn default_database_url() -> String { "sqlite://textbook_questions.db?mode=rwc".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_bootstrap_schema() -> bool { true }
fn default_batch_size() -> usize { crate::DEFAULT_BATCH_SIZE }
fn default_extraction_timeout() -> u64 { 0 }
fn default_library_dir() -> String { "uploads".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 0 }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__INGESTION__BATCH_SIZE=25
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl IngestionConfig {
    /// Extraction timeout, `None` when disabled
    pub fn extraction_timeout(&self) -> Option<Duration> {
        match self.extraction_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Resolve a textbook path against the library directory
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let candidate = path.as_ref();
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            Path::new(&self.library_dir).join(candidate)
        }
    }

    /// Resolve a client-supplied path to an existing file inside the library
    /// directory. The returned path is canonical.
    pub fn library_file(&self, path: &str) -> crate::Result<PathBuf> {
        let outside = || AppError::PathOutsideLibrary { path: path.to_string() };

        let requested = Path::new(path);
        if requested.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(outside());
        }

        let library = Path::new(&self.library_dir)
            .canonicalize()
            .map_err(|e| AppError::Configuration {
                message: format!("library directory {} unavailable: {}", self.library_dir, e),
            })?;

        if requested.is_absolute()
            && !requested.starts_with(&library)
            && !requested.starts_with(&self.library_dir)
        {
            return Err(outside());
        }

        let resolved = self.resolve_path(requested);
        let canonical = resolved.canonicalize().map_err(|_| AppError::SourceFileNotFound {
            path: resolved.display().to_string(),
        })?;

        // symlinks may still point elsewhere
        if !canonical.starts_with(&library) {
            return Err(outside());
        }

        Ok(canonical)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            cors_origin: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            bootstrap_schema: default_bootstrap_schema(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            extraction_timeout_secs: default_extraction_timeout(),
            library_dir: default_library_dir(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            ingestion: IngestionConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.ingestion.batch_size, 10);
        assert!(config.database.url.starts_with("sqlite://"));
    }

    #[test]
    fn test_request_timeout() {
        let config = AppConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_extraction_timeout_disabled_by_zero() {
        let mut ingestion = IngestionConfig::default();
        assert_eq!(ingestion.extraction_timeout(), None);

        ingestion.extraction_timeout_secs = 45;
        assert_eq!(ingestion.extraction_timeout(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_resolve_path_against_library() {
        let ingestion = IngestionConfig {
            library_dir: "/srv/books".to_string(),
            ..IngestionConfig::default()
        };
        assert_eq!(ingestion.resolve_path("physics.pdf"), PathBuf::from("/srv/books/physics.pdf"));
        assert_eq!(ingestion.resolve_path("/tmp/bio.pdf"), PathBuf::from("/tmp/bio.pdf"));
    }

    #[test]
    fn test_library_file_stays_inside_library() {
        let root = std::env::temp_dir().join(format!("quizforge-library-{}", std::process::id()));
        let library = root.join("books");
        std::fs::create_dir_all(&library).unwrap();
        std::fs::write(library.join("physics.pdf"), b"%PDF-1.5").unwrap();
        std::fs::write(root.join("private.pdf"), b"%PDF-1.5").unwrap();

        let ingestion = IngestionConfig {
            library_dir: library.display().to_string(),
            ..IngestionConfig::default()
        };
        let canonical = library.canonicalize().unwrap().join("physics.pdf");

        assert_eq!(ingestion.library_file("physics.pdf").unwrap(), canonical);
        let absolute = library.join("physics.pdf").display().to_string();
        assert_eq!(ingestion.library_file(&absolute).unwrap(), canonical);

        let private = root.join("private.pdf").display().to_string();
        for path in ["../private.pdf", "/etc/x.pdf", private.as_str()] {
            assert!(
                matches!(ingestion.library_file(path), Err(AppError::PathOutsideLibrary { .. })),
                "{} escaped the library",
                path
            );
        }

        assert!(matches!(
            ingestion.library_file("absent.pdf"),
            Err(AppError::SourceFileNotFound { .. })
        ));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_library_file_requires_library_dir() {
        let ingestion = IngestionConfig {
            library_dir: "/no/such/library".to_string(),
            ..IngestionConfig::default()
        };
        assert!(matches!(
            ingestion.library_file("physics.pdf"),
            Err(AppError::Configuration { .. })
        ));
    }
}
