//! Ingestion error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Page {page} unreadable: {message}")]
    PageError { page: u32, message: String },

    #[error("Text extraction for pages {first}-{last} timed out after {timeout_secs}s")]
    ExtractionTimeout { first: u32, last: u32, timeout_secs: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] quizforge_common::errors::AppError),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl From<tokio::task::JoinError> for IngestionError {
    fn from(e: tokio::task::JoinError) -> Self {
        IngestionError::TaskFailed(e.to_string())
    }
}
