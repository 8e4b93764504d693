//! QuizForge Ingestion
//!
//! Turns a PDF textbook into an outline and a set of typed questions:
//! - `pdf`: page text supply
//! - `structure`: outline recovery from the table of contents or headings
//! - `questions`: question extraction and classification
//! - `resolver`: page to chapter mapping
//! - `pipeline`: chunked orchestration and the processing state machine

pub mod errors;
pub mod pdf;
pub mod pipeline;
pub mod questions;
pub mod resolver;
pub mod store;
pub mod structure;

pub use errors::IngestionError;
pub use pdf::{LopdfSource, PageSource, PageText, StaticPages};
pub use pipeline::{ChunkReport, PageFailure, Pipeline, PipelineReport};
pub use questions::{extract_questions, QuestionCandidate};
pub use resolver::{resolve, ChapterResolver};
pub use store::{textbook_record, MemoryStore, QuestionStore};
pub use structure::{bound_outline, recover_outline, OutlineEntry};
