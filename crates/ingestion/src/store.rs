//! Persistence seam for the pipeline
//!
//! The pipeline writes through [`QuestionStore`] so it can run against the
//! database [`Repository`] or the in-memory [`MemoryStore`].

use crate::errors::IngestionError;
use crate::structure::OutlineEntry;
use async_trait::async_trait;
use quizforge_common::db::models::ProcessingState;
use quizforge_common::db::{NewChapter, NewQuestion, NewTextbook, Repository};
use quizforge_common::errors::{AppError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Describe a PDF on disk for registration.
///
/// The stored file name is made unique; the title falls back to the file stem.
pub fn textbook_record(path: &Path, title: Option<String>) -> std::result::Result<NewTextbook, IngestionError> {
    let metadata = std::fs::metadata(path)
        .map_err(|_| IngestionError::FileNotFound(path.display().to_string()))?;

    let original_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "textbook.pdf".to_string());

    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Untitled".to_string())
        });

    Ok(NewTextbook {
        filename: format!("{}_{}", Uuid::new_v4(), original_name),
        original_name,
        title,
        source_path: path.display().to_string(),
        file_size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
    })
}

/// Storage operations needed while processing one textbook
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Move the textbook to `next`, failing on an illegal transition
    async fn update_status(
        &self,
        textbook_id: Uuid,
        next: ProcessingState,
        failure_reason: Option<String>,
    ) -> Result<()>;

    async fn set_total_pages(&self, textbook_id: Uuid, total_pages: u32) -> Result<()>;

    /// Store the outline atomically; ids come back in outline order
    async fn save_outline(&self, textbook_id: Uuid, outline: &[OutlineEntry]) -> Result<Vec<Uuid>>;

    /// Store one batch of questions atomically
    async fn save_questions(&self, questions: Vec<NewQuestion>) -> Result<usize>;
}

fn to_new_chapter(entry: &OutlineEntry) -> Result<NewChapter> {
    Ok(NewChapter {
        label: entry.label.clone(),
        title: entry.title.clone(),
        level: to_i32(entry.level, "level")?,
        page_start: to_i32(entry.start_page, "page_start")?,
        page_end: entry.end_page.map(|p| to_i32(p, "page_end")).transpose()?,
    })
}

fn to_i32(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| AppError::Validation {
        message: format!("{} out of range: {}", field, value),
        field: Some(field.to_string()),
    })
}

#[async_trait]
impl QuestionStore for Repository {
    async fn update_status(
        &self,
        textbook_id: Uuid,
        next: ProcessingState,
        failure_reason: Option<String>,
    ) -> Result<()> {
        Repository::update_status(self, textbook_id, next, failure_reason)
            .await
            .map(|_| ())
    }

    async fn set_total_pages(&self, textbook_id: Uuid, total_pages: u32) -> Result<()> {
        Repository::set_total_pages(self, textbook_id, to_i32(total_pages, "total_pages")?).await
    }

    async fn save_outline(&self, textbook_id: Uuid, outline: &[OutlineEntry]) -> Result<Vec<Uuid>> {
        let chapters = outline.iter().map(to_new_chapter).collect::<Result<Vec<_>>>()?;
        self.insert_chapters(textbook_id, chapters).await
    }

    async fn save_questions(&self, questions: Vec<NewQuestion>) -> Result<usize> {
        self.insert_questions(questions).await
    }
}

/// Everything the memory store has recorded for one textbook
#[derive(Debug, Clone, Default)]
pub struct StoredTextbook {
    pub state: ProcessingState,
    pub failure_reason: Option<String>,
    pub total_pages: Option<u32>,
    pub chapters: Vec<(Uuid, NewChapter)>,
    pub questions: Vec<NewQuestion>,
    /// Every state entered, in order
    pub history: Vec<ProcessingState>,
}

/// In-memory store for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    textbooks: Arc<Mutex<HashMap<Uuid, StoredTextbook>>>,
    fail_question_batches: Arc<Mutex<Vec<usize>>>,
    batches_seen: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a textbook in the `pending` state
    pub fn register(&self, textbook_id: Uuid) {
        let mut textbooks = self.textbooks.lock().unwrap_or_else(|e| e.into_inner());
        textbooks.insert(
            textbook_id,
            StoredTextbook {
                history: vec![ProcessingState::Pending],
                ..StoredTextbook::default()
            },
        );
    }

    /// Make the n-th (0-based) call to `save_questions` fail
    pub fn fail_question_batch(&self, batch: usize) {
        self.fail_question_batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(batch);
    }

    pub fn get(&self, textbook_id: Uuid) -> Option<StoredTextbook> {
        self.textbooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&textbook_id)
            .cloned()
    }

    fn with_textbook<T>(
        &self,
        textbook_id: Uuid,
        f: impl FnOnce(&mut StoredTextbook) -> Result<T>,
    ) -> Result<T> {
        let mut textbooks = self.textbooks.lock().unwrap_or_else(|e| e.into_inner());
        let textbook = textbooks
            .get_mut(&textbook_id)
            .ok_or_else(|| AppError::TextbookNotFound { id: textbook_id.to_string() })?;
        f(textbook)
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn update_status(
        &self,
        textbook_id: Uuid,
        next: ProcessingState,
        failure_reason: Option<String>,
    ) -> Result<()> {
        self.with_textbook(textbook_id, |textbook| {
            if !textbook.state.can_transition_to(next) {
                return Err(AppError::InvalidStateTransition {
                    from: textbook.state.to_string(),
                    to: next.to_string(),
                });
            }

            textbook.state = next;
            textbook.history.push(next);
            if failure_reason.is_some() {
                textbook.failure_reason = failure_reason;
            }
            Ok(())
        })
    }

    async fn set_total_pages(&self, textbook_id: Uuid, total_pages: u32) -> Result<()> {
        self.with_textbook(textbook_id, |textbook| {
            textbook.total_pages = Some(total_pages);
            Ok(())
        })
    }

    async fn save_outline(&self, textbook_id: Uuid, outline: &[OutlineEntry]) -> Result<Vec<Uuid>> {
        let chapters = outline.iter().map(to_new_chapter).collect::<Result<Vec<_>>>()?;

        self.with_textbook(textbook_id, |textbook| {
            let stored: Vec<(Uuid, NewChapter)> =
                chapters.into_iter().map(|c| (Uuid::new_v4(), c)).collect();
            let ids = stored.iter().map(|(id, _)| *id).collect();
            textbook.chapters.extend(stored);
            Ok(ids)
        })
    }

    async fn save_questions(&self, questions: Vec<NewQuestion>) -> Result<usize> {
        let batch = {
            let mut seen = self.batches_seen.lock().unwrap_or_else(|e| e.into_inner());
            let batch = *seen;
            *seen += 1;
            batch
        };

        let should_fail = self
            .fail_question_batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&batch);
        if should_fail {
            return Err(AppError::Transaction {
                message: format!("question batch {} rejected", batch),
            });
        }

        let Some(textbook_id) = questions.first().map(|q| q.textbook_id) else {
            return Ok(0);
        };

        self.with_textbook(textbook_id, |textbook| {
            let count = questions.len();
            textbook.questions.extend(questions);
            Ok(count)
        })
    }
}
