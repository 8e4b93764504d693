//! Textbook processing pipeline
//!
//! Drives one textbook through `pending -> processing -> completed | failed`:
//! open the document, recover and store the outline, then read pages in
//! fixed-size chunks, extract questions, attach each to its chapter and
//! persist them one chunk per transaction.

use crate::errors::IngestionError;
use crate::pdf::{LopdfSource, PageSource};
use crate::questions::{extract_questions, QuestionCandidate};
use crate::resolver::ChapterResolver;
use crate::store::QuestionStore;
use crate::structure::{bound_outline, recover_outline, OutlineEntry};
use quizforge_common::config::IngestionConfig;
use quizforge_common::db::models::ProcessingState;
use quizforge_common::db::NewQuestion;
use quizforge_common::metrics::{record_batch_failure, record_chunk, record_pipeline};
use quizforge_common::DEFAULT_BATCH_SIZE;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// A page that produced no text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub page: u32,
    pub message: String,
}

/// Outcome of one chunk of pages
#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub first_page: u32,
    pub last_page: u32,
    pub pages_read: usize,
    pub questions_found: usize,
    pub questions_saved: usize,
    pub page_failures: Vec<PageFailure>,
    /// Set when the chunk's questions were rolled back
    pub persist_error: Option<String>,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub textbook_id: Uuid,
    pub page_count: u32,
    pub outline: Vec<OutlineEntry>,
    pub chunks: Vec<ChunkReport>,
}

impl PipelineReport {
    pub fn questions_found(&self) -> usize {
        self.chunks.iter().map(|c| c.questions_found).sum()
    }

    pub fn questions_saved(&self) -> usize {
        self.chunks.iter().map(|c| c.questions_saved).sum()
    }

    pub fn page_failures(&self) -> usize {
        self.chunks.iter().map(|c| c.page_failures.len()).sum()
    }
}

type PageResult = Result<(u32, Vec<QuestionCandidate>), IngestionError>;

/// Question extraction pipeline over a [`QuestionStore`]
pub struct Pipeline<S> {
    store: S,
    batch_size: u32,
    extraction_timeout: Option<Duration>,
}

impl<S: QuestionStore> Pipeline<S> {
    pub fn new(store: S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: u32::try_from(batch_size).unwrap_or(u32::MAX).max(1),
            extraction_timeout: None,
        }
    }

    /// Pipeline with the default chunk size
    pub fn with_store(store: S) -> Self {
        Self::new(store, DEFAULT_BATCH_SIZE)
    }

    pub fn from_config(store: S, config: &IngestionConfig) -> Self {
        Self::new(store, config.batch_size).with_extraction_timeout(config.extraction_timeout())
    }

    /// Bound text extraction per chunk; pages of a chunk that runs over are
    /// reported as failed
    pub fn with_extraction_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    /// Process a PDF file for an already registered textbook
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn process_file(
        &self,
        textbook_id: Uuid,
        path: &Path,
    ) -> Result<PipelineReport, IngestionError> {
        let path = path.to_path_buf();
        self.run(textbook_id, move || {
            let source: Arc<dyn PageSource> = Arc::new(LopdfSource::open(&path)?);
            Ok(source)
        })
        .await
    }

    /// Process an already opened page source
    #[instrument(skip(self, source))]
    pub async fn process_source(
        &self,
        textbook_id: Uuid,
        source: Arc<dyn PageSource>,
    ) -> Result<PipelineReport, IngestionError> {
        self.run(textbook_id, move || Ok(source)).await
    }

    async fn run<F>(&self, textbook_id: Uuid, open: F) -> Result<PipelineReport, IngestionError>
    where
        F: FnOnce() -> Result<Arc<dyn PageSource>, IngestionError> + Send + 'static,
    {
        let started = Instant::now();

        self.store
            .update_status(textbook_id, ProcessingState::Processing, None)
            .await?;

        info!("Textbook processing started");

        match self.execute(textbook_id, open).await {
            Ok(report) => {
                record_pipeline(started.elapsed().as_secs_f64(), ProcessingState::Completed.as_str());
                info!(
                    pages = report.page_count,
                    outline_entries = report.outline.len(),
                    questions_found = report.questions_found(),
                    questions_saved = report.questions_saved(),
                    page_failures = report.page_failures(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Textbook processing completed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Textbook processing failed");

                if let Err(store_err) = self
                    .store
                    .update_status(textbook_id, ProcessingState::Failed, Some(e.to_string()))
                    .await
                {
                    error!(error = %store_err, "Failed to record failed state");
                }

                record_pipeline(started.elapsed().as_secs_f64(), ProcessingState::Failed.as_str());
                Err(e)
            }
        }
    }

    async fn execute<F>(&self, textbook_id: Uuid, open: F) -> Result<PipelineReport, IngestionError>
    where
        F: FnOnce() -> Result<Arc<dyn PageSource>, IngestionError> + Send + 'static,
    {
        let source = tokio::task::spawn_blocking(open).await??;

        let page_count = {
            let source = source.clone();
            tokio::task::spawn_blocking(move || source.page_count()).await??
        };
        self.store.set_total_pages(textbook_id, page_count).await?;
        info!(page_count, "Document opened");

        let outline = {
            let source = source.clone();
            tokio::task::spawn_blocking(move || {
                let mut outline = recover_outline(source.as_ref(), page_count);
                bound_outline(&mut outline, page_count);
                outline
            })
            .await?
        };

        let chapter_ids = match self.store.save_outline(textbook_id, &outline).await {
            Ok(ids) => ids,
            Err(e) => {
                // questions are still kept, without chapter links
                warn!(error = %e, entries = outline.len(), "Failed to persist outline");
                record_batch_failure("outline");
                Vec::new()
            }
        };

        let resolver = ChapterResolver::new(&outline);
        let mut chunks = Vec::new();

        for first_page in (1..=page_count).step_by(self.batch_size as usize) {
            let last_page = first_page
                .saturating_add(self.batch_size - 1)
                .min(page_count);

            let chunk = self
                .process_chunk(textbook_id, &source, &resolver, &chapter_ids, first_page, last_page)
                .await;

            info!(
                first_page,
                last_page,
                questions_found = chunk.questions_found,
                questions_saved = chunk.questions_saved,
                page_failures = chunk.page_failures.len(),
                "Chunk processed"
            );
            chunks.push(chunk);
        }

        self.store
            .update_status(textbook_id, ProcessingState::Completed, None)
            .await?;

        Ok(PipelineReport {
            textbook_id,
            page_count,
            outline,
            chunks,
        })
    }

    async fn process_chunk(
        &self,
        textbook_id: Uuid,
        source: &Arc<dyn PageSource>,
        resolver: &ChapterResolver,
        chapter_ids: &[Uuid],
        first_page: u32,
        last_page: u32,
    ) -> ChunkReport {
        let mut report = ChunkReport {
            first_page,
            last_page,
            pages_read: 0,
            questions_found: 0,
            questions_saved: 0,
            page_failures: Vec::new(),
            persist_error: None,
        };

        let mut batch = Vec::new();

        for page in self.read_chunk(source.clone(), first_page, last_page).await {
            match page {
                Ok((page_number, candidates)) => {
                    report.pages_read += 1;
                    report.questions_found += candidates.len();

                    let chapter_id = resolver
                        .resolve(page_number)
                        .and_then(|idx| chapter_ids.get(idx).copied());

                    debug!(page = page_number, questions = candidates.len(), "Page extracted");

                    batch.extend(candidates.into_iter().map(|c| NewQuestion {
                        textbook_id,
                        chapter_id,
                        text: c.text,
                        kind: c.kind,
                        page_number: i32::try_from(c.source_page).unwrap_or(i32::MAX),
                        context: c.context,
                        answer: c.answer,
                    }));
                }
                Err(e) => {
                    let page = match &e {
                        IngestionError::PageError { page, .. } => *page,
                        _ => first_page,
                    };
                    warn!(page, error = %e, "Page skipped");
                    report.page_failures.push(PageFailure {
                        page,
                        message: e.to_string(),
                    });
                }
            }
        }

        if !batch.is_empty() {
            match self.store.save_questions(batch).await {
                Ok(saved) => report.questions_saved = saved,
                Err(e) => {
                    warn!(first_page, last_page, error = %e, "Question batch rolled back");
                    record_batch_failure("questions");
                    report.persist_error = Some(e.to_string());
                }
            }
        }

        record_chunk(
            report.pages_read,
            report.page_failures.len(),
            report.questions_found,
            report.questions_saved,
        );

        report
    }

    /// Read and extract every page of the chunk off the async runtime.
    ///
    /// A timeout or a crashed task turns every page of the chunk into a
    /// failure; the blocking read itself is not cancelled.
    async fn read_chunk(
        &self,
        source: Arc<dyn PageSource>,
        first_page: u32,
        last_page: u32,
    ) -> Vec<PageResult> {
        let task = tokio::task::spawn_blocking(move || {
            source
                .page_range(first_page, last_page)
                .into_iter()
                .map(|page| page.map(|p| (p.page_number, extract_questions(&p.text, p.page_number))))
                .collect::<Vec<PageResult>>()
        });

        let joined = match self.extraction_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    let timeout_secs = limit.as_secs();
                    return failed_pages(first_page, last_page, |page| IngestionError::PageError {
                        page,
                        message: IngestionError::ExtractionTimeout {
                            first: first_page,
                            last: last_page,
                            timeout_secs,
                        }
                        .to_string(),
                    });
                }
            },
            None => task.await,
        };

        match joined {
            Ok(pages) => pages,
            Err(e) => {
                let message = IngestionError::from(e).to_string();
                failed_pages(first_page, last_page, |page| IngestionError::PageError {
                    page,
                    message: message.clone(),
                })
            }
        }
    }
}

fn failed_pages(
    first_page: u32,
    last_page: u32,
    error: impl Fn(u32) -> IngestionError,
) -> Vec<PageResult> {
    (first_page..=last_page).map(|page| Err(error(page))).collect()
}
