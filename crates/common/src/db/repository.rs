//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Input for registering a textbook
#[derive(Debug, Clone)]
pub struct NewTextbook {
    pub filename: String,
    pub original_name: String,
    pub title: String,
    pub source_path: String,
    pub file_size: i64,
}

/// One outline entry ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChapter {
    pub label: String,
    pub title: String,
    pub level: i32,
    pub page_start: i32,
    pub page_end: Option<i32>,
}

/// One extracted question ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub textbook_id: Uuid,
    pub chapter_id: Option<Uuid>,
    pub text: String,
    pub kind: QuestionType,
    pub page_number: i32,
    pub context: String,
    pub answer: Option<String>,
}

/// Chapter with its question count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub chapter: Chapter,
    pub question_count: i64,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Textbook Operations
    // ========================================================================

    /// Register a new textbook in the `pending` state
    pub async fn create_textbook(&self, input: NewTextbook) -> Result<Textbook> {
        let now = chrono::Utc::now();

        let textbook = TextbookActiveModel {
            id: Set(Uuid::new_v4()),
            filename: Set(input.filename),
            original_name: Set(input.original_name),
            title: Set(input.title),
            source_path: Set(input.source_path),
            processing_status: Set(String::from(ProcessingState::Pending)),
            total_pages: Set(None),
            file_size: Set(input.file_size),
            failure_reason: Set(None),
            upload_date: Set(now.into()),
            updated_at: Set(now.into()),
        };

        textbook.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find textbook by ID
    pub async fn find_textbook_by_id(&self, id: Uuid) -> Result<Option<Textbook>> {
        TextbookEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List all textbooks, newest first, with their chapter counts
    pub async fn list_textbooks(&self) -> Result<Vec<(Textbook, i64)>> {
        let textbooks = TextbookEntity::find()
            .order_by_desc(TextbookColumn::UploadDate)
            .all(self.read_conn())
            .await?;

        let counts: HashMap<Uuid, i64> = ChapterEntity::find()
            .select_only()
            .column(ChapterColumn::TextbookId)
            .column_as(Expr::col(ChapterColumn::Id).count(), "chapter_count")
            .group_by(ChapterColumn::TextbookId)
            .into_tuple::<(Uuid, i64)>()
            .all(self.read_conn())
            .await?
            .into_iter()
            .collect();

        Ok(textbooks
            .into_iter()
            .map(|t| {
                let count = counts.get(&t.id).copied().unwrap_or(0);
                (t, count)
            })
            .collect())
    }

    /// Move a textbook to a new processing state.
    ///
    /// Rejects any transition that is not a forward step of the state machine.
    pub async fn update_status(
        &self,
        textbook_id: Uuid,
        next: ProcessingState,
        failure_reason: Option<String>,
    ) -> Result<Textbook> {
        let current = TextbookEntity::find_by_id(textbook_id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::TextbookNotFound { id: textbook_id.to_string() })?;

        let state = current.state();
        if !state.can_transition_to(next) {
            return Err(AppError::InvalidStateTransition {
                from: state.to_string(),
                to: next.to_string(),
            });
        }

        let mut textbook: TextbookActiveModel = current.into();
        textbook.processing_status = Set(String::from(next));
        textbook.updated_at = Set(chrono::Utc::now().into());

        if let Some(reason) = failure_reason {
            textbook.failure_reason = Set(Some(reason));
        }

        textbook.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Record the page count read from the document
    pub async fn set_total_pages(&self, textbook_id: Uuid, total_pages: i32) -> Result<()> {
        let result = TextbookEntity::update_many()
            .col_expr(TextbookColumn::TotalPages, Expr::value(total_pages))
            .col_expr(TextbookColumn::UpdatedAt, Expr::value(chrono::Utc::now().fixed_offset()))
            .filter(TextbookColumn::Id.eq(textbook_id))
            .exec(self.write_conn())
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::TextbookNotFound { id: textbook_id.to_string() });
        }

        Ok(())
    }

    // ========================================================================
    // Chapter Operations
    // ========================================================================

    /// Store a recovered outline in one transaction.
    ///
    /// Returns the new chapter ids in the same order as `chapters`.
    pub async fn insert_chapters(
        &self,
        textbook_id: Uuid,
        chapters: Vec<NewChapter>,
    ) -> Result<Vec<Uuid>> {
        if chapters.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = chapters.iter().map(|_| Uuid::new_v4()).collect();

        let models = chapters
            .into_iter()
            .zip(ids.iter())
            .enumerate()
            .map(|(position, (chapter, id))| ChapterActiveModel {
                id: Set(*id),
                textbook_id: Set(textbook_id),
                title: Set(chapter.title),
                label: Set(chapter.label),
                level: Set(chapter.level),
                page_start: Set(chapter.page_start),
                page_end: Set(chapter.page_end),
                position: Set(position as i32),
            });

        let txn = self.write_conn().begin().await.map_err(|e| AppError::Transaction {
            message: format!("Failed to open outline transaction: {}", e),
        })?;

        ChapterEntity::insert_many(models).exec(&txn).await?;

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: format!("Failed to commit outline: {}", e),
        })?;

        Ok(ids)
    }

    /// Chapters of a textbook in outline order, with question counts
    pub async fn list_chapters(&self, textbook_id: Uuid) -> Result<Vec<ChapterSummary>> {
        let chapters = ChapterEntity::find()
            .filter(ChapterColumn::TextbookId.eq(textbook_id))
            .order_by_asc(ChapterColumn::PageStart)
            .order_by_asc(ChapterColumn::Position)
            .all(self.read_conn())
            .await?;

        let counts: HashMap<Uuid, i64> = QuestionEntity::find()
            .select_only()
            .column(QuestionColumn::ChapterId)
            .column_as(Expr::col(QuestionColumn::Id).count(), "question_count")
            .filter(QuestionColumn::TextbookId.eq(textbook_id))
            .filter(QuestionColumn::ChapterId.is_not_null())
            .group_by(QuestionColumn::ChapterId)
            .into_tuple::<(Option<Uuid>, i64)>()
            .all(self.read_conn())
            .await?
            .into_iter()
            .filter_map(|(chapter_id, count)| chapter_id.map(|id| (id, count)))
            .collect();

        Ok(chapters
            .into_iter()
            .map(|chapter| {
                let question_count = counts.get(&chapter.id).copied().unwrap_or(0);
                ChapterSummary { chapter, question_count }
            })
            .collect())
    }

    // ========================================================================
    // Question Operations
    // ========================================================================

    /// Store one batch of questions in a single transaction.
    ///
    /// Nothing from the batch is kept if any insert fails.
    pub async fn insert_questions(&self, questions: Vec<NewQuestion>) -> Result<usize> {
        if questions.is_empty() {
            return Ok(0);
        }

        let count = questions.len();
        let now = chrono::Utc::now();

        let models = questions.into_iter().map(|q| QuestionActiveModel {
            id: Set(Uuid::new_v4()),
            textbook_id: Set(q.textbook_id),
            chapter_id: Set(q.chapter_id),
            question_text: Set(q.text),
            question_type: Set(String::from(q.kind)),
            page_number: Set(q.page_number),
            context: Set(q.context),
            answer: Set(q.answer),
            difficulty: Set(DEFAULT_DIFFICULTY.to_string()),
            created_at: Set(now.into()),
        });

        let txn = self.write_conn().begin().await.map_err(|e| AppError::Transaction {
            message: format!("Failed to open question batch transaction: {}", e),
        })?;

        QuestionEntity::insert_many(models).exec(&txn).await?;

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: format!("Failed to commit question batch: {}", e),
        })?;

        Ok(count)
    }

    /// Number of questions stored for a textbook
    pub async fn count_questions(&self, textbook_id: Uuid) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        QuestionEntity::find()
            .filter(QuestionColumn::TextbookId.eq(textbook_id))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }
}
