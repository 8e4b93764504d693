//! Textbook registration and progress handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use quizforge_common::{
    db::{models::Textbook, Repository},
    errors::{AppError, Result},
};
use quizforge_ingestion::textbook_record;

/// Request to register a textbook already present on the server
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTextbookRequest {
    /// Path inside the configured library directory, absolute or relative to it
    #[validate(length(min = 1, max = 4096))]
    pub file_path: String,

    #[validate(length(min = 1, max = 1000))]
    pub title: Option<String>,
}

/// Response after registering a textbook
#[derive(Serialize)]
pub struct CreateTextbookResponse {
    pub textbook_id: Uuid,
    pub status: String,
    pub message: String,
    pub poll_url: String,
}

#[derive(Serialize)]
pub struct TextbookResponse {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub title: String,
    pub processing_status: String,
    pub total_pages: Option<i32>,
    pub file_size: i64,
    pub chapter_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub upload_date: String,
}

impl TextbookResponse {
    fn new(textbook: Textbook, chapter_count: i64) -> Self {
        Self {
            id: textbook.id,
            filename: textbook.filename,
            original_name: textbook.original_name,
            title: textbook.title,
            processing_status: textbook.processing_status,
            total_pages: textbook.total_pages,
            file_size: textbook.file_size,
            chapter_count,
            failure_reason: textbook.failure_reason,
            upload_date: textbook.upload_date.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub textbook_id: Uuid,
    pub filename: String,
    pub status: String,
    pub total_pages: Option<i32>,
    pub question_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub upload_date: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct ChapterResponse {
    pub id: Uuid,
    pub label: String,
    pub title: String,
    pub level: i32,
    pub page_start: i32,
    pub page_end: Option<i32>,
    pub question_count: i64,
}

/// Register a textbook and start extraction in the background
pub async fn create_textbook(
    State(state): State<AppState>,
    Json(request): Json<CreateTextbookRequest>,
) -> Result<(StatusCode, Json<CreateTextbookResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let is_pdf = std::path::Path::new(&request.file_path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(AppError::UnsupportedFileType {
            filename: request.file_path,
        });
    }

    let path = state.config.ingestion.library_file(&request.file_path)?;
    let record = textbook_record(&path, request.title).map_err(|_| AppError::SourceFileNotFound {
        path: path.display().to_string(),
    })?;

    let repo = Repository::new(state.db.clone());
    let textbook = repo.create_textbook(record).await?;
    let textbook_id = textbook.id;

    tracing::info!(
        textbook_id = %textbook_id,
        title = %textbook.title,
        path = %path.display(),
        "Textbook registered, processing started"
    );

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.process_file(textbook_id, &path).await {
            tracing::warn!(textbook_id = %textbook_id, error = %e, "Textbook processing ended in failure");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateTextbookResponse {
            textbook_id,
            status: textbook.processing_status,
            message: "Textbook registered. Processing started in background.".to_string(),
            poll_url: format!("/v1/textbooks/{}/status", textbook_id),
        }),
    ))
}

/// List all textbooks, newest first
pub async fn list_textbooks(State(state): State<AppState>) -> Result<Json<Vec<TextbookResponse>>> {
    let repo = Repository::new(state.db.clone());

    let textbooks = repo
        .list_textbooks()
        .await?
        .into_iter()
        .map(|(textbook, chapter_count)| TextbookResponse::new(textbook, chapter_count))
        .collect();

    Ok(Json(textbooks))
}

/// Processing status of one textbook
pub async fn get_status(
    State(state): State<AppState>,
    Path(textbook_id): Path<Uuid>,
) -> Result<Json<StatusResponse>> {
    let repo = Repository::new(state.db.clone());

    let textbook = repo
        .find_textbook_by_id(textbook_id)
        .await?
        .ok_or_else(|| AppError::TextbookNotFound {
            id: textbook_id.to_string(),
        })?;

    let question_count = repo.count_questions(textbook_id).await?;

    Ok(Json(StatusResponse {
        textbook_id,
        filename: textbook.filename,
        status: textbook.processing_status,
        total_pages: textbook.total_pages,
        question_count,
        failure_reason: textbook.failure_reason,
        upload_date: textbook.upload_date.to_rfc3339(),
        updated_at: textbook.updated_at.to_rfc3339(),
    }))
}

/// Recovered outline of one textbook
pub async fn list_chapters(
    State(state): State<AppState>,
    Path(textbook_id): Path<Uuid>,
) -> Result<Json<Vec<ChapterResponse>>> {
    let repo = Repository::new(state.db.clone());

    if repo.find_textbook_by_id(textbook_id).await?.is_none() {
        return Err(AppError::TextbookNotFound {
            id: textbook_id.to_string(),
        });
    }

    let chapters = repo
        .list_chapters(textbook_id)
        .await?
        .into_iter()
        .map(|summary| ChapterResponse {
            id: summary.chapter.id,
            label: summary.chapter.label,
            title: summary.chapter.title,
            level: summary.chapter.level,
            page_start: summary.chapter.page_start,
            page_end: summary.chapter.page_end,
            question_count: summary.question_count,
        })
        .collect();

    Ok(Json(chapters))
}
