//! Textbook entity and its processing state machine

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing state of a textbook.
///
/// Moves strictly forward: `pending -> processing -> completed | failed`.
/// `completed` and `failed` are terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Pending => "pending",
            ProcessingState::Processing => "processing",
            ProcessingState::Completed => "completed",
            ProcessingState::Failed => "failed",
        }
    }

    /// Check if the state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingState::Completed | ProcessingState::Failed)
    }

    /// Whether `self -> next` is a legal forward transition
    pub fn can_transition_to(&self, next: ProcessingState) -> bool {
        use ProcessingState::*;

        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ProcessingState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => ProcessingState::Pending,
            "processing" => ProcessingState::Processing,
            "completed" => ProcessingState::Completed,
            "failed" => ProcessingState::Failed,
            _ => ProcessingState::Pending,
        }
    }
}

impl From<ProcessingState> for String {
    fn from(state: ProcessingState) -> Self {
        state.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "textbooks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Stored file name (unique per upload)
    #[sea_orm(column_type = "Text", unique)]
    pub filename: String,

    #[sea_orm(column_type = "Text")]
    pub original_name: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Absolute path the pipeline reads from
    #[sea_orm(column_type = "Text")]
    pub source_path: String,

    #[sea_orm(column_type = "Text")]
    pub processing_status: String,

    pub total_pages: Option<i32>,

    pub file_size: i64,

    /// Why the pipeline ended in `failed`
    #[sea_orm(column_type = "Text", nullable)]
    pub failure_reason: Option<String>,

    pub upload_date: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the processing status as an enum
    pub fn state(&self) -> ProcessingState {
        ProcessingState::from(self.processing_status.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::chapter::Entity")]
    Chapters,

    #[sea_orm(has_many = "super::question::Entity")]
    Questions,
}

impl Related<super::chapter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chapters.def()
    }
}

impl Related<super::question::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Questions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
