//! Question entity and question type classification

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Question type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Essay,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Essay => "essay",
            QuestionType::ShortAnswer => "short_answer",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for QuestionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "multiple_choice" => QuestionType::MultipleChoice,
            "true_false" => QuestionType::TrueFalse,
            "essay" => QuestionType::Essay,
            _ => QuestionType::ShortAnswer,
        }
    }
}

impl From<QuestionType> for String {
    fn from(kind: QuestionType) -> Self {
        kind.as_str().to_string()
    }
}

/// Difficulty assigned to freshly extracted questions
pub const DEFAULT_DIFFICULTY: &str = "medium";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "questions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub textbook_id: Uuid,

    pub chapter_id: Option<Uuid>,

    #[sea_orm(column_type = "Text")]
    pub question_text: String,

    #[sea_orm(column_type = "Text")]
    pub question_type: String,

    pub page_number: i32,

    /// Surrounding page text
    #[sea_orm(column_type = "Text")]
    pub context: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub answer: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub difficulty: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn kind(&self) -> QuestionType {
        QuestionType::from(self.question_type.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::textbook::Entity",
        from = "Column::TextbookId",
        to = "super::textbook::Column::Id",
        on_delete = "Cascade"
    )]
    Textbook,

    #[sea_orm(
        belongs_to = "super::chapter::Entity",
        from = "Column::ChapterId",
        to = "super::chapter::Column::Id",
        on_delete = "SetNull"
    )]
    Chapter,
}

impl Related<super::textbook::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Textbook.def()
    }
}

impl Related<super::chapter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chapter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_type_strings() {
        assert_eq!(QuestionType::MultipleChoice.as_str(), "multiple_choice");
        assert_eq!(QuestionType::from("true_false".to_string()), QuestionType::TrueFalse);
        assert_eq!(QuestionType::from("unknown".to_string()), QuestionType::ShortAnswer);
        assert_eq!(
            serde_json::to_string(&QuestionType::Essay).unwrap(),
            "\"essay\""
        );
    }
}
