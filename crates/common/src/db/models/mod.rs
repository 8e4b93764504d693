//! SeaORM entity models
//!
//! Database entities for QuizForge

mod textbook;
mod chapter;
mod question;

pub use textbook::{
    Entity as TextbookEntity,
    Model as Textbook,
    ActiveModel as TextbookActiveModel,
    Column as TextbookColumn,
    ProcessingState,
};

pub use chapter::{
    Entity as ChapterEntity,
    Model as Chapter,
    ActiveModel as ChapterActiveModel,
    Column as ChapterColumn,
};

pub use question::{
    Entity as QuestionEntity,
    Model as Question,
    ActiveModel as QuestionActiveModel,
    Column as QuestionColumn,
    QuestionType,
    DEFAULT_DIFFICULTY,
};
