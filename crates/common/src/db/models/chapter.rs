//! Chapter entity: one recovered outline entry

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chapters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub textbook_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Numeric or dotted label, e.g. "3" or "3.2"
    #[sea_orm(column_type = "Text")]
    pub label: String,

    /// 1 = chapter, 2 = subsection
    pub level: i32,

    pub page_start: i32,

    pub page_end: Option<i32>,

    /// Order in which structure recovery produced the entry
    pub position: i32,
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

    #[sea_orm(has_many = "super::question::Entity")]
    Questions,
}

impl Related<super::textbook::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Textbook.def()
    }
}

impl Related<super::question::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Questions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
