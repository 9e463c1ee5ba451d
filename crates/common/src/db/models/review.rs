//! Review entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub paper_id: Uuid,

    pub reviewer_id: Uuid,

    pub rating: i32,

    // Rubric, each 0..=100
    pub problem_statement: i32,
    pub literature_review: i32,
    pub methodology: i32,
    pub results: i32,
    pub conclusion: i32,
    pub originality: i32,
    pub clarity_organization: i32,
    pub contribution_knowledge: i32,
    pub technical_quality: i32,

    #[sea_orm(column_type = "Text")]
    pub comments: String,

    #[sea_orm(column_type = "Text")]
    pub recommendation: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::PaperId",
        to = "super::paper::Column::Id",
        on_delete = "Cascade"
    )]
    Paper,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReviewerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Reviewer,
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Paper.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviewer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
