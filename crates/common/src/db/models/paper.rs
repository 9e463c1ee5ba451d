//! Paper entity
//!
//! Content, workflow status, and the publication / research-project
//! metadata block. Text metadata defaults to the empty string in the
//! table so reads never have to coalesce.

use crate::errors::Result as AppResult;
use crate::workflow::PaperStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_name = "abstract", column_type = "Text")]
    #[serde(rename = "abstract")]
    pub abstract_text: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text")]
    pub file_url: String,

    pub author_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_name = "type", column_type = "Text")]
    #[serde(rename = "type")]
    pub paper_type: String,

    // Publication metadata
    #[sea_orm(column_type = "Text")]
    pub institution_code: String,

    #[sea_orm(column_type = "Text")]
    pub publication_id: String,

    #[sea_orm(column_type = "Text")]
    pub publication_isced_band: String,

    #[sea_orm(column_type = "Text")]
    pub publication_title_amharic: String,

    pub publication_date: Option<Date>,

    #[sea_orm(column_type = "Text")]
    pub publication_type: String,

    #[sea_orm(column_type = "Text")]
    pub journal_type: String,

    #[sea_orm(column_type = "Text")]
    pub journal_name: String,

    pub indigenous_knowledge: bool,

    // Research-project metadata
    #[sea_orm(column_type = "Text")]
    pub fiscal_year: String,

    pub allocated_budget: f64,

    pub external_budget: f64,

    pub nrf_fund: f64,

    #[sea_orm(column_type = "Text")]
    pub research_type: String,

    #[sea_orm(column_type = "Text")]
    pub completion_status: String,

    pub female_researchers: i32,

    pub male_researchers: i32,

    pub outside_female_researchers: i32,

    pub outside_male_researchers: i32,

    #[sea_orm(column_type = "Text")]
    pub benefited_industry: String,

    #[sea_orm(column_type = "Text")]
    pub ethical_clearance: String,

    #[sea_orm(column_type = "Text")]
    pub pi_name: String,

    #[sea_orm(column_type = "Text")]
    pub pi_gender: String,

    #[sea_orm(column_type = "Text")]
    pub co_investigators: String,

    #[sea_orm(column_type = "Text")]
    pub produced_prototype: String,

    #[sea_orm(column_type = "Text")]
    pub hetril_collaboration: String,

    #[sea_orm(column_type = "Text")]
    pub submitted_to_incubator: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,

    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Get the workflow status as an enum
    pub fn status(&self) -> AppResult<PaperStatus> {
        self.status.parse()
    }

    pub fn has_publication_id(&self) -> bool {
        !self.publication_id.is_empty()
    }
}
