//! Storage abstraction for the publication workflow
//!
//! `WorkflowStore` is everything the workflow and identity services need
//! from persistence. [`Repository`](super::Repository) implements it over
//! Postgres, [`InMemoryStore`](super::InMemoryStore) keeps the same rules
//! in process memory.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::models::{Notification, Paper, Review, User};
use crate::errors::Result;
use crate::workflow::{PaperStatus, Role};

/// Paper type used when the author leaves it empty
pub const DEFAULT_PAPER_TYPE: &str = "Research Paper";

/// User to be inserted; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

/// Paper to be inserted in `submitted`
#[derive(Debug, Clone, Default)]
pub struct NewPaper {
    pub title: String,
    pub abstract_text: String,
    pub content: String,
    pub file_url: String,
    pub author_id: Uuid,
    pub paper_type: String,
    pub publication_title_amharic: String,
    pub publication_isced_band: String,
    pub publication_type: String,
    pub journal_type: String,
    pub journal_name: String,
}

/// Author-editable content plus the requested status
#[derive(Debug, Clone)]
pub struct ContentUpdate {
    pub title: String,
    pub abstract_text: String,
    pub content: String,
    pub file_url: String,
    pub status: PaperStatus,
}

/// The publication and research-project metadata block.
///
/// Written as a whole by `update_publication_details`; an empty
/// `publication_id` asks for one to be generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PublicationDetails {
    #[validate(length(max = 100))]
    pub institution_code: String,
    #[validate(length(max = 100))]
    pub publication_id: String,
    pub publication_isced_band: String,
    #[validate(length(max = 500))]
    pub publication_title_amharic: String,
    pub publication_date: Option<NaiveDate>,
    pub publication_type: String,
    pub journal_type: String,
    pub journal_name: String,
    pub indigenous_knowledge: bool,

    pub fiscal_year: String,
    #[validate(range(min = 0.0))]
    pub allocated_budget: f64,
    #[validate(range(min = 0.0))]
    pub external_budget: f64,
    #[validate(range(min = 0.0))]
    pub nrf_fund: f64,
    pub research_type: String,
    pub completion_status: String,
    #[validate(range(min = 0))]
    pub female_researchers: i32,
    #[validate(range(min = 0))]
    pub male_researchers: i32,
    #[validate(range(min = 0))]
    pub outside_female_researchers: i32,
    #[validate(range(min = 0))]
    pub outside_male_researchers: i32,
    pub benefited_industry: String,
    pub ethical_clearance: String,
    pub pi_name: String,
    pub pi_gender: String,
    pub co_investigators: String,
    pub produced_prototype: String,
    pub hetril_collaboration: String,
    pub submitted_to_incubator: String,
}

/// A reviewer's verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Accept,
    MinorRevision,
    MajorRevision,
    Reject,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Accept => "accept",
            Recommendation::MinorRevision => "minor_revision",
            Recommendation::MajorRevision => "major_revision",
            Recommendation::Reject => "reject",
        }
    }
}

/// Rubric scores, each 0..=100. Every criterion must be scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Rubric {
    #[validate(range(min = 0, max = 100))]
    pub problem_statement: i32,
    #[validate(range(min = 0, max = 100))]
    pub literature_review: i32,
    #[validate(range(min = 0, max = 100))]
    pub methodology: i32,
    #[validate(range(min = 0, max = 100))]
    pub results: i32,
    #[validate(range(min = 0, max = 100))]
    pub conclusion: i32,
    #[validate(range(min = 0, max = 100))]
    pub originality: i32,
    #[validate(range(min = 0, max = 100))]
    pub clarity_organization: i32,
    #[validate(range(min = 0, max = 100))]
    pub contribution_knowledge: i32,
    #[validate(range(min = 0, max = 100))]
    pub technical_quality: i32,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub paper_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: i32,
    pub rubric: Rubric,
    pub comments: String,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub message: String,
    pub paper_id: Option<Uuid>,
}

/// Paper joined with its author's name and email
#[derive(Debug, Clone, Serialize)]
pub struct PaperWithAuthor {
    #[serde(flatten)]
    pub paper: Paper,
    pub author_name: String,
    pub author_email: String,
}

/// Review joined with its reviewer and the paper title
#[derive(Debug, Clone, Serialize)]
pub struct ReviewWithReviewer {
    #[serde(flatten)]
    pub review: Review,
    pub reviewer_name: String,
    pub reviewer_email: String,
    pub paper_title: String,
}

/// Persistence operations used by the workflow.
///
/// Paper updates return `Ok(None)` when the paper does not exist. Inserts
/// that violate a uniqueness rule fail with `AppError::Duplicate`, inserts
/// that reference a missing user or paper fail with the matching
/// not-found error.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    // Users
    async fn insert_user(&self, user: NewUser) -> Result<User>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn user_ids_with_role(&self, role: Role) -> Result<Vec<Uuid>>;

    // Papers
    async fn insert_paper(&self, paper: NewPaper) -> Result<Paper>;
    async fn find_paper(&self, id: Uuid) -> Result<Option<Paper>>;
    async fn update_paper_content(&self, id: Uuid, update: ContentUpdate) -> Result<Option<Paper>>;
    async fn set_paper_status(&self, id: Uuid, status: PaperStatus) -> Result<Option<Paper>>;

    /// Overwrite the metadata block. A publication id already stored on
    /// the paper wins over the one in `details`.
    async fn update_publication_details(
        &self,
        id: Uuid,
        details: &PublicationDetails,
    ) -> Result<Option<Paper>>;

    /// Delete a paper with its reviews and notifications
    async fn delete_paper(&self, id: Uuid) -> Result<bool>;

    /// All papers, newest first
    async fn list_papers(&self) -> Result<Vec<PaperWithAuthor>>;

    /// Hand out the next publication id. Never returns the same id twice.
    async fn allocate_publication_id(&self) -> Result<String>;

    // Reviews
    async fn insert_review(&self, review: NewReview) -> Result<Review>;
    async fn list_reviews(&self, paper_id: Option<Uuid>) -> Result<Vec<ReviewWithReviewer>>;
    async fn reviewer_ids(&self, paper_id: Uuid) -> Result<Vec<Uuid>>;

    // Notifications
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;

    /// A user's notifications, newest first
    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>>;
    async fn find_notification(&self, id: i64) -> Result<Option<Notification>>;
    async fn mark_notification_read(&self, id: i64) -> Result<Option<Notification>>;
}
