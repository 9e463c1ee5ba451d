//! In-memory implementation of `WorkflowStore`
//!
//! Holds every table behind one `RwLock`, so each operation is atomic with
//! respect to the others. Enforces the same uniqueness, foreign-key and
//! cascade rules as the Postgres schema. All state is lost on restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{Notification, Paper, Review, User};
use crate::db::store::{
    ContentUpdate, NewNotification, NewPaper, NewReview, NewUser, PaperWithAuthor,
    PublicationDetails, ReviewWithReviewer, WorkflowStore, DEFAULT_PAPER_TYPE,
};
use crate::errors::{AppError, Result};
use crate::workflow::{publication_id, PaperStatus, Role};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// Insertion order, oldest first
    papers: Vec<Paper>,
    reviews: Vec<Review>,
    notifications: BTreeMap<i64, Notification>,
    last_notification_id: i64,
    /// Next publication number, unset until the first allocation
    next_publication: Option<u64>,
}

impl Tables {
    fn paper_mut(&mut self, id: Uuid) -> Option<&mut Paper> {
        self.papers.iter_mut().find(|p| p.id == id)
    }

    fn paper(&self, id: Uuid) -> Option<&Paper> {
        self.papers.iter().find(|p| p.id == id)
    }
}

/// Process-local store used for tests and `database.backend = "memory"`
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    // ========================================================================
    // Users
    // ========================================================================

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Duplicate {
                message: format!("email '{}' is already registered", user.email),
            });
        }

        let now = now();
        let model = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(model.id, model.clone());
        Ok(model)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_ids_with_role(&self, role: Role) -> Result<Vec<Uuid>> {
        let tables = self.tables.read().await;
        let mut users: Vec<&User> = tables
            .users
            .values()
            .filter(|u| u.role == role.as_str())
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users.into_iter().map(|u| u.id).collect())
    }

    // ========================================================================
    // Papers
    // ========================================================================

    async fn insert_paper(&self, paper: NewPaper) -> Result<Paper> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&paper.author_id) {
            return Err(AppError::UserNotFound {
                id: paper.author_id.to_string(),
            });
        }

        let now = now();
        let paper_type = if paper.paper_type.is_empty() {
            DEFAULT_PAPER_TYPE.to_string()
        } else {
            paper.paper_type
        };

        let model = Paper {
            id: Uuid::new_v4(),
            title: paper.title,
            abstract_text: paper.abstract_text,
            content: paper.content,
            file_url: paper.file_url,
            author_id: paper.author_id,
            status: PaperStatus::Submitted.to_string(),
            paper_type,
            institution_code: String::new(),
            publication_id: String::new(),
            publication_isced_band: paper.publication_isced_band,
            publication_title_amharic: paper.publication_title_amharic,
            publication_date: None,
            publication_type: paper.publication_type,
            journal_type: paper.journal_type,
            journal_name: paper.journal_name,
            indigenous_knowledge: false,
            fiscal_year: String::new(),
            allocated_budget: 0.0,
            external_budget: 0.0,
            nrf_fund: 0.0,
            research_type: String::new(),
            completion_status: String::new(),
            female_researchers: 0,
            male_researchers: 0,
            outside_female_researchers: 0,
            outside_male_researchers: 0,
            benefited_industry: String::new(),
            ethical_clearance: String::new(),
            pi_name: String::new(),
            pi_gender: String::new(),
            co_investigators: String::new(),
            produced_prototype: String::new(),
            hetril_collaboration: String::new(),
            submitted_to_incubator: String::new(),
            created_at: now,
            updated_at: now,
        };
        tables.papers.push(model.clone());
        Ok(model)
    }

    async fn find_paper(&self, id: Uuid) -> Result<Option<Paper>> {
        Ok(self.tables.read().await.paper(id).cloned())
    }

    async fn update_paper_content(&self, id: Uuid, update: ContentUpdate) -> Result<Option<Paper>> {
        let mut tables = self.tables.write().await;
        let Some(paper) = tables.paper_mut(id) else {
            return Ok(None);
        };

        paper.title = update.title;
        paper.abstract_text = update.abstract_text;
        paper.content = update.content;
        paper.file_url = update.file_url;
        paper.status = update.status.to_string();
        paper.updated_at = now();
        Ok(Some(paper.clone()))
    }

    async fn set_paper_status(&self, id: Uuid, status: PaperStatus) -> Result<Option<Paper>> {
        let mut tables = self.tables.write().await;
        let Some(paper) = tables.paper_mut(id) else {
            return Ok(None);
        };

        paper.status = status.to_string();
        paper.updated_at = now();
        Ok(Some(paper.clone()))
    }

    async fn update_publication_details(
        &self,
        id: Uuid,
        details: &PublicationDetails,
    ) -> Result<Option<Paper>> {
        let mut tables = self.tables.write().await;
        let Some(stored_id) = tables
            .papers
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.publication_id.clone())
        else {
            return Ok(None);
        };

        let publication_id = if stored_id.is_empty() {
            details.publication_id.clone()
        } else {
            stored_id
        };
        if !publication_id.is_empty()
            && tables
                .papers
                .iter()
                .any(|p| p.id != id && p.publication_id == publication_id)
        {
            return Err(AppError::Duplicate {
                message: format!("Publication id {publication_id} is already assigned"),
            });
        }

        let Some(paper) = tables.paper_mut(id) else {
            return Ok(None);
        };
        let d = details.clone();
        paper.institution_code = d.institution_code;
        paper.publication_id = publication_id;
        paper.publication_isced_band = d.publication_isced_band;
        paper.publication_title_amharic = d.publication_title_amharic;
        paper.publication_date = d.publication_date;
        paper.publication_type = d.publication_type;
        paper.journal_type = d.journal_type;
        paper.journal_name = d.journal_name;
        paper.indigenous_knowledge = d.indigenous_knowledge;
        paper.fiscal_year = d.fiscal_year;
        paper.allocated_budget = d.allocated_budget;
        paper.external_budget = d.external_budget;
        paper.nrf_fund = d.nrf_fund;
        paper.research_type = d.research_type;
        paper.completion_status = d.completion_status;
        paper.female_researchers = d.female_researchers;
        paper.male_researchers = d.male_researchers;
        paper.outside_female_researchers = d.outside_female_researchers;
        paper.outside_male_researchers = d.outside_male_researchers;
        paper.benefited_industry = d.benefited_industry;
        paper.ethical_clearance = d.ethical_clearance;
        paper.pi_name = d.pi_name;
        paper.pi_gender = d.pi_gender;
        paper.co_investigators = d.co_investigators;
        paper.produced_prototype = d.produced_prototype;
        paper.hetril_collaboration = d.hetril_collaboration;
        paper.submitted_to_incubator = d.submitted_to_incubator;
        paper.updated_at = now();
        Ok(Some(paper.clone()))
    }

    async fn delete_paper(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.papers.len();
        tables.papers.retain(|p| p.id != id);
        if tables.papers.len() == before {
            return Ok(false);
        }

        tables.reviews.retain(|r| r.paper_id != id);
        tables.notifications.retain(|_, n| n.paper_id != Some(id));
        Ok(true)
    }

    async fn list_papers(&self) -> Result<Vec<PaperWithAuthor>> {
        let tables = self.tables.read().await;
        let papers = tables
            .papers
            .iter()
            .rev()
            .map(|paper| {
                let author = tables.users.get(&paper.author_id);
                PaperWithAuthor {
                    paper: paper.clone(),
                    author_name: author.map(|a| a.name.clone()).unwrap_or_default(),
                    author_email: author.map(|a| a.email.clone()).unwrap_or_default(),
                }
            })
            .collect();
        Ok(papers)
    }

    async fn allocate_publication_id(&self) -> Result<String> {
        let mut tables = self.tables.write().await;
        let legacy = publication_id::next_after(publication_id::greatest(
            tables.papers.iter().map(|p| p.publication_id.as_str()),
        ));
        let number = tables.next_publication.unwrap_or(legacy).max(legacy);
        tables.next_publication = Some(number + 1);
        Ok(publication_id::format(number))
    }

    // ========================================================================
    // Reviews
    // ========================================================================

    async fn insert_review(&self, review: NewReview) -> Result<Review> {
        let mut tables = self.tables.write().await;

        if tables.paper(review.paper_id).is_none() {
            return Err(AppError::PaperNotFound {
                id: review.paper_id.to_string(),
            });
        }
        if !tables.users.contains_key(&review.reviewer_id) {
            return Err(AppError::UserNotFound {
                id: review.reviewer_id.to_string(),
            });
        }
        if tables
            .reviews
            .iter()
            .any(|r| r.paper_id == review.paper_id && r.reviewer_id == review.reviewer_id)
        {
            return Err(AppError::Duplicate {
                message: "reviewer has already reviewed this paper".to_string(),
            });
        }

        let now = now();
        let rubric = review.rubric;
        let model = Review {
            id: Uuid::new_v4(),
            paper_id: review.paper_id,
            reviewer_id: review.reviewer_id,
            rating: review.rating,
            problem_statement: rubric.problem_statement,
            literature_review: rubric.literature_review,
            methodology: rubric.methodology,
            results: rubric.results,
            conclusion: rubric.conclusion,
            originality: rubric.originality,
            clarity_organization: rubric.clarity_organization,
            contribution_knowledge: rubric.contribution_knowledge,
            technical_quality: rubric.technical_quality,
            comments: review.comments,
            recommendation: review.recommendation.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.reviews.push(model.clone());
        Ok(model)
    }

    async fn list_reviews(&self, paper_id: Option<Uuid>) -> Result<Vec<ReviewWithReviewer>> {
        let tables = self.tables.read().await;
        let reviews = tables
            .reviews
            .iter()
            .rev()
            .filter(|r| paper_id.map_or(true, |id| r.paper_id == id))
            .map(|review| {
                let reviewer = tables.users.get(&review.reviewer_id);
                ReviewWithReviewer {
                    review: review.clone(),
                    reviewer_name: reviewer
                        .map(|u| u.name.clone())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    reviewer_email: reviewer.map(|u| u.email.clone()).unwrap_or_default(),
                    paper_title: tables
                        .paper(review.paper_id)
                        .map(|p| p.title.clone())
                        .unwrap_or_else(|| "Unknown Paper".to_string()),
                }
            })
            .collect();
        Ok(reviews)
    }

    async fn reviewer_ids(&self, paper_id: Uuid) -> Result<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .iter()
            .filter(|r| r.paper_id == paper_id)
            .map(|r| r.reviewer_id)
            .collect())
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&notification.user_id) {
            return Err(AppError::UserNotFound {
                id: notification.user_id.to_string(),
            });
        }
        if let Some(paper_id) = notification.paper_id {
            if tables.paper(paper_id).is_none() {
                return Err(AppError::PaperNotFound {
                    id: paper_id.to_string(),
                });
            }
        }

        tables.last_notification_id += 1;
        let model = Notification {
            id: tables.last_notification_id,
            user_id: notification.user_id,
            message: notification.message,
            paper_id: notification.paper_id,
            is_read: false,
            created_at: now(),
        };
        tables.notifications.insert(model.id, model.clone());
        Ok(model)
    }

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .values()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_notification(&self, id: i64) -> Result<Option<Notification>> {
        Ok(self.tables.read().await.notifications.get(&id).cloned())
    }

    async fn mark_notification_read(&self, id: i64) -> Result<Option<Notification>> {
        let mut tables = self.tables.write().await;
        Ok(tables.notifications.get_mut(&id).map(|n| {
            n.is_read = true;
            n.clone()
        }))
    }
}
