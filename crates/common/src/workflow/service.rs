//! The paper workflow
//!
//! Each operation authorizes the actor first, then reads, checks the
//! transition, persists, and finally hands a fan-out plan to the
//! [`Notifier`]. The operation returns as soon as the plan is dispatched.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::config::WorkflowConfig;
use crate::db::models::{Notification, Paper, Review};
use crate::db::store::{
    ContentUpdate, NewNotification, NewPaper, NewReview, PaperWithAuthor, PublicationDetails,
    Recommendation, ReviewWithReviewer, Rubric, WorkflowStore,
};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::workflow::fanout::{Audience, FanoutPlan, Notifier};
use crate::workflow::{Actor, Operation, PaperStatus, Role};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreatePaper {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub file_url: String,
    #[serde(default, rename = "type")]
    pub paper_type: String,
    #[serde(default)]
    pub publication_title_amharic: String,
    #[serde(default)]
    pub publication_isced_band: String,
    #[serde(default)]
    pub publication_type: String,
    #[serde(default)]
    pub journal_type: String,
    #[serde(default)]
    pub journal_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePaper {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub file_url: String,
    /// Target status; absent keeps the current one
    #[serde(default)]
    pub status: Option<PaperStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReview {
    pub paper_id: Uuid,
    #[validate(range(min = 0, max = 100))]
    pub rating: i32,
    #[serde(flatten)]
    #[validate(nested)]
    pub rubric: Rubric,
    #[serde(default)]
    pub comments: String,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateNotification {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[serde(default)]
    pub paper_id: Option<Uuid>,
}

/// Paper state machine, reviews and notifications
#[derive(Clone)]
pub struct WorkflowService {
    store: Arc<dyn WorkflowStore>,
    notifier: Notifier,
    policy: WorkflowConfig,
}

impl WorkflowService {
    pub fn new(store: Arc<dyn WorkflowStore>, policy: WorkflowConfig) -> Self {
        let notifier = Notifier::new(store.clone());
        Self {
            store,
            notifier,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    async fn load_paper(&self, paper_id: Uuid) -> Result<Paper> {
        self.store
            .find_paper(paper_id)
            .await?
            .ok_or_else(|| AppError::PaperNotFound {
                id: paper_id.to_string(),
            })
    }

    fn ensure_owner(&self, actor: &Actor, paper: &Paper) -> Result<()> {
        if self.policy.enforce_ownership
            && actor.role == Role::Author
            && paper.author_id != actor.user_id
        {
            return Err(AppError::Forbidden {
                message: "authors may only change their own papers".to_string(),
            });
        }
        Ok(())
    }

    fn dispatch(&self, plan: FanoutPlan) {
        if !plan.is_empty() {
            self.notifier.dispatch(plan);
        }
    }

    // ========================================================================
    // Papers
    // ========================================================================

    /// Submit a new paper. Every editor is told about it.
    pub async fn create_paper(&self, actor: Actor, input: CreatePaper) -> Result<Paper> {
        actor.authorize(Operation::CreatePaper)?;
        input.validate()?;

        let paper = self
            .store
            .insert_paper(NewPaper {
                title: input.title,
                abstract_text: input.abstract_text,
                content: input.content,
                file_url: input.file_url,
                author_id: actor.user_id,
                paper_type: input.paper_type,
                publication_title_amharic: input.publication_title_amharic,
                publication_isced_band: input.publication_isced_band,
                publication_type: input.publication_type,
                journal_type: input.journal_type,
                journal_name: input.journal_name,
            })
            .await?;

        info!(
            paper_id = %paper.id,
            user_id = %actor.user_id,
            operation = %Operation::CreatePaper,
            "Paper submitted"
        );
        metrics::record_transition(Operation::CreatePaper.as_str(), &paper.status);

        self.dispatch(FanoutPlan::for_paper(paper.id).notify(
            Audience::Role(Role::Editor),
            format!("New paper submitted: {}", paper.title),
        ));

        Ok(paper)
    }

    /// Overwrite content and possibly move the status.
    ///
    /// Moving into approved, rejected or published notifies the author and
    /// every reviewer of the paper.
    pub async fn update_paper(&self, actor: Actor, paper_id: Uuid, input: UpdatePaper) -> Result<Paper> {
        actor.authorize(Operation::UpdatePaper)?;
        input.validate()?;

        let current = self.load_paper(paper_id).await?;
        self.ensure_owner(&actor, &current)?;

        let from = current.status()?;
        let to = input.status.unwrap_or(from);
        if self.policy.enforce_transitions {
            from.ensure_transition(to)?;
        }

        let paper = self
            .store
            .update_paper_content(
                paper_id,
                ContentUpdate {
                    title: input.title,
                    abstract_text: input.abstract_text,
                    content: input.content,
                    file_url: input.file_url,
                    status: to,
                },
            )
            .await?
            .ok_or_else(|| AppError::PaperNotFound {
                id: paper_id.to_string(),
            })?;

        info!(
            paper_id = %paper_id,
            user_id = %actor.user_id,
            from = %from,
            to = %to,
            "Paper updated"
        );

        if to != from {
            metrics::record_transition(Operation::UpdatePaper.as_str(), to.as_str());
        }

        if to != from && to.is_decision() {
            self.dispatch(
                FanoutPlan::for_paper(paper.id)
                    .notify(
                        Audience::User(paper.author_id),
                        format!("Your paper '{}' has been {}", paper.title, to),
                    )
                    .notify(
                        Audience::ReviewersOf(paper.id),
                        format!("Admin decision: Paper '{}' has been {}", paper.title, to),
                    ),
            );
        }

        Ok(paper)
    }

    /// Move a paper to `recommended_for_publication`; the author and every
    /// admin are told.
    pub async fn recommend_for_publication(&self, actor: Actor, paper_id: Uuid) -> Result<Paper> {
        actor.authorize(Operation::RecommendPaper)?;

        let current = self.load_paper(paper_id).await?;
        let from = current.status()?;
        let to = PaperStatus::RecommendedForPublication;
        if self.policy.enforce_transitions {
            from.ensure_transition(to)?;
        }

        let paper = self
            .store
            .set_paper_status(paper_id, to)
            .await?
            .ok_or_else(|| AppError::PaperNotFound {
                id: paper_id.to_string(),
            })?;

        info!(
            paper_id = %paper_id,
            user_id = %actor.user_id,
            from = %from,
            "Paper recommended for publication"
        );
        metrics::record_transition(Operation::RecommendPaper.as_str(), to.as_str());

        self.dispatch(
            FanoutPlan::for_paper(paper.id)
                .notify(
                    Audience::User(paper.author_id),
                    format!(
                        "Your paper '{}' has been recommended for publication by an editor",
                        paper.title
                    ),
                )
                .notify(
                    Audience::Role(Role::Admin),
                    format!(
                        "Paper '{}' has been recommended for publication by an editor",
                        paper.title
                    ),
                ),
        );

        Ok(paper)
    }

    /// Overwrite the publication metadata block.
    ///
    /// A publication id already on the paper is kept; otherwise the one in
    /// `details` is used, or a fresh one is allocated when that is empty.
    pub async fn update_publication_details(
        &self,
        actor: Actor,
        paper_id: Uuid,
        mut details: PublicationDetails,
    ) -> Result<Paper> {
        actor.authorize(Operation::UpdatePublicationDetails)?;
        details.validate()?;

        let current = self.load_paper(paper_id).await?;
        if self.policy.enforce_transitions && current.status()? == PaperStatus::Draft {
            return Err(AppError::InvalidTransition {
                from: PaperStatus::Draft.to_string(),
                to: "publication_details".to_string(),
            });
        }

        details.publication_id = details.publication_id.trim().to_string();
        if current.has_publication_id() {
            details.publication_id = current.publication_id.clone();
        } else if details.publication_id.is_empty() {
            details.publication_id = self.store.allocate_publication_id().await?;
            metrics::record_publication_id_allocated();
            info!(
                paper_id = %paper_id,
                publication_id = %details.publication_id,
                "Publication id allocated"
            );
        }

        let paper = self
            .store
            .update_publication_details(paper_id, &details)
            .await?
            .ok_or_else(|| AppError::PaperNotFound {
                id: paper_id.to_string(),
            })?;

        info!(
            paper_id = %paper_id,
            user_id = %actor.user_id,
            role = %actor.role,
            "Publication details updated"
        );
        metrics::record_transition(Operation::UpdatePublicationDetails.as_str(), &paper.status);

        let by = actor.role.title();
        self.dispatch(
            FanoutPlan::for_paper(paper.id)
                .notify(
                    Audience::User(paper.author_id),
                    format!(
                        "Publication details for your paper '{}' have been updated by {}",
                        paper.title,
                        actor.role.with_article()
                    ),
                )
                .notify(
                    Audience::Role(Role::Admin),
                    format!("Paper details updated for '{}' by {}", paper.title, by),
                )
                .notify(
                    Audience::Role(Role::Coordinator),
                    format!(
                        "Paper details updated for '{}' by {}. Please validate.",
                        paper.title, by
                    ),
                ),
        );

        Ok(paper)
    }

    /// Hard delete; reviews and notifications of the paper go with it
    pub async fn delete_paper(&self, actor: Actor, paper_id: Uuid) -> Result<()> {
        actor.authorize(Operation::DeletePaper)?;

        let paper = self.load_paper(paper_id).await?;
        self.ensure_owner(&actor, &paper)?;

        if !self.store.delete_paper(paper_id).await? {
            return Err(AppError::PaperNotFound {
                id: paper_id.to_string(),
            });
        }

        info!(paper_id = %paper_id, user_id = %actor.user_id, "Paper deleted");
        Ok(())
    }

    pub async fn list_papers(&self, actor: Actor) -> Result<Vec<PaperWithAuthor>> {
        actor.authorize(Operation::ListPapers)?;
        self.store.list_papers().await
    }

    // ========================================================================
    // Reviews
    // ========================================================================

    pub async fn create_review(&self, actor: Actor, input: CreateReview) -> Result<Review> {
        actor.authorize(Operation::CreateReview)?;
        input.validate()?;

        let paper = self.load_paper(input.paper_id).await?;
        let review = self
            .store
            .insert_review(NewReview {
                paper_id: input.paper_id,
                reviewer_id: actor.user_id,
                rating: input.rating,
                rubric: input.rubric,
                comments: input.comments,
                recommendation: input.recommendation,
            })
            .await?;

        info!(
            paper_id = %paper.id,
            user_id = %actor.user_id,
            recommendation = %review.recommendation,
            "Review created"
        );

        self.dispatch(FanoutPlan::for_paper(paper.id).notify(
            Audience::User(paper.author_id),
            format!(
                "Your paper '{}' has been reviewed. Rating: {}/5, Recommendation: {}",
                paper.title, review.rating, review.recommendation
            ),
        ));

        Ok(review)
    }

    pub async fn list_reviews(
        &self,
        actor: Actor,
        paper_id: Option<Uuid>,
    ) -> Result<Vec<ReviewWithReviewer>> {
        actor.authorize(Operation::ListReviews)?;
        self.store.list_reviews(paper_id).await
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// The caller's own notifications, newest first
    pub async fn list_notifications(&self, actor: Actor) -> Result<Vec<Notification>> {
        actor.authorize(Operation::ListNotifications)?;
        self.store.list_notifications(actor.user_id).await
    }

    /// Mark one of the caller's notifications read. Repeating it is a no-op.
    pub async fn mark_notification_read(&self, actor: Actor, id: i64) -> Result<Notification> {
        actor.authorize(Operation::MarkNotificationRead)?;

        let notification = self
            .store
            .find_notification(id)
            .await?
            .ok_or_else(|| AppError::NotificationNotFound { id: id.to_string() })?;

        if notification.user_id != actor.user_id {
            return Err(AppError::Forbidden {
                message: "only the recipient may mark a notification read".to_string(),
            });
        }
        if notification.is_read {
            return Ok(notification);
        }

        self.store
            .mark_notification_read(id)
            .await?
            .ok_or_else(|| AppError::NotificationNotFound { id: id.to_string() })
    }

    /// Write a single notification directly, outside any fan-out
    pub async fn create_notification(
        &self,
        actor: Actor,
        input: CreateNotification,
    ) -> Result<Notification> {
        actor.authorize(Operation::CreateNotification)?;
        input.validate()?;

        let notification = self
            .store
            .insert_notification(NewNotification {
                user_id: input.user_id,
                message: input.message,
                paper_id: input.paper_id,
            })
            .await?;

        info!(
            notification_id = notification.id,
            user_id = %actor.user_id,
            recipient = %notification.user_id,
            "Notification created"
        );
        Ok(notification)
    }
}
