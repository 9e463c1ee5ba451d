//! Postgres implementation of `WorkflowStore`
//!
//! Plain lookups go through SeaORM entities. Updates that must be a single
//! statement (status moves, the publication-id guard, the counter) use raw
//! SQL with `RETURNING *`.

use crate::db::models::*;
use crate::db::store::{
    ContentUpdate, NewNotification, NewPaper, NewReview, NewUser, PaperWithAuthor,
    PublicationDetails, ReviewWithReviewer, WorkflowStore, DEFAULT_PAPER_TYPE,
};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::workflow::{publication_id, PaperStatus, Role};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, Statement,
    TransactionTrait,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

/// Translate constraint violations into domain errors.
///
/// `missing` builds the not-found error for a violated foreign key, given
/// the constraint message.
fn constraint_error(err: DbErr, missing: impl Fn(&str) -> AppError) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => AppError::Duplicate { message },
        Some(SqlErr::ForeignKeyConstraintViolation(message)) => missing(&message),
        _ => err.into(),
    }
}

fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

#[async_trait]
impl WorkflowStore for Repository {
    // ========================================================================
    // Health Check
    // ========================================================================

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let now = now();
        let model = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            name: Set(user.name),
            role: Set(user.role.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model.insert(self.write_conn()).await.map_err(|e| {
            constraint_error(e, |m| AppError::Internal {
                message: m.to_string(),
            })
        })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn user_ids_with_role(&self, role: Role) -> Result<Vec<Uuid>> {
        UserEntity::find()
            .select_only()
            .column(UserColumn::Id)
            .filter(UserColumn::Role.eq(role.as_str()))
            .order_by_asc(UserColumn::CreatedAt)
            .into_tuple::<Uuid>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Paper Operations
    // ========================================================================

    async fn insert_paper(&self, paper: NewPaper) -> Result<Paper> {
        let now = now();
        let paper_type = if paper.paper_type.is_empty() {
            DEFAULT_PAPER_TYPE.to_string()
        } else {
            paper.paper_type
        };
        let author_id = paper.author_id;

        // Remaining metadata columns take their table defaults
        let model = PaperActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(paper.title),
            abstract_text: Set(paper.abstract_text),
            content: Set(paper.content),
            file_url: Set(paper.file_url),
            author_id: Set(author_id),
            status: Set(PaperStatus::Submitted.to_string()),
            paper_type: Set(paper_type),
            publication_title_amharic: Set(paper.publication_title_amharic),
            publication_isced_band: Set(paper.publication_isced_band),
            publication_type: Set(paper.publication_type),
            journal_type: Set(paper.journal_type),
            journal_name: Set(paper.journal_name),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        model.insert(self.write_conn()).await.map_err(|e| {
            constraint_error(e, |_| AppError::UserNotFound {
                id: author_id.to_string(),
            })
        })
    }

    async fn find_paper(&self, id: Uuid) -> Result<Option<Paper>> {
        PaperEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn update_paper_content(&self, id: Uuid, update: ContentUpdate) -> Result<Option<Paper>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE papers
            SET title = $1, abstract = $2, content = $3, file_url = $4, status = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
            vec![
                update.title.into(),
                update.abstract_text.into(),
                update.content.into(),
                update.file_url.into(),
                update.status.to_string().into(),
                id.into(),
            ],
        );

        PaperEntity::find()
            .from_raw_sql(stmt)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn set_paper_status(&self, id: Uuid, status: PaperStatus) -> Result<Option<Paper>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE papers SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
            vec![status.to_string().into(), id.into()],
        );

        PaperEntity::find()
            .from_raw_sql(stmt)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn update_publication_details(
        &self,
        id: Uuid,
        details: &PublicationDetails,
    ) -> Result<Option<Paper>> {
        let d = details.clone();
        // A stored publication id survives concurrent writers
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE papers
            SET institution_code = $1,
                publication_id = COALESCE(NULLIF(publication_id, ''), $2),
                publication_isced_band = $3, publication_title_amharic = $4,
                publication_date = $5, publication_type = $6, journal_type = $7,
                journal_name = $8, indigenous_knowledge = $9, fiscal_year = $10,
                allocated_budget = $11, external_budget = $12, nrf_fund = $13,
                research_type = $14, completion_status = $15,
                female_researchers = $16, male_researchers = $17,
                outside_female_researchers = $18, outside_male_researchers = $19,
                benefited_industry = $20, ethical_clearance = $21, pi_name = $22,
                pi_gender = $23, co_investigators = $24, produced_prototype = $25,
                hetril_collaboration = $26, submitted_to_incubator = $27,
                updated_at = NOW()
            WHERE id = $28
            RETURNING *
            "#,
            vec![
                d.institution_code.into(),
                d.publication_id.into(),
                d.publication_isced_band.into(),
                d.publication_title_amharic.into(),
                d.publication_date.into(),
                d.publication_type.into(),
                d.journal_type.into(),
                d.journal_name.into(),
                d.indigenous_knowledge.into(),
                d.fiscal_year.into(),
                d.allocated_budget.into(),
                d.external_budget.into(),
                d.nrf_fund.into(),
                d.research_type.into(),
                d.completion_status.into(),
                d.female_researchers.into(),
                d.male_researchers.into(),
                d.outside_female_researchers.into(),
                d.outside_male_researchers.into(),
                d.benefited_industry.into(),
                d.ethical_clearance.into(),
                d.pi_name.into(),
                d.pi_gender.into(),
                d.co_investigators.into(),
                d.produced_prototype.into(),
                d.hetril_collaboration.into(),
                d.submitted_to_incubator.into(),
                id.into(),
            ],
        );

        PaperEntity::find()
            .from_raw_sql(stmt)
            .one(self.write_conn())
            .await
            .map_err(|e| {
                constraint_error(e, |_| AppError::PaperNotFound {
                    id: id.to_string(),
                })
            })
    }

    async fn delete_paper(&self, id: Uuid) -> Result<bool> {
        // Reviews and notifications go with it (ON DELETE CASCADE)
        let result = PaperEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn list_papers(&self) -> Result<Vec<PaperWithAuthor>> {
        let rows = PaperEntity::find()
            .find_also_related(UserEntity)
            .order_by_desc(PaperColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(paper, author)| {
                let (author_name, author_email) = author
                    .map(|a| (a.name, a.email))
                    .unwrap_or_default();
                PaperWithAuthor {
                    paper,
                    author_name,
                    author_email,
                }
            })
            .collect())
    }

    async fn allocate_publication_id(&self) -> Result<String> {
        let txn = self.write_conn().begin().await?;

        let greatest = txn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                SELECT publication_id FROM papers
                WHERE starts_with(publication_id, $1)
                ORDER BY publication_id DESC
                LIMIT 1
                "#,
                vec![publication_id::PREFIX.into()],
            ))
            .await?
            .map(|row| row.try_get::<String>("", "publication_id"))
            .transpose()?;

        let legacy = publication_id::next_after(greatest.as_deref());
        let legacy = i64::try_from(legacy).map_err(|_| AppError::Internal {
            message: format!("publication number {} out of range", legacy),
        })?;

        // Creates the counter on first use; afterwards the row lock
        // serialises concurrent callers
        let row = txn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO publication_id_sequence (id, next_value)
                VALUES (1, $1 + 1)
                ON CONFLICT (id) DO UPDATE
                SET next_value = GREATEST(publication_id_sequence.next_value, $1) + 1
                RETURNING next_value - 1 AS allocated
                "#,
                vec![legacy.into()],
            ))
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "publication id counter returned no row".to_string(),
            })?;
        let allocated: i64 = row.try_get("", "allocated")?;

        txn.commit().await?;

        let allocated = u64::try_from(allocated).map_err(|_| AppError::Internal {
            message: format!("negative publication number {}", allocated),
        })?;
        Ok(publication_id::format(allocated))
    }

    // ========================================================================
    // Review Operations
    // ========================================================================

    async fn insert_review(&self, review: NewReview) -> Result<Review> {
        let now = now();
        let paper_id = review.paper_id;
        let reviewer_id = review.reviewer_id;
        let rubric = review.rubric;

        let model = ReviewActiveModel {
            id: Set(Uuid::new_v4()),
            paper_id: Set(paper_id),
            reviewer_id: Set(reviewer_id),
            rating: Set(review.rating),
            problem_statement: Set(rubric.problem_statement),
            literature_review: Set(rubric.literature_review),
            methodology: Set(rubric.methodology),
            results: Set(rubric.results),
            conclusion: Set(rubric.conclusion),
            originality: Set(rubric.originality),
            clarity_organization: Set(rubric.clarity_organization),
            contribution_knowledge: Set(rubric.contribution_knowledge),
            technical_quality: Set(rubric.technical_quality),
            comments: Set(review.comments),
            recommendation: Set(review.recommendation.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model.insert(self.write_conn()).await.map_err(|e| {
            constraint_error(e, |message| {
                if message.contains("paper_id") {
                    AppError::PaperNotFound {
                        id: paper_id.to_string(),
                    }
                } else {
                    AppError::UserNotFound {
                        id: reviewer_id.to_string(),
                    }
                }
            })
        })
    }

    async fn list_reviews(&self, paper_id: Option<Uuid>) -> Result<Vec<ReviewWithReviewer>> {
        let filter = paper_id.map(|_| "WHERE r.paper_id = $1").unwrap_or("");
        let sql = format!(
            r#"
            SELECT r.*,
                   COALESCE(u.name, 'Unknown') AS reviewer_name,
                   COALESCE(u.email, '') AS reviewer_email,
                   COALESCE(p.title, 'Unknown Paper') AS paper_title
            FROM reviews r
            LEFT JOIN users u ON r.reviewer_id = u.id
            LEFT JOIN papers p ON r.paper_id = p.id
            {}
            ORDER BY r.created_at DESC
            "#,
            filter
        );

        let values: Vec<sea_orm::Value> = paper_id.into_iter().map(Into::into).collect();
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);

        self.read_conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .map(|row| -> Result<ReviewWithReviewer> {
                Ok(ReviewWithReviewer {
                    review: Review::from_query_result(&row, "")?,
                    reviewer_name: row.try_get("", "reviewer_name")?,
                    reviewer_email: row.try_get("", "reviewer_email")?,
                    paper_title: row.try_get("", "paper_title")?,
                })
            })
            .collect()
    }

    async fn reviewer_ids(&self, paper_id: Uuid) -> Result<Vec<Uuid>> {
        ReviewEntity::find()
            .select_only()
            .column(ReviewColumn::ReviewerId)
            .filter(ReviewColumn::PaperId.eq(paper_id))
            .into_tuple::<Uuid>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Notification Operations
    // ========================================================================

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let user_id = notification.user_id;
        let paper_id = notification.paper_id;

        let model = NotificationActiveModel {
            user_id: Set(user_id),
            message: Set(notification.message),
            paper_id: Set(paper_id),
            is_read: Set(false),
            created_at: Set(now()),
            ..Default::default()
        };

        model.insert(self.write_conn()).await.map_err(|e| {
            constraint_error(e, |message| match paper_id {
                Some(pid) if message.contains("paper_id") => AppError::PaperNotFound {
                    id: pid.to_string(),
                },
                _ => AppError::UserNotFound {
                    id: user_id.to_string(),
                },
            })
        })
    }

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        NotificationEntity::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .order_by_desc(NotificationColumn::CreatedAt)
            .order_by_desc(NotificationColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_notification(&self, id: i64) -> Result<Option<Notification>> {
        NotificationEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn mark_notification_read(&self, id: i64) -> Result<Option<Notification>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING *",
            vec![id.into()],
        );

        NotificationEntity::find()
            .from_raw_sql(stmt)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }
}
