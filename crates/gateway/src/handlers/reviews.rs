//! Review handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use rpms_common::{
    auth::AuthContext,
    db::{models::Review, store::ReviewWithReviewer},
    errors::Result,
    workflow::CreateReview,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub paper_id: Option<Uuid>,
}

pub async fn list_reviews(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Vec<ReviewWithReviewer>>> {
    Ok(Json(
        state.workflow.list_reviews(auth.actor(), query.paper_id).await?,
    ))
}

pub async fn create_review(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateReview>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = state.workflow.create_review(auth.actor(), request).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
