//! Paper management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rpms_common::{
    auth::AuthContext,
    db::{
        models::Paper,
        store::{PaperWithAuthor, PublicationDetails},
    },
    errors::Result,
    workflow::{CreatePaper, UpdatePaper},
};
use uuid::Uuid;

use crate::AppState;

/// List every paper with its author, newest first
pub async fn list_papers(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<PaperWithAuthor>>> {
    Ok(Json(state.workflow.list_papers(auth.actor()).await?))
}

/// Submit a new paper
pub async fn create_paper(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreatePaper>,
) -> Result<(StatusCode, Json<Paper>)> {
    let paper = state.workflow.create_paper(auth.actor(), request).await?;
    Ok((StatusCode::CREATED, Json(paper)))
}

pub async fn update_paper(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePaper>,
) -> Result<Json<Paper>> {
    Ok(Json(state.workflow.update_paper(auth.actor(), id, request).await?))
}

/// Delete a paper with its reviews and notifications
pub async fn delete_paper(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.workflow.delete_paper(auth.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn recommend_paper(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Paper>> {
    Ok(Json(
        state.workflow.recommend_for_publication(auth.actor(), id).await?,
    ))
}

/// Overwrite the publication metadata; assigns a publication id on first use
pub async fn update_publication_details(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<PublicationDetails>,
) -> Result<Json<Paper>> {
    Ok(Json(
        state
            .workflow
            .update_publication_details(auth.actor(), id, request)
            .await?,
    ))
}
