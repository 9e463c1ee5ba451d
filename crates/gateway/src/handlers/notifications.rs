//! Notification handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rpms_common::{
    auth::AuthContext, db::models::Notification, errors::Result, workflow::CreateNotification,
};

use crate::AppState;

/// The caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Notification>>> {
    Ok(Json(state.workflow.list_notifications(auth.actor()).await?))
}

pub async fn create_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateNotification>,
) -> Result<(StatusCode, Json<Notification>)> {
    let notification = state
        .workflow
        .create_notification(auth.actor(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<Notification>> {
    Ok(Json(
        state.workflow.mark_notification_read(auth.actor(), id).await?,
    ))
}
