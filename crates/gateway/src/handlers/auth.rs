//! Registration, login, profile and staff accounts

use axum::{extract::State, http::StatusCode, Json};
use rpms_common::{
    auth::{AuthContext, CreateUserRequest, LoginRequest, LoginResponse, RegisterRequest},
    db::models::User,
    errors::Result,
};

use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.identity.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    Ok(Json(state.identity.login(request).await?))
}

pub async fn profile(State(state): State<AppState>, auth: AuthContext) -> Result<Json<User>> {
    Ok(Json(state.identity.profile(auth.actor()).await?))
}

/// Admin-only: create an editor or coordinator
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.identity.create_user(auth.actor(), request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
