use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;
use validator::Validate;

use super::requester;
use crate::models::{CreateUserRequest, ListResponse, UpdateUserRequest, UserResponse};
use crate::AppState;

pub async fn list_users(State(state): State<AppState>) -> Json<ListResponse<UserResponse>> {
    let users = state.store.list_users().await;
    Json(users.iter().map(UserResponse::from).collect::<Vec<_>>().into())
}

pub async fn create_user(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let user = state.store.create_user(req).await?;
    tracing::info!(user_id = user.id, username = %user.username, "User created");

    state.service_index.notify_created(
        requester(&state, &jar, &headers),
        state.service_index.user_resource(&user),
    );

    Ok((StatusCode::CREATED, Json(user.to_response())))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .store
        .get_user(id)
        .await
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(user.to_response()))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.store.update_user(id, patch).await?;
    tracing::info!(user_id = user.id, "User updated");

    Ok(Json(user.to_response()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let user = state.store.delete_user(id).await?;
    tracing::info!(user_id = user.id, username = %user.username, "User deleted");

    state
        .service_index
        .notify_deleted(requester(&state, &jar, &headers), user.sub);

    Ok(StatusCode::NO_CONTENT)
}
