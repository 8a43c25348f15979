use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;
use validator::Validate;

use super::requester;
use crate::models::{
    AssociateUsersRequest, CreateTeamRequest, ListResponse, RoleUserAssignmentResponse,
    TeamResponse,
};
use crate::AppState;

pub async fn list_teams(State(state): State<AppState>) -> Json<ListResponse<TeamResponse>> {
    let teams = state.store.list_teams().await;
    Json(teams.iter().map(TeamResponse::from).collect::<Vec<_>>().into())
}

pub async fn create_team(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamResponse>), AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let team = state.store.create_team(req).await?;
    tracing::info!(
        team_id = team.id,
        org_id = team.organization,
        name = %team.name,
        "Team created"
    );

    let org = state.store.get_organization(team.organization).await;
    state.service_index.notify_created(
        requester(&state, &jar, &headers),
        state.service_index.team_resource(&team, org.as_ref()),
    );

    Ok((StatusCode::CREATED, Json(TeamResponse::from(&team))))
}

pub async fn get_team(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TeamResponse>, AppError> {
    let team = state
        .store
        .get_team(id)
        .await
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Team not found")))?;

    Ok(Json(TeamResponse::from(&team)))
}

pub async fn delete_team(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let team = state.store.delete_team(id).await?;
    tracing::info!(team_id = team.id, name = %team.name, "Team deleted");

    state
        .service_index
        .notify_deleted(requester(&state, &jar, &headers), team.ansible_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Make each listed user a Team Member. Repeating the call changes nothing.
pub async fn associate_users(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AssociateUsersRequest>,
) -> Result<Json<ListResponse<RoleUserAssignmentResponse>>, AppError> {
    let assignments = state.store.associate_users(id, &req.instances).await?;
    tracing::info!(team_id = id, users = ?req.instances, "Users associated with team");

    Ok(Json(
        assignments
            .iter()
            .map(RoleUserAssignmentResponse::from)
            .collect::<Vec<_>>()
            .into(),
    ))
}
