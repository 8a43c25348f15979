use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::models::{
    CreateRoleTeamAssignmentRequest, CreateRoleUserAssignmentRequest, ListResponse,
    RoleDefinition, RoleTeamAssignmentResponse, RoleUserAssignmentResponse,
};
use crate::AppState;

fn created_or_ok(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

pub async fn list_role_definitions(
    State(state): State<AppState>,
) -> Json<ListResponse<RoleDefinition>> {
    Json(state.store.list_role_definitions().await.into())
}

pub async fn list_user_assignments(
    State(state): State<AppState>,
) -> Json<ListResponse<RoleUserAssignmentResponse>> {
    let assignments = state.store.list_user_assignments().await;
    Json(
        assignments
            .iter()
            .map(RoleUserAssignmentResponse::from)
            .collect::<Vec<_>>()
            .into(),
    )
}

/// Grant a role to a user. An identical existing grant is returned with 200.
pub async fn create_user_assignment(
    State(state): State<AppState>,
    Json(req): Json<CreateRoleUserAssignmentRequest>,
) -> Result<(StatusCode, Json<RoleUserAssignmentResponse>), AppError> {
    let (assignment, created) = state.store.create_user_assignment(req).await?;
    if created {
        tracing::info!(
            assignment_id = assignment.id,
            user_id = assignment.user,
            role_definition = assignment.role_definition,
            "Role granted to user"
        );
    }

    Ok((
        created_or_ok(created),
        Json(RoleUserAssignmentResponse::from(&assignment)),
    ))
}

pub async fn delete_user_assignment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_user_assignment(id).await?;
    tracing::info!(assignment_id = id, "Role user assignment removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_team_assignments(
    State(state): State<AppState>,
) -> Json<ListResponse<RoleTeamAssignmentResponse>> {
    let assignments = state.store.list_team_assignments().await;
    Json(
        assignments
            .iter()
            .map(RoleTeamAssignmentResponse::from)
            .collect::<Vec<_>>()
            .into(),
    )
}

pub async fn create_team_assignment(
    State(state): State<AppState>,
    Json(req): Json<CreateRoleTeamAssignmentRequest>,
) -> Result<(StatusCode, Json<RoleTeamAssignmentResponse>), AppError> {
    let (assignment, created) = state.store.create_team_assignment(req).await?;
    if created {
        tracing::info!(
            assignment_id = assignment.id,
            team_id = assignment.team,
            role_definition = assignment.role_definition,
            "Role granted to team"
        );
    }

    Ok((
        created_or_ok(created),
        Json(RoleTeamAssignmentResponse::from(&assignment)),
    ))
}

pub async fn delete_team_assignment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_team_assignment(id).await?;
    tracing::info!(assignment_id = id, "Role team assignment removed");
    Ok(StatusCode::NO_CONTENT)
}
