use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;
use validator::Validate;

use super::requester;
use crate::models::{CreateOrganizationRequest, ListResponse, OrgResponse};
use crate::AppState;

pub async fn list_organizations(State(state): State<AppState>) -> Json<ListResponse<OrgResponse>> {
    let orgs = state.store.list_organizations().await;
    Json(orgs.iter().map(OrgResponse::from).collect::<Vec<_>>().into())
}

pub async fn create_organization(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrgResponse>), AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let org = state.store.create_organization(&req.name).await?;
    tracing::info!(org_id = org.id, name = %org.name, "Organization created");

    state.service_index.notify_created(
        requester(&state, &jar, &headers),
        state.service_index.organization_resource(&org),
    );

    Ok((StatusCode::CREATED, Json(OrgResponse::from(&org))))
}

pub async fn get_organization(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrgResponse>, AppError> {
    let org = state
        .store
        .get_organization(id)
        .await
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))?;

    Ok(Json(OrgResponse::from(&org)))
}

/// Deletes the organization with its teams and every assignment on them.
pub async fn delete_organization(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let org = state.store.delete_organization(id).await?;
    tracing::info!(org_id = org.id, name = %org.name, "Organization deleted");

    state
        .service_index
        .notify_deleted(requester(&state, &jar, &headers), org.ansible_id);

    Ok(StatusCode::NO_CONTENT)
}
