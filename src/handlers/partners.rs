use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use super::common::{created_response, message_response, no_content_response, success_response};
use crate::services::partners::PartnerRequest;
use crate::{auth::AuthUser, entities::partner, errors::ServiceError, ApiResponse, AppState};

#[utoipa::path(
    post,
    path = "/api/v1/partner",
    summary = "Apply as partner",
    description = "One application per user and role kind; starts unapproved",
    request_body = PartnerRequest,
    responses(
        (status = 201, description = "Application received", body = ApiResponse<partner::Model>),
        (status = 400, description = "Invalid request or already applied for this role", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Partners"
)]
pub async fn apply_partner(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<PartnerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state
        .services
        .partners
        .apply_partner(&auth_user, request)
        .await?;
    Ok(created_response(created, "Partner application received"))
}

#[utoipa::path(
    get,
    path = "/api/v1/partner",
    summary = "List partner applications",
    responses(
        (status = 200, description = "Applications retrieved", body = ApiResponse<Vec<partner::Model>>),
    ),
    security(("Bearer" = [])),
    tag = "Partners"
)]
pub async fn list_partners(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.partners.list_partners(&auth_user).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/partner/{id}",
    summary = "Get partner application",
    params(("id" = i32, Path, description = "Partner id")),
    responses(
        (status = 200, description = "Application retrieved", body = ApiResponse<partner::Model>),
        (status = 404, description = "Partner not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Partners"
)]
pub async fn get_partner(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.partners.get_partner(&auth_user, id).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/partner/status/{id}",
    summary = "Toggle partner approval",
    params(("id" = i32, Path, description = "Partner id")),
    responses(
        (status = 200, description = "Approval toggled", body = ApiResponse<partner::Model>),
        (status = 401, description = "Admins only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Partner not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Partners"
)]
pub async fn update_partner_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .partners
        .update_partner_status(&auth_user, id)
        .await?;
    Ok(message_response(updated, "Partner status updated successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/partner/{id}",
    summary = "Delete partner application",
    params(("id" = i32, Path, description = "Partner id")),
    responses(
        (status = 204, description = "Partner deleted"),
        (status = 401, description = "Admins only", body = crate::errors::ErrorResponse),
        (status = 400, description = "Partner backs a profile", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Partners"
)]
pub async fn delete_partner(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.partners.delete_partner(&auth_user, id).await?;
    Ok(no_content_response())
}
