//! Driver, center, store and trainer profiles. One router per kind, each
//! nested under its topic with the kind carried as a request extension.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};

use super::common::{created_response, message_response, no_content_response, success_response};
use crate::services::role_entities::RoleEntityRequest;
use crate::{
    auth::AuthUser,
    entities::{role_entity, RoleKind},
    errors::ServiceError,
    ApiResponse, AppState,
};

/// Routes for one kind, mounted at `/{kind}`
pub fn routes(kind: RoleKind) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_role_entities)
                .post(add_role_entity)
                .put(update_role_entity),
        )
        .route("/:id", get(get_role_entity).delete(delete_role_entity))
        .route("/status/:id", put(update_role_entity_status))
        .layer(Extension(kind))
}

#[utoipa::path(
    post,
    path = "/api/v1/{kind}",
    summary = "Create role profile",
    description = "Admins pass partnerId; other callers use their own approved partner application",
    params(("kind" = RoleKind, Path, description = "driver, center, store or trainer")),
    request_body = RoleEntityRequest,
    responses(
        (status = 201, description = "Profile created inactive", body = ApiResponse<role_entity::Model>),
        (status = 400, description = "Partner not eligible or name already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Role profiles"
)]
pub async fn add_role_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<RoleKind>,
    auth_user: AuthUser,
    Json(request): Json<RoleEntityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state
        .services
        .role_entities
        .add_role_entity(&auth_user, kind, request)
        .await?;
    Ok(created_response(
        created,
        &format!("{} created successfully", kind.label()),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/{kind}",
    summary = "Update role profile",
    params(("kind" = RoleKind, Path, description = "driver, center, store or trainer")),
    request_body = RoleEntityRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<role_entity::Model>),
        (status = 401, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Profile not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Role profiles"
)]
pub async fn update_role_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<RoleKind>,
    auth_user: AuthUser,
    Json(request): Json<RoleEntityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .role_entities
        .update_role_entity(&auth_user, kind, request)
        .await?;
    Ok(message_response(
        updated,
        &format!("{} updated successfully", kind.label()),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/{kind}",
    summary = "List role profiles",
    params(("kind" = RoleKind, Path, description = "driver, center, store or trainer")),
    responses(
        (status = 200, description = "Profiles retrieved", body = ApiResponse<Vec<role_entity::Model>>),
    ),
    security(("Bearer" = [])),
    tag = "Role profiles"
)]
pub async fn list_role_entities(
    State(state): State<AppState>,
    Extension(kind): Extension<RoleKind>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state
            .services
            .role_entities
            .list_role_entities(&auth_user, kind)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/{kind}/{id}",
    summary = "Get role profile",
    params(
        ("kind" = RoleKind, Path, description = "driver, center, store or trainer"),
        ("id" = i32, Path, description = "Profile id"),
    ),
    responses(
        (status = 200, description = "Profile retrieved", body = ApiResponse<role_entity::Model>),
        (status = 404, description = "Profile not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Role profiles"
)]
pub async fn get_role_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<RoleKind>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state
            .services
            .role_entities
            .get_role_entity(&auth_user, kind, id)
            .await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/{kind}/status/{id}",
    summary = "Toggle role profile status",
    description = "Activation grants the owner the kind's role; deactivation resets it to user",
    params(
        ("kind" = RoleKind, Path, description = "driver, center, store or trainer"),
        ("id" = i32, Path, description = "Profile id"),
    ),
    responses(
        (status = 200, description = "Status toggled", body = ApiResponse<role_entity::Model>),
        (status = 401, description = "Not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Profile not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Role profiles"
)]
pub async fn update_role_entity_status(
    State(state): State<AppState>,
    Extension(kind): Extension<RoleKind>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .role_entities
        .update_role_entity_status(&auth_user, kind, id)
        .await?;
    Ok(message_response(
        updated,
        &format!("{} status updated successfully", kind.label()),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/{kind}/{id}",
    summary = "Delete role profile",
    params(
        ("kind" = RoleKind, Path, description = "driver, center, store or trainer"),
        ("id" = i32, Path, description = "Profile id"),
    ),
    responses(
        (status = 204, description = "Profile deleted"),
        (status = 401, description = "Admins only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Role profiles"
)]
pub async fn delete_role_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<RoleKind>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .role_entities
        .delete_role_entity(&auth_user, kind, id)
        .await?;
    Ok(no_content_response())
}
