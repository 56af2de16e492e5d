use axum::{extract::State, response::IntoResponse, Json};

use super::common::{created_response, success_response};
use crate::services::users::{LoginRequest, LoginResponse, SignupRequest, UserSummary};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState};

#[utoipa::path(
    post,
    path = "/api/v1/user/signup",
    summary = "Sign up",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserSummary>),
        (status = 400, description = "Invalid request or email already registered", body = crate::errors::ErrorResponse),
    ),
    tag = "Users"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.users.signup(request).await?;
    Ok(created_response(user, "Successfully registered"))
}

#[utoipa::path(
    post,
    path = "/api/v1/user/login",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid email or password", body = crate::errors::ErrorResponse),
    ),
    tag = "Users"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.users.login(request).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/user/me",
    summary = "Current user",
    responses(
        (status = 200, description = "Caller's account", body = ApiResponse<UserSummary>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.users.me(&auth_user).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/user",
    summary = "List users",
    responses(
        (status = 200, description = "Every account", body = ApiResponse<Vec<UserSummary>>),
        (status = 403, description = "Admins only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.users.list_users(&auth_user).await?,
    ))
}
