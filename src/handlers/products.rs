use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use super::common::{created_response, message_response, no_content_response, success_response};
use crate::services::products::ProductRequest;
use crate::{auth::AuthUser, entities::product, errors::ServiceError, ApiResponse, AppState};

#[utoipa::path(
    post,
    path = "/api/v1/product",
    summary = "Create product",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<product::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Admins only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<ProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state
        .services
        .products
        .create_product(&auth_user, request)
        .await?;
    Ok(created_response(created, "Product created successfully"))
}

#[utoipa::path(
    put,
    path = "/api/v1/product",
    summary = "Update product",
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<ProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .products
        .update_product(&auth_user, request)
        .await?;
    Ok(message_response(updated, "Product updated successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/product",
    summary = "List products",
    responses(
        (status = 200, description = "Catalog", body = ApiResponse<Vec<product::Model>>),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.products.list_products().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/product/{id}",
    summary = "Get product",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<product::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.products.get_product(id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/product/{id}",
    summary = "Delete product",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, description = "Product is referenced by orders", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .products
        .delete_product(&auth_user, id)
        .await?;
    Ok(no_content_response())
}
