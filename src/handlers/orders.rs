use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use tracing::info;

use super::common::{
    message_response, no_content_response, parse_id, parse_order_status, success_response,
};
use crate::services::orders::{OrderPlaced, OrderRequest, OrderView};
use crate::{auth::AuthUser, entities::order, errors::ServiceError, ApiResponse, AppState};

/// Place an order
#[utoipa::path(
    post,
    path = "/api/v1/order",
    summary = "Place order",
    description = "Validate buyer fields, price every product line and store the order as pending",
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Order placed successfully", body = ApiResponse<OrderPlaced>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Missing or invalid fields, or order already exists", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn add_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<OrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let placed = state.services.orders.add_order(&auth_user, request).await?;
    info!(uuid = %placed.uuid, "Order placed");
    Ok(message_response(placed, "Order placed successfully"))
}

/// Replace the lines and buyer details of a pending order
#[utoipa::path(
    put,
    path = "/api/v1/order",
    summary = "Update order",
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Order updated successfully", body = ApiResponse<OrderPlaced>),
        (status = 400, description = "Missing or invalid fields", body = crate::errors::ErrorResponse),
        (status = 401, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 403, description = "Order is complete", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<OrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let placed = state
        .services
        .orders
        .update_order(&auth_user, request)
        .await?;
    Ok(message_response(placed, "Order updated successfully"))
}

/// Orders visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/order",
    summary = "List orders",
    description = "Admins get every order; other callers get their own",
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<Vec<OrderView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_orders(&auth_user).await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/order/{id}",
    summary = "Get order",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderView>),
        (status = 401, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get_order(&auth_user, id).await?;
    Ok(success_response(order))
}

#[utoipa::path(
    delete,
    path = "/api/v1/order/{id}",
    summary = "Delete order",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 401, description = "Admins only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.orders.delete_order(&auth_user, id).await?;
    Ok(no_content_response())
}

/// Orders in one status. Shares its path with the status toggle.
#[utoipa::path(
    get,
    path = "/api/v1/order/status/{status}",
    summary = "List orders by status",
    params(("status" = String, Path, description = "pending or complete")),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<Vec<OrderView>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders_by_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(status): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = parse_order_status(&status)?;
    let orders = state
        .services
        .orders
        .list_orders_by_status(&auth_user, status)
        .await?;
    Ok(success_response(orders))
}

/// Flip an order between pending and complete
#[utoipa::path(
    put,
    path = "/api/v1/order/status/{id}",
    summary = "Toggle order status",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order status updated", body = ApiResponse<order::Model>),
        (status = 401, description = "Admins only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id)?;
    let order = state.services.orders.update_status(&auth_user, id).await?;
    Ok(message_response(order, "Order status updated successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/order/user/{id}",
    summary = "List a user's orders",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<Vec<OrderView>>),
        (status = 401, description = "Not this user", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders_by_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state
        .services
        .orders
        .list_orders_by_user(&auth_user, user_id)
        .await?;
    Ok(success_response(orders))
}

/// Render the bill to disk and confirm in plain text
#[utoipa::path(
    get,
    path = "/api/v1/order/bill/{id}",
    summary = "Generate bill",
    description = "Writes <bill_dir>/<uuid>.pdf; the document itself is not returned",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Bill generated", body = String, content_type = "text/plain"),
        (status = 401, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Bill could not be written", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn generate_bill(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> Result<String, ServiceError> {
    let generated = state
        .services
        .billing
        .generate_bill(&auth_user, id)
        .await?;
    Ok(format!("{}: {}", generated.message, generated.file_name))
}
