//! FitMarket API Library
//!
//! Order aggregation, bill rendering and partner onboarding for a
//! multi-role fitness marketplace.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    http::HeaderValue,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService};
use crate::entities::{Role, RoleKind};
use crate::events::Broadcaster;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub broadcaster: Broadcaster,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        auth: Arc<AuthService>,
        broadcaster: Broadcaster,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), auth.clone(), &config);
        Self {
            db,
            config,
            auth,
            broadcaster,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok").with_message("Order placed successfully")
            })
            .await;

        assert_eq!(response.message.as_deref(), Some("Order placed successfully"));
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }
}

/// Every route under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{orders, partners, products, role_entities, users};

    let public = Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .route("/user/signup", post(users::signup))
        .route("/user/login", post(users::login));

    let admin = Router::new()
        .route("/user", get(users::list_users))
        .with_role(Role::Admin);

    let mut authenticated = Router::new()
        .route("/user/me", get(users::me))
        // Products
        .route(
            "/product",
            get(products::list_products)
                .post(products::create_product)
                .put(products::update_product),
        )
        .route(
            "/product/:id",
            get(products::get_product).delete(products::delete_product),
        )
        // Orders
        .route(
            "/order",
            get(orders::list_orders)
                .post(orders::add_order)
                .put(orders::update_order),
        )
        .route(
            "/order/:id",
            get(orders::get_order).delete(orders::delete_order),
        )
        // GET reads a status name, PUT an order id
        .route(
            "/order/status/:status",
            get(orders::list_orders_by_status).put(orders::update_order_status),
        )
        .route("/order/user/:id", get(orders::list_orders_by_user))
        .route("/order/bill/:id", get(orders::generate_bill))
        // Partners
        .route(
            "/partner",
            get(partners::list_partners).post(partners::apply_partner),
        )
        .route(
            "/partner/:id",
            get(partners::get_partner).delete(partners::delete_partner),
        )
        .route("/partner/status/:id", put(partners::update_partner_status));

    for kind in RoleKind::ALL {
        authenticated = authenticated.nest(
            &format!("/{}", kind.topic()),
            role_entities::routes(kind),
        );
    }

    Router::new()
        .merge(public)
        .merge(admin)
        .merge(authenticated.with_auth())
}

/// Full application: API, docs and the shared layers
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let auth = state.auth.clone();

    Router::<AppState>::new()
        .route("/", get(|| async { "fitmarket-api up" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Auth middleware looks the service up in request extensions
        .layer(Extension(auth))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

/// CORS from configured origins, permissive in development or when explicitly allowed
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!("Using permissive CORS because explicit origins were not configured");
        CorsLayer::permissive()
    } else {
        // config validation rejects this combination; deny cross-origin requests if it slips through
        CorsLayer::new()
    }
}

async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "fitmarket-api",
        "platform": state.config.platform_name,
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(ApiResponse::success(json!({
        "status": db_status,
        "checks": { "database": db_status },
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
