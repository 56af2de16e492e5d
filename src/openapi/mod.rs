use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FitMarket API",
        version = "0.1.0",
        description = r#"
# FitMarket Marketplace API

Orders, bills and partner onboarding for a fitness marketplace where users
buy products and approved partners run driver, center, store or trainer
profiles.

## Authentication

Every endpoint except signup, login and health requires a bearer token from
`POST /api/v1/user/login`:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures share one envelope:

```json
{
  "error": "Not Found",
  "message": "Order 42 not found",
  "request_id": "0b6f...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Users", description = "Signup, login and accounts"),
        (name = "Products", description = "Catalog maintenance"),
        (name = "Orders", description = "Order placement, status and bills"),
        (name = "Partners", description = "Partner applications and approval"),
        (name = "Role profiles", description = "Driver, center, store and trainer profiles")
    ),
    paths(
        // Users
        crate::handlers::users::signup,
        crate::handlers::users::login,
        crate::handlers::users::me,
        crate::handlers::users::list_users,

        // Products
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::delete_product,

        // Orders
        crate::handlers::orders::add_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::list_orders_by_status,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::list_orders_by_user,
        crate::handlers::orders::generate_bill,

        // Partners
        crate::handlers::partners::apply_partner,
        crate::handlers::partners::list_partners,
        crate::handlers::partners::get_partner,
        crate::handlers::partners::update_partner_status,
        crate::handlers::partners::delete_partner,

        // Role profiles
        crate::handlers::role_entities::add_role_entity,
        crate::handlers::role_entities::update_role_entity,
        crate::handlers::role_entities::list_role_entities,
        crate::handlers::role_entities::get_role_entity,
        crate::handlers::role_entities::update_role_entity_status,
        crate::handlers::role_entities::delete_role_entity,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::errors::ErrorResponse,
            crate::entities::Role,
            crate::entities::RoleKind,
            crate::entities::OrderStatus,
            crate::services::orders::OrderRequest,
            crate::services::orders::ProductLineRequest,
            crate::services::orders::OrderPlaced,
            crate::services::orders::OrderView,
            crate::services::partners::PartnerRequest,
            crate::services::role_entities::RoleEntityRequest,
            crate::services::products::ProductRequest,
            crate::services::users::SignupRequest,
            crate::services::users::LoginRequest,
            crate::services::users::LoginResponse,
            crate::services::users::UserSummary,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

/// Registers the `Bearer` scheme referenced by secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_order_and_partner_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("FitMarket API"));
        assert!(json.contains("/api/v1/order/bill/{id}"));
        assert!(json.contains("/api/v1/{kind}/status/{id}"));
        assert!(json.contains("\"Bearer\""));
    }
}
