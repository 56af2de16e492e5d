use crate::{
    auth::{ensure_admin, AuthUser},
    db::DbPool,
    entities::{
        order_details,
        product::{self, Entity as ProductEntity},
    },
    errors::{non_blank, ServiceError},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("price_negative"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProductRequest {
    /// Required by updates
    pub id: Option<i32>,
    #[validate(length(max = 200, message = "must be at most 200 characters"), custom = "non_blank")]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "must not be negative"))]
    #[serde(default)]
    pub quantity: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Catalog maintenance
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, caller, request), fields(user_id = caller.user_id))]
    pub async fn create_product(
        &self,
        caller: &AuthUser,
        request: ProductRequest,
    ) -> Result<product::Model, ServiceError> {
        ensure_admin(caller)?;
        request.validate()?;

        let created = product::ActiveModel {
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            price: Set(request.price),
            quantity: Set(request.quantity),
            active: Set(request.active),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = created.id, "Product created");
        Ok(created)
    }

    #[instrument(skip(self, caller, request), fields(user_id = caller.user_id, product_id = ?request.id))]
    pub async fn update_product(
        &self,
        caller: &AuthUser,
        request: ProductRequest,
    ) -> Result<product::Model, ServiceError> {
        ensure_admin(caller)?;
        let id = request
            .id
            .ok_or_else(|| ServiceError::ValidationError("id: is required".to_string()))?;
        request.validate()?;

        let mut active: product::ActiveModel = self.get_product(id).await?.into();
        active.name = Set(request.name.trim().to_string());
        active.description = Set(request.description);
        active.price = Set(request.price);
        active.quantity = Set(request.quantity);
        active.active = Set(request.active);
        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, product_id = id, "Failed to update product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = id, "Product updated");
        Ok(updated)
    }

    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(ProductEntity::find()
            .order_by_asc(product::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    pub async fn get_product(&self, id: i32) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    /// Products referenced by order lines stay; deactivate them instead
    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn delete_product(&self, caller: &AuthUser, id: i32) -> Result<(), ServiceError> {
        ensure_admin(caller)?;
        let product = self.get_product(id).await?;

        let referenced = order_details::Entity::find()
            .filter(order_details::Column::ProductId.eq(product.id))
            .count(&*self.db_pool)
            .await?;
        if referenced > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product {} is referenced by {} order line(s)",
                id, referenced
            )));
        }

        ProductEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        info!(product_id = id, "Product deleted");
        Ok(())
    }
}
