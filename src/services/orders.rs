use crate::{
    auth::{ensure_admin, ensure_admin_or_owner, AuthUser},
    db::DbPool,
    entities::{
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, OrderStatus},
        order_details::{self, Entity as OrderDetailsEntity},
        product::{self, Entity as ProductEntity},
        user::{self, Entity as UserEntity},
    },
    errors::{non_blank, ServiceError},
    services::users::UserSummary,
};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// One `{productId, quantity}` entry of an order submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductLineRequest {
    pub product_id: i32,
    pub quantity: i32,
}

/// Order submission. `id` is only read by updates.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub id: Option<i32>,
    /// Generate a fresh uuid (default) or use `uuid` as given
    #[serde(default = "default_is_generate")]
    pub is_generate: bool,
    pub uuid: Option<String>,
    /// Owner override, honoured for admin callers only
    pub user_id: Option<i32>,
    #[validate(required, custom = "non_blank")]
    pub name: Option<String>,
    #[validate(required, email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(required, custom = "non_blank")]
    pub contact_number: Option<String>,
    #[validate(required, custom = "non_blank")]
    pub country: Option<String>,
    #[validate(required, custom = "non_blank")]
    pub state: Option<String>,
    #[validate(required, custom = "non_blank")]
    pub city: Option<String>,
    #[validate(required, custom = "non_blank")]
    pub postal_code: Option<String>,
    #[validate(required, custom = "non_blank")]
    pub address: Option<String>,
    #[validate(required, custom = "non_blank")]
    pub payment_method: Option<String>,
    #[validate(
        required,
        length(min = 1, message = "must contain at least one product")
    )]
    pub product_details: Option<Vec<ProductLineRequest>>,
}

const MAX_LINE_QUANTITY: i32 = 10_000;

/// Largest value an order total column (decimal 16,2) can hold
const MAX_ORDER_TOTAL: Decimal = Decimal::from_parts(1_874_919_423, 2_328_306, 0, false, 2);

fn default_is_generate() -> bool {
    true
}

/// Buyer and payment fields after validation
#[derive(Debug, Clone, PartialEq, Eq)]
struct BuyerFields {
    name: String,
    email: String,
    contact_number: String,
    country: String,
    state: String,
    city: String,
    postal_code: String,
    address: String,
    payment_method: String,
}

impl OrderRequest {
    /// Runs field validation and returns the buyer block plus the product lines
    fn validated(&self) -> Result<(BuyerFields, Vec<ProductLineRequest>), ServiceError> {
        self.validate()?;

        let lines = self.product_details.clone().unwrap_or_default();
        if let Some(bad) = lines
            .iter()
            .find(|line| !(1..=MAX_LINE_QUANTITY).contains(&line.quantity))
        {
            return Err(ServiceError::ValidationError(format!(
                "productDetails: quantity for product {} must be between 1 and {}",
                bad.product_id, MAX_LINE_QUANTITY
            )));
        }

        let field = |v: &Option<String>| v.clone().unwrap_or_default().trim().to_string();
        Ok((
            BuyerFields {
                name: field(&self.name),
                email: field(&self.email),
                contact_number: field(&self.contact_number),
                country: field(&self.country),
                state: field(&self.state),
                city: field(&self.city),
                postal_code: field(&self.postal_code),
                address: field(&self.address),
                payment_method: field(&self.payment_method),
            },
            lines,
        ))
    }
}

/// Response for a placed or updated order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderPlaced {
    pub uuid: String,
}

/// Order with its owner and lines loaded
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: order::Model,
    pub user: Option<UserSummary>,
    pub details: Vec<order_details::Model>,
}

/// Priced line ready to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: i32,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

/// Drops repeated product ids. The first occurrence wins; later ones are ignored, not merged.
pub fn dedup_lines(lines: &[ProductLineRequest]) -> Vec<ProductLineRequest> {
    let mut seen = HashSet::new();
    lines
        .iter()
        .filter(|line| seen.insert(line.product_id))
        .cloned()
        .collect()
}

/// Prices deduplicated lines against the catalog and returns them with their total.
/// Catalog rows are only read.
pub fn aggregate_lines(
    lines: &[ProductLineRequest],
    catalog: &HashMap<i32, product::Model>,
) -> Result<(Vec<OrderLine>, Decimal), ServiceError> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;

    for line in dedup_lines(lines) {
        let product = catalog.get(&line.product_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Product {} not found", line.product_id))
        })?;
        let subtotal = product
            .price
            .checked_mul(Decimal::from(line.quantity))
            .filter(|v| *v <= MAX_ORDER_TOTAL)
            .ok_or_else(out_of_range)?;
        total = total
            .checked_add(subtotal)
            .filter(|v| *v <= MAX_ORDER_TOTAL)
            .ok_or_else(out_of_range)?;
        priced.push(OrderLine {
            product_id: product.id,
            product_name: product.name.clone(),
            unit_price: product.price,
            quantity: line.quantity,
            subtotal,
        });
    }

    Ok((priced, total))
}

fn out_of_range() -> ServiceError {
    ServiceError::ValidationError("productDetails: order total is out of range".to_string())
}

const MAX_UUID_LEN: usize = 64;

/// Picks the caller-supplied uuid when generation is disabled, otherwise a fresh v4.
/// Supplied values name the bill file, so only ASCII letters, digits and `-` pass.
pub fn resolve_uuid(is_generate: bool, supplied: Option<&str>) -> Result<String, ServiceError> {
    if is_generate {
        return Ok(Uuid::new_v4().to_string());
    }
    let uuid = supplied.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        ServiceError::ValidationError("uuid: is required when isGenerate is false".to_string())
    })?;
    if uuid.len() > MAX_UUID_LEN
        || !uuid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ServiceError::ValidationError(format!(
            "uuid: must be 1-{} characters of letters, digits or '-'",
            MAX_UUID_LEN
        )));
    }
    Ok(uuid.to_string())
}

fn map_write_error(e: DbErr, context: &str) -> ServiceError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = e.sql_err() {
        warn!(error = %detail, "{}: unique constraint violated", context);
        return ServiceError::Conflict("Order already exists".to_string());
    }
    error!(error = %e, "{}", context);
    ServiceError::DatabaseError(e)
}

/// Order aggregation workflow
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Validates a submission, prices its lines and stores order plus lines in one transaction
    #[instrument(skip(self, caller, request), fields(user_id = caller.user_id))]
    pub async fn add_order(
        &self,
        caller: &AuthUser,
        request: OrderRequest,
    ) -> Result<OrderPlaced, ServiceError> {
        let (buyer, lines) = request.validated()?;
        let uuid = resolve_uuid(request.is_generate, request.uuid.as_deref())?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let owner_id = match request.user_id {
            Some(user_id) if caller.is_admin() && user_id != caller.user_id => {
                UserEntity::find_by_id(user_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?
                    .id
            }
            _ => caller.user_id,
        };

        if OrderEntity::find()
            .filter(order::Column::Uuid.eq(uuid.as_str()))
            .one(&txn)
            .await?
            .is_some()
        {
            warn!(uuid = %uuid, "Order uuid already in use");
            return Err(ServiceError::Conflict("Order already exists".to_string()));
        }

        let (priced, total) = price_lines(&txn, &lines).await?;

        let order_model = OrderActiveModel {
            uuid: Set(uuid.clone()),
            user_id: Set(owner_id),
            name: Set(buyer.name),
            email: Set(buyer.email),
            contact_number: Set(buyer.contact_number),
            country: Set(buyer.country),
            state: Set(buyer.state),
            city: Set(buyer.city),
            postal_code: Set(buyer.postal_code),
            address: Set(buyer.address),
            payment_method: Set(buyer.payment_method),
            total_amount: Set(total),
            status: Set(OrderStatus::Pending),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| map_write_error(e, "Failed to create order"))?;

        insert_lines(&txn, order_model.id, &priced).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = order_model.id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        counter!("fitmarket_orders.created", 1);
        info!(
            order_id = order_model.id,
            uuid = %uuid,
            lines = priced.len(),
            total = %total,
            "Order placed successfully"
        );

        Ok(OrderPlaced { uuid })
    }

    /// Replaces the lines and buyer fields of a pending order. uuid and owner never change.
    #[instrument(skip(self, caller, request), fields(user_id = caller.user_id, order_id = ?request.id))]
    pub async fn update_order(
        &self,
        caller: &AuthUser,
        request: OrderRequest,
    ) -> Result<OrderPlaced, ServiceError> {
        let order_id = request
            .id
            .ok_or_else(|| ServiceError::ValidationError("id: is required".to_string()))?;
        let (buyer, lines) = request.validated()?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to start transaction for order update");
            ServiceError::DatabaseError(e)
        })?;

        let existing = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if existing.status.is_complete() {
            warn!(order_id, "Rejected update of completed order");
            return Err(ServiceError::Forbidden(format!(
                "Order {} is complete and can no longer be modified",
                order_id
            )));
        }

        ensure_admin_or_owner(caller, existing.user_id)?;

        let (priced, total) = price_lines(&txn, &lines).await?;

        OrderDetailsEntity::delete_many()
            .filter(order_details::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        insert_lines(&txn, order_id, &priced).await?;

        let uuid = existing.uuid.clone();
        let mut active: OrderActiveModel = existing.into();
        active.name = Set(buyer.name);
        active.email = Set(buyer.email);
        active.contact_number = Set(buyer.contact_number);
        active.country = Set(buyer.country);
        active.state = Set(buyer.state);
        active.city = Set(buyer.city);
        active.postal_code = Set(buyer.postal_code);
        active.address = Set(buyer.address);
        active.payment_method = Set(buyer.payment_method);
        active.total_amount = Set(total);
        active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id, "Failed to update order");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit order update");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, total = %total, "Order updated successfully");
        Ok(OrderPlaced { uuid })
    }

    /// Admin: every order. Everyone else: orders they own.
    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn list_orders(&self, caller: &AuthUser) -> Result<Vec<OrderView>, ServiceError> {
        let mut query = OrderEntity::find();
        if !caller.is_admin() {
            query = query.filter(order::Column::UserId.eq(caller.user_id));
        }
        self.load_views(query).await
    }

    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn get_order(&self, caller: &AuthUser, id: i32) -> Result<OrderView, ServiceError> {
        let order = self.find_order(id).await?;
        ensure_admin_or_owner(caller, order.user_id)?;

        let mut views = self
            .load_views(OrderEntity::find().filter(order::Column::Id.eq(id)))
            .await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))
    }

    #[instrument(skip(self, caller), fields(user_id = caller.user_id, status = %status))]
    pub async fn list_orders_by_status(
        &self,
        caller: &AuthUser,
        status: OrderStatus,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let mut query = OrderEntity::find().filter(order::Column::Status.eq(status));
        if !caller.is_admin() {
            query = query.filter(order::Column::UserId.eq(caller.user_id));
        }
        self.load_views(query).await
    }

    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn list_orders_by_user(
        &self,
        caller: &AuthUser,
        user_id: i32,
    ) -> Result<Vec<OrderView>, ServiceError> {
        ensure_admin_or_owner(caller, user_id)?;
        self.load_views(OrderEntity::find().filter(order::Column::UserId.eq(user_id)))
            .await
    }

    /// Admin-only pending/complete flip
    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn update_status(
        &self,
        caller: &AuthUser,
        id: i32,
    ) -> Result<order::Model, ServiceError> {
        ensure_admin(caller)?;
        let order = self.find_order(id).await?;

        let old_status = order.status;
        let mut active: OrderActiveModel = order.into();
        active.status = Set(old_status.toggled());
        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, order_id = id, "Failed to toggle order status");
            ServiceError::DatabaseError(e)
        })?;

        counter!("fitmarket_orders.status_toggled", 1);
        info!(
            order_id = id,
            old_status = %old_status,
            new_status = %updated.status,
            "Order status updated"
        );
        Ok(updated)
    }

    /// Admin-only removal of an order and its lines
    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn delete_order(&self, caller: &AuthUser, id: i32) -> Result<(), ServiceError> {
        ensure_admin(caller)?;

        let txn = self.db_pool.begin().await?;
        let order = OrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

        OrderDetailsEntity::delete_many()
            .filter(order_details::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;
        OrderEntity::delete_by_id(order.id).exec(&txn).await?;
        txn.commit().await?;

        info!(order_id = id, "Order deleted");
        Ok(())
    }

    /// Order with lines for bill rendering, visible to admin or owner
    pub async fn order_with_lines(
        &self,
        caller: &AuthUser,
        id: i32,
    ) -> Result<(order::Model, Vec<order_details::Model>), ServiceError> {
        let view = self.get_order(caller, id).await?;
        Ok((view.order, view.details))
    }

    async fn find_order(&self, id: i32) -> Result<order::Model, ServiceError> {
        OrderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = id, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))
    }

    /// Loads owners and lines for the selected orders
    async fn load_views(
        &self,
        query: sea_orm::Select<OrderEntity>,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let db = &*self.db_pool;
        let rows = query
            .order_by_asc(order::Column::Id)
            .find_with_related(OrderDetailsEntity)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load orders");
                ServiceError::DatabaseError(e)
            })?;

        let user_ids: Vec<i32> = rows
            .iter()
            .map(|(o, _)| o.user_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let users: HashMap<i32, user::Model> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            UserEntity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|(order, mut details)| {
                details.sort_by_key(|d| d.id);
                let user = users.get(&order.user_id).map(UserSummary::from);
                OrderView {
                    order,
                    user,
                    details,
                }
            })
            .collect())
    }
}

/// Resolves every referenced product inside the transaction and prices the lines
async fn price_lines(
    txn: &DatabaseTransaction,
    lines: &[ProductLineRequest],
) -> Result<(Vec<OrderLine>, Decimal), ServiceError> {
    let ids: Vec<i32> = dedup_lines(lines).iter().map(|l| l.product_id).collect();
    let catalog: HashMap<i32, product::Model> = ProductEntity::find()
        .filter(product::Column::Id.is_in(ids))
        .all(txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to resolve order products");
            ServiceError::DatabaseError(e)
        })?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    aggregate_lines(lines, &catalog).map_err(|e| {
        warn!(error = %e, "Order references an unknown product");
        e
    })
}

async fn insert_lines<C: ConnectionTrait>(
    db: &C,
    order_id: i32,
    lines: &[OrderLine],
) -> Result<(), ServiceError> {
    for line in lines {
        order_details::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            unit_price: Set(line.unit_price),
            quantity: Set(line.quantity),
            subtotal: Set(line.subtotal),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, order_id, product_id = line.product_id, "Failed to insert order line");
            ServiceError::DatabaseError(e)
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn product(id: i32, price: Decimal) -> product::Model {
        product::Model {
            id,
            name: format!("Product {}", id),
            description: None,
            price,
            quantity: 100,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(product_id: i32, quantity: i32) -> ProductLineRequest {
        ProductLineRequest {
            product_id,
            quantity,
        }
    }

    fn catalog() -> HashMap<i32, product::Model> {
        [product(1, dec!(10.0)), product(2, dec!(2.5))]
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    }

    fn full_request() -> OrderRequest {
        OrderRequest {
            id: None,
            is_generate: true,
            uuid: None,
            user_id: None,
            name: Some("Ana".into()),
            email: Some("ana@example.com".into()),
            contact_number: Some("555-0100".into()),
            country: Some("PT".into()),
            state: Some("Lisboa".into()),
            city: Some("Lisboa".into()),
            postal_code: Some("1000-001".into()),
            address: Some("Rua 1".into()),
            payment_method: Some("card".into()),
            product_details: Some(vec![line(1, 2)]),
        }
    }

    #[test]
    fn single_line_total_matches_subtotal() {
        let (lines, total) = aggregate_lines(&[line(1, 2)], &catalog()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].subtotal, dec!(20.0));
        assert_eq!(total, dec!(20.0));
    }

    #[test]
    fn total_is_sum_over_distinct_products() {
        let (lines, total) = aggregate_lines(&[line(1, 1), line(2, 4)], &catalog()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(total, dec!(20.0));
        assert_eq!(
            total,
            lines.iter().map(|l| l.subtotal).sum::<Decimal>()
        );
    }

    #[test]
    fn duplicate_product_keeps_first_occurrence() {
        let (lines, total) = aggregate_lines(&[line(1, 1), line(1, 3)], &catalog()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 1);
        assert_eq!(total, dec!(10.0));
    }

    #[test]
    fn unknown_product_fails_whole_aggregation() {
        let err = aggregate_lines(&[line(1, 1), line(99, 1)], &catalog()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(msg) if msg.contains("99")));
    }

    #[test]
    fn supplied_uuid_requires_a_value() {
        assert_eq!(resolve_uuid(false, Some("abc-1")).unwrap(), "abc-1");
        assert!(matches!(
            resolve_uuid(false, Some("  ")),
            Err(ServiceError::ValidationError(_))
        ));
        let generated = resolve_uuid(true, Some("ignored")).unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());
    }

    #[rstest::rstest]
    #[case("../escape")]
    #[case("/tmp/owned")]
    #[case("a/b")]
    #[case("bill.pdf")]
    #[case("a\\b")]
    fn supplied_uuid_cannot_name_a_path(#[case] supplied: &str) {
        assert!(matches!(
            resolve_uuid(false, Some(supplied)),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn supplied_uuid_length_is_capped() {
        assert!(resolve_uuid(false, Some(&"a".repeat(64))).is_ok());
        assert!(matches!(
            resolve_uuid(false, Some(&"a".repeat(65))),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn missing_fields_are_reported() {
        let mut req = full_request();
        req.city = None;
        req.product_details = Some(vec![]);
        match req.validated() {
            Err(ServiceError::ValidationError(msg)) => {
                assert!(msg.contains("city: is required"));
                assert!(msg.contains("product_details"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn non_positive_quantity_is_invalid() {
        let mut req = full_request();
        req.product_details = Some(vec![line(1, 0)]);
        assert!(matches!(
            req.validated(),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn quantity_above_the_cap_is_invalid() {
        let mut req = full_request();
        req.product_details = Some(vec![line(1, MAX_LINE_QUANTITY + 1)]);
        assert!(matches!(
            req.validated(),
            Err(ServiceError::ValidationError(msg)) if msg.contains("between 1 and 10000")
        ));
    }

    #[test]
    fn whitespace_only_buyer_fields_are_rejected() {
        let mut req = full_request();
        req.name = Some("   ".into());
        req.address = Some("\t".into());
        match req.validated() {
            Err(ServiceError::ValidationError(msg)) => {
                assert!(msg.contains("name: must not be blank"));
                assert!(msg.contains("address: must not be blank"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn total_beyond_the_column_range_is_rejected() {
        assert_eq!(MAX_ORDER_TOTAL, dec!(99_999_999_999_999.99));
        let catalog: HashMap<i32, product::Model> =
            [product(1, Decimal::MAX), product(2, dec!(99_999_999_999.99))]
                .into_iter()
                .map(|p| (p.id, p))
                .collect();

        // Decimal::MAX * 2 overflows outright
        assert!(matches!(
            aggregate_lines(&[line(1, 2)], &catalog),
            Err(ServiceError::ValidationError(msg)) if msg.contains("out of range")
        ));
        // fits Decimal but not decimal(16,2)
        assert!(matches!(
            aggregate_lines(&[line(2, 10_000)], &catalog),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(aggregate_lines(&[line(2, 1)], &catalog).is_ok());
    }

    #[test]
    fn request_accepts_camel_case_wire_format() {
        let req: OrderRequest = serde_json::from_value(serde_json::json!({
            "name": "Ana",
            "email": "ana@example.com",
            "contactNumber": "1",
            "country": "PT",
            "state": "L",
            "city": "L",
            "postalCode": "1",
            "address": "Rua",
            "paymentMethod": "cash",
            "productDetails": [{"productId": 1, "quantity": 2}]
        }))
        .unwrap();
        assert!(req.is_generate);
        assert_eq!(req.product_details.unwrap(), vec![line(1, 2)]);
    }
}
