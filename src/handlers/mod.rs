pub mod common;
pub mod orders;
pub mod partners;
pub mod products;
pub mod role_entities;
pub mod users;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    services::{
        billing::{BillingService, PdfBillRenderer},
        orders::OrderService,
        partners::PartnerService,
        products::ProductService,
        role_entities::RoleEntityService,
        users::UserService,
    },
};
use std::sync::Arc;

pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub products: Arc<ProductService>,
    pub orders: Arc<OrderService>,
    pub billing: Arc<BillingService>,
    pub partners: Arc<PartnerService>,
    pub role_entities: Arc<RoleEntityService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, auth_service: Arc<AuthService>, config: &AppConfig) -> Self {
        let orders = OrderService::new(db_pool.clone());
        let billing = BillingService::new(
            db_pool.clone(),
            orders.clone(),
            Arc::new(PdfBillRenderer),
            config.bill_dir.clone(),
            config.platform_name.clone(),
        );

        Self {
            users: Arc::new(UserService::new(db_pool.clone(), auth_service)),
            products: Arc::new(ProductService::new(db_pool.clone())),
            orders: Arc::new(orders),
            billing: Arc::new(billing),
            partners: Arc::new(PartnerService::new(db_pool.clone())),
            role_entities: Arc::new(RoleEntityService::new(db_pool)),
        }
    }
}
