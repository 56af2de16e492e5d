use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Order lifecycle. Only two states; `toggled` flips between them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "complete")]
    Complete,
}

impl OrderStatus {
    pub fn toggled(self) -> Self {
        match self {
            OrderStatus::Pending => OrderStatus::Complete,
            OrderStatus::Complete => OrderStatus::Pending,
        }
    }

    pub fn is_complete(self) -> bool {
        self == OrderStatus::Complete
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "orders")]
#[schema(as = Order)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// External identifier, unique across orders
    #[sea_orm(unique)]
    pub uuid: String,

    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub contact_number: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub postal_code: String,
    pub address: String,
    pub payment_method: String,

    /// Sum of line subtotals at last persist
    pub total_amount: Decimal,

    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_details::Entity")]
    OrderDetails,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::order_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderDetails.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
            if let ActiveValue::NotSet = active_model.status {
                active_model.status = Set(OrderStatus::Pending);
            }
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_toggle_restores_status() {
        for status in [OrderStatus::Pending, OrderStatus::Complete] {
            assert_ne!(status.toggled(), status);
            assert_eq!(status.toggled().toggled(), status);
        }
    }

    #[test]
    fn status_wire_values_are_lowercase() {
        assert_eq!(OrderStatus::Complete.to_string(), "complete");
        assert_eq!(
            serde_json::from_str::<OrderStatus>("\"pending\"").unwrap(),
            OrderStatus::Pending
        );
    }
}
