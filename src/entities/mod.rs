pub mod order;
pub mod order_details;
pub mod outbox_event;
pub mod partner;
pub mod product;
pub mod role_entity;
pub mod roles;
pub mod user;

pub use order::OrderStatus;
pub use roles::{Role, RoleKind};
