// Order aggregation
pub mod billing;
pub mod orders;
pub mod products;

// Partner approval
pub mod partners;
pub mod role_entities;

// Accounts
pub mod users;
