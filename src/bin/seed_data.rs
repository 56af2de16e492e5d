//! Seed data script - creates an admin account and a small product catalog
//!
//! Run with: cargo run --bin seed-data
//!
//! The admin login comes from SEED_ADMIN_EMAIL / SEED_ADMIN_PASSWORD.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::time::Duration;
use tracing::info;

use fitmarket_api::{
    auth::{AuthConfig, AuthService},
    config, db,
    entities::{product, user, Role},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;
    config::init_tracing("info", false);

    info!("=== FitMarket Seed Data ===");
    let pool = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&pool).await?;

    let auth = AuthService::new(AuthConfig::new(
        cfg.jwt_secret.clone(),
        Duration::from_secs(cfg.jwt_expiration as u64),
    ));

    let email = std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@fitmarket.local".into());
    let password = std::env::var("SEED_ADMIN_PASSWORD")
        .map_err(|_| anyhow::anyhow!("SEED_ADMIN_PASSWORD must be set"))?;
    create_admin(&pool, &auth, &email, &password).await?;

    let created = create_products(&pool).await?;
    info!("  Created {} products", created);

    info!("=== Seed Data Complete ===");
    info!("Log in with POST /api/v1/user/login as {}", email);
    Ok(())
}

async fn create_admin(
    db: &DatabaseConnection,
    auth: &AuthService,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    if user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?
        .is_some()
    {
        info!("  Admin {} already exists", email);
        return Ok(());
    }

    let password_hash = auth
        .hash_password(password)
        .await
        .map_err(|e| anyhow::anyhow!("failed to hash admin password: {}", e))?;
    user::ActiveModel {
        name: Set("Administrator".into()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        role: Set(Role::Admin),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!("  Created admin {}", email);
    Ok(())
}

async fn create_products(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let catalog: [(&str, &str, Decimal, i32); 5] = [
        ("Whey Protein 1kg", "Vanilla whey isolate", dec!(39.90), 120),
        ("Resistance Bands", "Set of five latex bands", dec!(19.50), 300),
        ("Yoga Mat", "6mm non-slip mat", dec!(24.00), 80),
        ("Kettlebell 12kg", "Cast iron kettlebell", dec!(45.00), 40),
        ("Shaker Bottle", "700ml shaker with mixing ball", dec!(7.99), 500),
    ];

    for (name, description, price, quantity) in catalog {
        product::ActiveModel {
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            price: Set(price),
            quantity: Set(quantity),
            active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(catalog.len())
}
