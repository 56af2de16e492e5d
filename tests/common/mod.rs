#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use fitmarket_api::{
    auth::{AuthConfig, AuthService, AuthUser},
    config::AppConfig,
    db,
    entities::{product, user, Role},
    events::{Broadcaster, Mailer, NotificationDispatcher},
    AppState,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use std::sync::Mutex;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str =
    "k9Qz3vLm8XwRt2Yp7NsBd4Hf6Jc1Ga5Ue0Io-Ku_Pl+Mn=Zx!Cv@Bn#Qw$Er%Ty^Ui&Op*As";

/// Mail transport that keeps every message for assertions
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(Vec<String>, String)>>,
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        _from: &str,
        to: &[String],
        subject: &str,
        _body: &str,
    ) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_vec(), subject.to_string()));
        Ok(())
    }
}

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DatabaseConnection>,
    pub auth_service: Arc<AuthService>,
    pub mailer: Arc<RecordingMailer>,
    pub dispatcher: NotificationDispatcher,
    pub bill_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let bill_dir = tempfile::tempdir().expect("failed to create bill dir");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.cors_allow_any_origin = true;
        cfg.bill_dir = bill_dir.path().to_string_lossy().into_owned();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            TEST_SECRET.to_string(),
            Duration::from_secs(3600),
        )));
        let broadcaster = Broadcaster::new(64);
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = NotificationDispatcher::new(
            mailer.clone(),
            broadcaster.clone(),
            "no-reply@fitmarket.test".to_string(),
        );

        let state = AppState::new(db.clone(), cfg, auth_service.clone(), broadcaster);
        let router = fitmarket_api::build_app(state.clone());

        Self {
            router,
            state,
            db,
            auth_service,
            mailer,
            dispatcher,
            bill_dir,
        }
    }

    /// Inserts a user directly; the password hash is a placeholder
    pub async fn create_user(&self, email: &str, role: Role) -> user::Model {
        user::ActiveModel {
            name: Set(email.split('@').next().unwrap_or("user").to_string()),
            email: Set(email.to_string()),
            contact_number: Set(None),
            password_hash: Set("not-a-real-hash".to_string()),
            role: Set(role),
            active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("failed to insert user")
    }

    /// Caller identity as the auth middleware would build it
    pub fn caller(&self, user: &user::Model) -> AuthUser {
        AuthUser {
            user_id: user.id,
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            role: user.role,
            token_id: "test".to_string(),
        }
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        self.auth_service
            .generate_token(user)
            .expect("failed to issue token")
            .access_token
    }

    pub async fn create_product(&self, name: &str, price: Decimal) -> product::Model {
        product::ActiveModel {
            name: Set(name.to_string()),
            description: Set(Some(format!("{} description", name))),
            price: Set(price),
            quantity: Set(50),
            active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("failed to insert product")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("body is not json")
}
