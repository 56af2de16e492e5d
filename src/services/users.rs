use crate::{
    auth::{ensure_admin, AuthService, AuthUser, TokenPair},
    db::DbPool,
    entities::{
        user::{self, Entity as UserEntity},
        Role,
    },
    errors::{non_blank, ServiceError},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Public part of a user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub contact_number: Option<String>,
    pub role: Role,
}

impl From<&user::Model> for UserSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            contact_number: user.contact_number.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(max = 100, message = "must be at most 100 characters"), custom = "non_blank")]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub contact_number: Option<String>,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Token pair plus the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: TokenPair,
    pub user: UserSummary,
}

/// Account signup, login and lookup
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    /// Creates an account with role `user`
    #[instrument(skip_all)]
    pub async fn signup(&self, request: SignupRequest) -> Result<UserSummary, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        let db = &*self.db_pool;
        if UserEntity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(db)
            .await?
            .is_some()
        {
            warn!("Signup with an existing email");
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.auth.hash_password(&request.password).await?;
        let created = user::ActiveModel {
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            contact_number: Set(request.contact_number),
            password_hash: Set(password_hash),
            role: Set(Role::User),
            active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| {
            if let Some(SqlErr::UniqueConstraintViolation(_)) = e.sql_err() {
                return ServiceError::Conflict("Email already registered".to_string());
            }
            error!(error = %e, "Failed to create user");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = created.id, "User registered");
        Ok(UserSummary::from(&created))
    }

    /// Verifies credentials and issues an access token
    #[instrument(skip_all)]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        let found = UserEntity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db_pool)
            .await?;

        let verified = match &found {
            Some(user) if user.active => {
                self.auth
                    .verify_password(&request.password, &user.password_hash)
                    .await?
            }
            _ => false,
        };

        let user = match found {
            Some(user) if verified => user,
            _ => {
                warn!("Rejected login");
                return Err(ServiceError::Unauthorized(
                    "Invalid email or password".to_string(),
                ));
            }
        };

        let token = self.auth.generate_token(&user)?;
        info!(user_id = user.id, "User logged in");
        Ok(LoginResponse {
            token,
            user: UserSummary::from(&user),
        })
    }

    /// Current user as stored. The role may be newer than the token's.
    pub async fn me(&self, caller: &AuthUser) -> Result<UserSummary, ServiceError> {
        self.find(caller.user_id)
            .await
            .map(|user| UserSummary::from(&user))
    }

    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn list_users(&self, caller: &AuthUser) -> Result<Vec<UserSummary>, ServiceError> {
        ensure_admin(caller)?;
        let users = UserEntity::find()
            .order_by_asc(user::Column::Id)
            .all(&*self.db_pool)
            .await?;
        Ok(users.iter().map(UserSummary::from).collect())
    }

    pub async fn find(&self, id: i32) -> Result<user::Model, ServiceError> {
        UserEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    /// Admin accounts, used as notification recipients
    pub async fn admin_emails<C: sea_orm::ConnectionTrait>(db: &C) -> Result<Vec<String>, ServiceError> {
        Ok(UserEntity::find()
            .filter(user::Column::Role.eq(Role::Admin))
            .all(db)
            .await?
            .into_iter()
            .map(|u| u.email)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_rejects_short_password_and_bad_email() {
        let req = SignupRequest {
            name: "Ana".into(),
            email: "not-an-email".into(),
            contact_number: None,
            password: "short".into(),
        };
        let err = ServiceError::from(req.validate().unwrap_err());
        let msg = err.to_string();
        assert!(msg.contains("email"));
        assert!(msg.contains("password"));
    }

    #[test]
    fn summary_hides_password_hash() {
        let now = chrono::Utc::now();
        let user = user::Model {
            id: 3,
            name: "Ana".into(),
            email: "ana@example.com".into(),
            contact_number: None,
            password_hash: "secret".into(),
            role: Role::Trainer,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(UserSummary::from(&user)).unwrap();
        assert_eq!(json["role"], "trainer");
        assert!(json.get("password_hash").is_none());
    }
}
