use crate::{
    auth::{ensure_admin, ensure_admin_or_owner, AuthUser},
    db::DbPool,
    entities::{
        partner::{self, Entity as PartnerEntity},
        role_entity,
        user::Entity as UserEntity,
        RoleKind,
    },
    errors::{non_blank, ServiceError},
    events::{outbox, Notification},
    services::users::UserService,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

pub const PARTNER_TOPIC: &str = "partner";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRequest {
    /// Role kind applied for
    pub role: RoleKind,
    #[validate(length(max = 200, message = "must be at most 200 characters"), custom = "non_blank")]
    pub company_name: Option<String>,
    #[validate(length(max = 50, message = "must be at most 50 characters"), custom = "non_blank")]
    pub contact_number: Option<String>,
    /// Applicant override, honoured for admin callers only
    pub user_id: Option<i32>,
}

/// Partner applications and their admin approval
#[derive(Clone)]
pub struct PartnerService {
    db_pool: Arc<DbPool>,
}

impl PartnerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Files an unapproved application for one role kind
    #[instrument(skip(self, caller, request), fields(user_id = caller.user_id, role = %request.role))]
    pub async fn apply_partner(
        &self,
        caller: &AuthUser,
        request: PartnerRequest,
    ) -> Result<partner::Model, ServiceError> {
        request.validate()?;

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for partner application");
            ServiceError::DatabaseError(e)
        })?;

        let applicant_id = match request.user_id {
            Some(user_id) if caller.is_admin() => user_id,
            _ => caller.user_id,
        };
        let applicant = UserEntity::find_by_id(applicant_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", applicant_id)))?;

        let existing = PartnerEntity::find()
            .filter(partner::Column::UserId.eq(applicant.id))
            .filter(partner::Column::Role.eq(request.role))
            .count(&txn)
            .await?;
        if existing > 0 {
            warn!(applicant_id, "Duplicate partner application");
            return Err(ServiceError::Conflict(format!(
                "A {} partner application already exists for this user",
                request.role
            )));
        }

        let created = partner::ActiveModel {
            user_id: Set(applicant.id),
            role: Set(request.role),
            status: Set(false),
            company_name: Set(request.company_name),
            contact_number: Set(request.contact_number),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, applicant_id, "Failed to create partner");
            ServiceError::DatabaseError(e)
        })?;

        let admins = UserService::admin_emails(&txn).await?;
        outbox::enqueue_all(
            &txn,
            &[
                Notification::broadcast(
                    PARTNER_TOPIC,
                    format!("New {} partner application from {}", created.role, applicant.name),
                    json!({ "partnerId": created.id, "userId": applicant.id, "role": created.role }),
                ),
                Notification::email(
                    admins,
                    format!("New {} partner application", created.role.label()),
                    format!(
                        "{} ({}) applied to become a {} partner.",
                        applicant.name, applicant.email, created.role
                    ),
                ),
            ],
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit partner application");
            ServiceError::DatabaseError(e)
        })?;

        info!(partner_id = created.id, "Partner application received");
        Ok(created)
    }

    /// Admin: every application. Everyone else: their own.
    pub async fn list_partners(
        &self,
        caller: &AuthUser,
    ) -> Result<Vec<partner::Model>, ServiceError> {
        let mut query = PartnerEntity::find().order_by_asc(partner::Column::Id);
        if !caller.is_admin() {
            query = query.filter(partner::Column::UserId.eq(caller.user_id));
        }
        Ok(query.all(&*self.db_pool).await?)
    }

    pub async fn get_partner(
        &self,
        caller: &AuthUser,
        id: i32,
    ) -> Result<partner::Model, ServiceError> {
        let found = self.find(id).await?;
        ensure_admin_or_owner(caller, found.user_id)?;
        Ok(found)
    }

    /// Admin-only approval flip; the applicant is told by email
    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn update_partner_status(
        &self,
        caller: &AuthUser,
        id: i32,
    ) -> Result<partner::Model, ServiceError> {
        ensure_admin(caller)?;

        let txn = self.db_pool.begin().await?;
        let found = PartnerEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Partner {} not found", id)))?;
        let applicant = UserEntity::find_by_id(found.user_id).one(&txn).await?;

        let approved = !found.status;
        let mut active: partner::ActiveModel = found.into();
        active.status = Set(approved);
        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, partner_id = id, "Failed to update partner status");
            ServiceError::DatabaseError(e)
        })?;

        if let Some(applicant) = applicant {
            let verdict = if approved { "approved" } else { "revoked" };
            outbox::enqueue(
                &txn,
                &Notification::email(
                    vec![applicant.email],
                    format!("{} partner application {}", updated.role.label(), verdict),
                    format!(
                        "Hello {}, your {} partner application has been {}.",
                        applicant.name, updated.role, verdict
                    ),
                ),
            )
            .await?;
        }
        txn.commit().await?;

        info!(partner_id = id, approved, "Partner status updated");
        Ok(updated)
    }

    /// Admin-only; refused while a role entity is backed by the partner
    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn delete_partner(&self, caller: &AuthUser, id: i32) -> Result<(), ServiceError> {
        ensure_admin(caller)?;
        let found = self.find(id).await?;

        let backing = role_entity::Entity::find()
            .filter(role_entity::Column::PartnerId.eq(found.id))
            .count(&*self.db_pool)
            .await?;
        if backing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Partner {} still backs a {} profile",
                id, found.role
            )));
        }

        PartnerEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        info!(partner_id = id, "Partner deleted");
        Ok(())
    }

    async fn find(&self, id: i32) -> Result<partner::Model, ServiceError> {
        PartnerEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Partner {} not found", id)))
    }
}
