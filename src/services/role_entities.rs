use crate::{
    auth::{ensure_admin, AuthUser},
    db::DbPool,
    entities::{
        partner::{self, Entity as PartnerEntity},
        role_entity::{self, Entity as RoleEntityEntity},
        user::{self, Entity as UserEntity},
        Role, RoleKind,
    },
    errors::{non_blank, ServiceError},
    events::{outbox, Notification},
    services::users::UserService,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Why a partner cannot back a new role entity. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    PartnerMissing,
    UserAlreadyAssociated,
    PartnerAlreadyBacksEntity,
    RoleMismatch { applied: RoleKind, requested: RoleKind },
    PartnerNotApproved,
    NameTaken,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligibility::PartnerMissing => write!(f, "Partner not found"),
            Ineligibility::UserAlreadyAssociated => {
                write!(f, "User is already associated with a role profile")
            }
            Ineligibility::PartnerAlreadyBacksEntity => {
                write!(f, "A profile already exists for this partner")
            }
            Ineligibility::RoleMismatch { applied, requested } => write!(
                f,
                "Partner applied as {} and cannot create a {} profile",
                applied, requested
            ),
            Ineligibility::PartnerNotApproved => write!(f, "Partner is not approved yet"),
            Ineligibility::NameTaken => write!(f, "Name is already taken"),
        }
    }
}

impl From<Ineligibility> for ServiceError {
    fn from(reason: Ineligibility) -> Self {
        ServiceError::BadRequest(reason.to_string())
    }
}

/// Facts gathered before creating a role entity
#[derive(Debug, Clone)]
pub struct EligibilityFacts<'a> {
    pub partner: Option<&'a partner::Model>,
    pub user_has_entity: bool,
    pub partner_has_entity: bool,
    /// Only looked up on the self-service path
    pub name_taken: Option<bool>,
}

/// First failing precondition wins
pub fn check_eligibility(
    facts: &EligibilityFacts<'_>,
    requested: RoleKind,
) -> Result<(), Ineligibility> {
    let partner = facts.partner.ok_or(Ineligibility::PartnerMissing)?;
    if facts.user_has_entity {
        return Err(Ineligibility::UserAlreadyAssociated);
    }
    if facts.partner_has_entity {
        return Err(Ineligibility::PartnerAlreadyBacksEntity);
    }
    if partner.role != requested {
        return Err(Ineligibility::RoleMismatch {
            applied: partner.role,
            requested,
        });
    }
    if !partner.status {
        return Err(Ineligibility::PartnerNotApproved);
    }
    if facts.name_taken == Some(true) {
        return Err(Ineligibility::NameTaken);
    }
    Ok(())
}

/// Role written to the owning user after a status flip. Admins keep theirs.
pub fn synced_role(current: Role, kind: RoleKind, activated: bool) -> Role {
    match (current, activated) {
        (Role::Admin, _) => Role::Admin,
        (_, true) => kind.as_role(),
        (_, false) => Role::User,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleEntityRequest {
    /// Required by updates
    pub id: Option<i32>,
    /// Admin path: the approved partner backing the profile
    pub partner_id: Option<i32>,
    #[validate(length(max = 200, message = "must be at most 200 characters"), custom = "non_blank")]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
}

fn map_write_error(e: DbErr, context: &str) -> ServiceError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = e.sql_err() {
        warn!(error = %detail, "{}: unique constraint violated", context);
        return ServiceError::Conflict("Profile name or owner already in use".to_string());
    }
    error!(error = %e, "{}", context);
    ServiceError::DatabaseError(e)
}

/// Driver, center, store and trainer profiles
#[derive(Clone)]
pub struct RoleEntityService {
    db_pool: Arc<DbPool>,
}

impl RoleEntityService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Creates an inactive profile once the backing partner passes every check
    #[instrument(skip(self, caller, request), fields(user_id = caller.user_id, kind = %kind))]
    pub async fn add_role_entity(
        &self,
        caller: &AuthUser,
        kind: RoleKind,
        request: RoleEntityRequest,
    ) -> Result<role_entity::Model, ServiceError> {
        request.validate()?;
        let name = request.name.trim().to_string();

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for profile creation");
            ServiceError::DatabaseError(e)
        })?;

        let admin_path = caller.is_admin() && request.partner_id.is_some();
        let partner = match request.partner_id.filter(|_| admin_path) {
            Some(partner_id) => PartnerEntity::find_by_id(partner_id).one(&txn).await?,
            None => {
                PartnerEntity::find()
                    .filter(partner::Column::UserId.eq(caller.user_id))
                    .filter(partner::Column::Role.eq(kind))
                    .one(&txn)
                    .await?
            }
        };

        let (user_has_entity, partner_has_entity) = match &partner {
            Some(p) => (
                exists(&txn, role_entity::Column::UserId.eq(p.user_id)).await?,
                exists(&txn, role_entity::Column::PartnerId.eq(p.id)).await?,
            ),
            None => (false, false),
        };
        let name_taken = if admin_path {
            None
        } else {
            Some(exists(&txn, role_entity::Column::Name.eq(name.as_str())).await?)
        };

        let facts = EligibilityFacts {
            partner: partner.as_ref(),
            user_has_entity,
            partner_has_entity,
            name_taken,
        };
        if let Err(reason) = check_eligibility(&facts, kind) {
            warn!(reason = %reason, "Profile creation refused");
            return Err(reason.into());
        }
        let partner = partner.ok_or(Ineligibility::PartnerMissing)?;

        let created = role_entity::ActiveModel {
            kind: Set(kind),
            partner_id: Set(partner.id),
            user_id: Set(partner.user_id),
            name: Set(name),
            email: Set(request.email),
            contact_number: Set(request.contact_number),
            address: Set(request.address),
            description: Set(request.description),
            active: Set(false),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| map_write_error(e, "Failed to create profile"))?;

        outbox::enqueue(
            &txn,
            &Notification::broadcast(
                kind.topic(),
                format!("New {} {}", kind, created.name),
                json!({ "id": created.id, "kind": kind, "userId": created.user_id }),
            ),
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit profile creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(entity_id = created.id, partner_id = partner.id, "{} created", kind.label());
        Ok(created)
    }

    /// Flips `active` and rewrites the owner's role to match.
    /// Admins may always flip; owners only while the profile is active.
    #[instrument(skip(self, caller), fields(user_id = caller.user_id, kind = %kind))]
    pub async fn update_role_entity_status(
        &self,
        caller: &AuthUser,
        kind: RoleKind,
        id: i32,
    ) -> Result<role_entity::Model, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for status update");
            ServiceError::DatabaseError(e)
        })?;

        let entity = find_in(&txn, kind, id).await?;
        if !(caller.is_admin() || (caller.is_user(entity.user_id) && entity.active)) {
            warn!(entity_id = id, "Status change not allowed");
            return Err(ServiceError::Unauthorized(
                "You are not allowed to change this profile's status".to_string(),
            ));
        }

        let owner = UserEntity::find_by_id(entity.user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", entity.user_id)))?;

        let activated = !entity.active;
        let mut active: role_entity::ActiveModel = entity.into();
        active.active = Set(activated);
        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, entity_id = id, "Failed to update profile status");
            ServiceError::DatabaseError(e)
        })?;

        let new_role = synced_role(owner.role, kind, activated);
        if new_role != owner.role {
            let mut owner_model: user::ActiveModel = owner.clone().into();
            owner_model.role = Set(new_role);
            owner_model.update(&txn).await.map_err(|e| {
                error!(error = %e, user_id = owner.id, "Failed to sync user role");
                ServiceError::DatabaseError(e)
            })?;
        }

        let verdict = if activated { "activated" } else { "deactivated" };
        let admins = UserService::admin_emails(&txn).await?;
        outbox::enqueue_all(
            &txn,
            &[
                Notification::email(
                    admins,
                    format!("{} {}", kind.label(), verdict),
                    format!(
                        "{} profile \"{}\" owned by {} was {}.",
                        kind.label(),
                        updated.name,
                        owner.email,
                        verdict
                    ),
                ),
                Notification::email(
                    vec![owner.email.clone()],
                    format!("Your {} profile was {}", kind, verdict),
                    format!(
                        "Hello {}, your {} profile \"{}\" was {}. Your role is now {}.",
                        owner.name, kind, updated.name, verdict, new_role
                    ),
                ),
            ],
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit status update");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            entity_id = id,
            active = activated,
            role = %new_role,
            "{} status updated",
            kind.label()
        );
        Ok(updated)
    }

    /// Admins see every profile of the kind; others see active ones and their own
    pub async fn list_role_entities(
        &self,
        caller: &AuthUser,
        kind: RoleKind,
    ) -> Result<Vec<role_entity::Model>, ServiceError> {
        let mut query = RoleEntityEntity::find()
            .filter(role_entity::Column::Kind.eq(kind))
            .order_by_asc(role_entity::Column::Id);
        if !caller.is_admin() {
            query = query.filter(
                Condition::any()
                    .add(role_entity::Column::Active.eq(true))
                    .add(role_entity::Column::UserId.eq(caller.user_id)),
            );
        }
        Ok(query.all(&*self.db_pool).await?)
    }

    pub async fn get_role_entity(
        &self,
        caller: &AuthUser,
        kind: RoleKind,
        id: i32,
    ) -> Result<role_entity::Model, ServiceError> {
        let entity = find_in(&*self.db_pool, kind, id).await?;
        if entity.active || caller.is_admin() || caller.is_user(entity.user_id) {
            Ok(entity)
        } else {
            Err(ServiceError::NotFound(format!(
                "{} {} not found",
                kind.label(),
                id
            )))
        }
    }

    /// Profile fields only; owner links and status stay as they are
    #[instrument(skip(self, caller, request), fields(user_id = caller.user_id, kind = %kind))]
    pub async fn update_role_entity(
        &self,
        caller: &AuthUser,
        kind: RoleKind,
        request: RoleEntityRequest,
    ) -> Result<role_entity::Model, ServiceError> {
        let id = request
            .id
            .ok_or_else(|| ServiceError::ValidationError("id: is required".to_string()))?;
        request.validate()?;

        let entity = find_in(&*self.db_pool, kind, id).await?;
        crate::auth::ensure_admin_or_owner(caller, entity.user_id)?;

        let mut active: role_entity::ActiveModel = entity.into();
        active.name = Set(request.name.trim().to_string());
        active.email = Set(request.email);
        active.contact_number = Set(request.contact_number);
        active.address = Set(request.address);
        active.description = Set(request.description);
        let updated = active
            .update(&*self.db_pool)
            .await
            .map_err(|e| map_write_error(e, "Failed to update profile"))?;

        info!(entity_id = id, "{} updated", kind.label());
        Ok(updated)
    }

    /// Admin-only; the former owner drops back to `user`
    #[instrument(skip(self, caller), fields(user_id = caller.user_id, kind = %kind))]
    pub async fn delete_role_entity(
        &self,
        caller: &AuthUser,
        kind: RoleKind,
        id: i32,
    ) -> Result<(), ServiceError> {
        ensure_admin(caller)?;

        let txn = self.db_pool.begin().await?;
        let entity = find_in(&txn, kind, id).await?;
        RoleEntityEntity::delete_by_id(entity.id).exec(&txn).await?;

        if let Some(owner) = UserEntity::find_by_id(entity.user_id).one(&txn).await? {
            let reset = synced_role(owner.role, kind, false);
            if reset != owner.role {
                let mut owner_model: user::ActiveModel = owner.into();
                owner_model.role = Set(reset);
                owner_model.update(&txn).await?;
            }
        }
        txn.commit().await?;

        info!(entity_id = id, "{} deleted", kind.label());
        Ok(())
    }
}

async fn exists<C: ConnectionTrait>(
    db: &C,
    condition: sea_orm::sea_query::SimpleExpr,
) -> Result<bool, ServiceError> {
    Ok(RoleEntityEntity::find().filter(condition).count(db).await? > 0)
}

async fn find_in<C: ConnectionTrait>(
    db: &C,
    kind: RoleKind,
    id: i32,
) -> Result<role_entity::Model, ServiceError> {
    RoleEntityEntity::find_by_id(id)
        .filter(role_entity::Column::Kind.eq(kind))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("{} {} not found", kind.label(), id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn partner(role: RoleKind, approved: bool) -> partner::Model {
        partner::Model {
            id: 1,
            user_id: 10,
            role,
            status: approved,
            company_name: None,
            contact_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn facts(partner: Option<&partner::Model>) -> EligibilityFacts<'_> {
        EligibilityFacts {
            partner,
            user_has_entity: false,
            partner_has_entity: false,
            name_taken: Some(false),
        }
    }

    #[test]
    fn approved_matching_partner_is_eligible() {
        let p = partner(RoleKind::Trainer, true);
        assert_eq!(check_eligibility(&facts(Some(&p)), RoleKind::Trainer), Ok(()));
    }

    #[test]
    fn missing_partner_is_reported_first() {
        let mut f = facts(None);
        f.user_has_entity = true;
        assert_eq!(
            check_eligibility(&f, RoleKind::Driver),
            Err(Ineligibility::PartnerMissing)
        );
    }

    #[test]
    fn checks_run_in_order() {
        let p = partner(RoleKind::Store, false);
        let mut f = facts(Some(&p));
        f.user_has_entity = true;
        f.partner_has_entity = true;
        assert_eq!(
            check_eligibility(&f, RoleKind::Driver),
            Err(Ineligibility::UserAlreadyAssociated)
        );
        f.user_has_entity = false;
        assert_eq!(
            check_eligibility(&f, RoleKind::Driver),
            Err(Ineligibility::PartnerAlreadyBacksEntity)
        );
        f.partner_has_entity = false;
        assert!(matches!(
            check_eligibility(&f, RoleKind::Driver),
            Err(Ineligibility::RoleMismatch { .. })
        ));
        assert_eq!(
            check_eligibility(&f, RoleKind::Store),
            Err(Ineligibility::PartnerNotApproved)
        );
    }

    #[rstest]
    #[case(RoleKind::Driver)]
    #[case(RoleKind::Center)]
    #[case(RoleKind::Store)]
    #[case(RoleKind::Trainer)]
    fn unapproved_partner_never_qualifies(#[case] kind: RoleKind) {
        let p = partner(kind, false);
        let mut f = facts(Some(&p));
        f.name_taken = None;
        assert_eq!(
            check_eligibility(&f, kind),
            Err(Ineligibility::PartnerNotApproved)
        );
    }

    #[test]
    fn name_check_only_applies_when_looked_up() {
        let p = partner(RoleKind::Center, true);
        let mut f = facts(Some(&p));
        f.name_taken = Some(true);
        assert_eq!(
            check_eligibility(&f, RoleKind::Center),
            Err(Ineligibility::NameTaken)
        );
        f.name_taken = None;
        assert_eq!(check_eligibility(&f, RoleKind::Center), Ok(()));
    }

    #[test]
    fn role_sync_promotes_and_demotes() {
        assert_eq!(synced_role(Role::User, RoleKind::Driver, true), Role::Driver);
        assert_eq!(synced_role(Role::Driver, RoleKind::Driver, false), Role::User);
        assert_eq!(synced_role(Role::Admin, RoleKind::Store, true), Role::Admin);
        assert_eq!(synced_role(Role::Admin, RoleKind::Store, false), Role::Admin);
    }

    #[test]
    fn ineligibility_becomes_bad_request() {
        let err: ServiceError = Ineligibility::PartnerNotApproved.into();
        assert!(matches!(err, ServiceError::BadRequest(msg) if msg.contains("not approved")));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn blank_profile_name_is_rejected(#[case] name: &str) {
        let request = RoleEntityRequest {
            id: None,
            partner_id: Some(1),
            name: name.to_string(),
            email: None,
            contact_number: None,
            address: None,
            description: None,
        };
        let err: ServiceError = request.validate().unwrap_err().into();
        assert!(matches!(err, ServiceError::ValidationError(msg) if msg == "name: must not be blank"));
    }
}
