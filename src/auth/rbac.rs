/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Route-level role gates plus the ownership checks services run before
 * touching a record.
 */

use super::{AuthError, AuthUser};
use crate::entities::Role;
use crate::errors::ServiceError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<Role>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_role(required_role) {
        warn!(
            user_id = user.user_id,
            role = %user.role,
            required = %required_role,
            "role check failed"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Admin only
pub fn ensure_admin(user: &AuthUser) -> Result<(), ServiceError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(
            "Only admins can perform this action".to_string(),
        ))
    }
}

/// Admin, or the user owning the record
pub fn ensure_admin_or_owner(user: &AuthUser, owner_id: i32) -> Result<(), ServiceError> {
    if user.is_admin() || user.is_user(owner_id) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(
            "You are not allowed to access this resource".to_string(),
        ))
    }
}
