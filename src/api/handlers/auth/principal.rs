//! Request authentication and role/permission guards.
//!
//! Handlers call [`require_auth`] with the request headers; a valid signature
//! is necessary but not sufficient, the token digest must also match a live
//! session row. Revoking the session revokes the token immediately.

use axum::http::HeaderMap;
use sqlx::PgPool;

use super::{storage, token, utils, AuthConfig};
use crate::api::error::ApiError;
use crate::api::handlers::roles::permissions::{Feature, PermissionAction, PermissionMap};

/// The authenticated caller of a request.
#[derive(Debug)]
pub struct Principal {
    pub account_id: uuid::Uuid,
    pub email: String,
    pub role_name: String,
    pub permissions: PermissionMap,
    pub is_superadmin: bool,
    /// Digest of the presented session token, for logout.
    pub(crate) token_hash: Vec<u8>,
}

impl Principal {
    /// Superadmins bypass the permission map entirely.
    #[must_use]
    pub fn allows(&self, feature: Feature, action: PermissionAction) -> bool {
        self.is_superadmin || self.permissions.allows(feature, action)
    }

    #[must_use]
    pub fn has_role(&self, roles: &[&str]) -> bool {
        self.is_superadmin || roles.contains(&self.role_name.as_str())
    }
}

/// Authenticate the request from its `Authorization: Bearer` header.
///
/// # Errors
///
/// Returns `Unauthorized` when the header is missing, the token is invalid or
/// expired, or no matching session exists.
pub async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    config: &AuthConfig,
) -> Result<Principal, ApiError> {
    let Some(raw_token) = utils::extract_bearer_token(headers) else {
        return Err(ApiError::Unauthorized);
    };

    // Signature and purpose first, so garbage never hits the database.
    token::verify(&raw_token, token::TokenPurpose::Session, config.jwt_secret())
        .map_err(|_| ApiError::Unauthorized)?;

    let token_hash = utils::hash_token(&raw_token);
    let record = storage::lookup_session_principal(pool, &token_hash)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Principal {
        account_id: record.account_id,
        email: record.email,
        role_name: record.role_name,
        permissions: record.permissions,
        is_superadmin: record.is_superadmin,
        token_hash,
    })
}

/// Require the caller to hold one of the named roles (superadmin passes).
///
/// # Errors
///
/// Returns `Forbidden` when the caller's role is not in the list.
pub fn require_role(principal: &Principal, roles: &[&str]) -> Result<(), ApiError> {
    if principal.has_role(roles) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Require a specific grant from the caller's permission map.
///
/// # Errors
///
/// Returns `Forbidden` when the grant is absent.
pub fn require_permission(
    principal: &Principal,
    feature: Feature,
    action: PermissionAction,
) -> Result<(), ApiError> {
    if principal.allows(feature, action) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::roles::permissions::{Feature, PermissionAction, PermissionMap};

    fn principal(role: &str, permissions: PermissionMap, is_superadmin: bool) -> Principal {
        Principal {
            account_id: uuid::Uuid::new_v4(),
            email: "user@example.com".to_string(),
            role_name: role.to_string(),
            permissions,
            is_superadmin,
            token_hash: vec![0; 32],
        }
    }

    #[test]
    fn superadmin_bypasses_permission_map() {
        let principal = principal("superadmin", PermissionMap::default(), true);
        assert!(principal.allows(Feature::Invoices, PermissionAction::Delete));
        assert!(principal.has_role(&["admin"]));
        assert!(require_role(&principal, &["admin"]).is_ok());
    }

    #[test]
    fn employee_limited_by_permission_map() {
        let principal = principal("employee", PermissionMap::employee(), false);
        assert!(principal.allows(Feature::Leads, PermissionAction::Create));
        assert!(!principal.allows(Feature::Settings, PermissionAction::Edit));
        assert!(require_permission(&principal, Feature::Settings, PermissionAction::Edit).is_err());
    }

    #[test]
    fn role_guard_matches_exact_names() {
        let principal = principal("admin", PermissionMap::full(), false);
        assert!(require_role(&principal, &["admin", "superadmin"]).is_ok());
        assert!(matches!(
            require_role(&principal, &["superadmin"]),
            Err(ApiError::Forbidden)
        ));
    }
}
