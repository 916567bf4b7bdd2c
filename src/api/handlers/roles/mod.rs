//! Role management endpoints.
//!
//! Writes require the superadmin role; reads are open to admin and
//! superadmin. The database enforces at most one active superadmin role, so
//! an attempt to create a second fails with a conflict rather than a race.

pub(crate) mod permissions;
pub(crate) mod storage;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use self::permissions::PermissionMap;
use self::storage::{RoleMember, RoleRecord, WriteOutcome};
use super::auth::types::MessageResponse;
use super::auth::{require_auth, require_role, AuthConfig};
use crate::api::error::ApiError;

pub use self::storage::seed_default_roles;

const READ_ROLES: &[&str] = &["admin", "superadmin"];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to all-denied when omitted.
    pub permissions: Option<PermissionMap>,
    pub subscription_tier: Option<String>,
    #[serde(default)]
    pub is_superadmin: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub subscription_tier: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: PermissionMap,
    pub subscription_tier: String,
    pub is_superadmin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoleRecord> for RoleResponse {
    fn from(record: RoleRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            permissions: record.permissions,
            subscription_tier: record.subscription_tier,
            is_superadmin: record.is_superadmin,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleMemberResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
}

impl From<RoleMember> for RoleMemberResponse {
    fn from(member: RoleMember) -> Self {
        Self {
            id: member.id,
            first_name: member.first_name,
            last_name: member.last_name,
            email: member.email,
            is_active: member.is_active,
        }
    }
}

fn validate_role_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Role name is required".to_string()));
    }
    Ok(name)
}

/// Create a role.
#[utoipa::path(
    post,
    path = "/api/roles",
    request_body = CreateRoleRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 400, description = "Name taken or active superadmin exists"),
        (status = 403, description = "Requires superadmin")
    ),
    tag = "roles"
)]
pub async fn create_role(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<CreateRoleRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_role(&principal, &["superadmin"])?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let name = validate_role_name(&request.name)?;

    let record = storage::create_role(
        &pool,
        name,
        request.description.as_deref(),
        &request.permissions.unwrap_or_default(),
        request.subscription_tier.as_deref().unwrap_or("basic"),
        request.is_superadmin,
    )
    .await?
    .ok_or_else(|| {
        ApiError::DuplicateResource(
            "Role name is taken or an active superadmin role already exists".to_string(),
        )
    })?;

    info!(role = %record.name, "role created");

    Ok((StatusCode::CREATED, Json(RoleResponse::from(record))))
}

/// List all roles.
#[utoipa::path(
    get,
    path = "/api/roles",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Roles", body = [RoleResponse]),
        (status = 403, description = "Requires admin or superadmin")
    ),
    tag = "roles"
)]
pub async fn list_roles(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_role(&principal, READ_ROLES)?;

    let roles = storage::list_roles(&pool).await?;

    Ok(Json(
        roles
            .into_iter()
            .map(RoleResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Fetch a single role.
#[utoipa::path(
    get,
    path = "/api/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Role", body = RoleResponse),
        (status = 404, description = "Role not found")
    ),
    tag = "roles"
)]
pub async fn get_role(
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_role(&principal, READ_ROLES)?;

    let record = storage::fetch_role(&pool, role_id)
        .await?
        .ok_or(ApiError::NotFound("Role"))?;

    Ok(Json(RoleResponse::from(record)))
}

/// Update role metadata. Permissions have their own endpoint.
#[utoipa::path(
    put,
    path = "/api/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated role", body = RoleResponse),
        (status = 400, description = "Name taken"),
        (status = 404, description = "Role not found")
    ),
    tag = "roles"
)]
pub async fn update_role(
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdateRoleRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_role(&principal, &["superadmin"])?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let name = request
        .name
        .as_deref()
        .map(validate_role_name)
        .transpose()?;

    match storage::update_role(
        &pool,
        role_id,
        name,
        request.description.as_deref(),
        request.subscription_tier.as_deref(),
        request.is_active,
    )
    .await?
    {
        Some(WriteOutcome::Done) => {}
        Some(WriteOutcome::Conflict) => {
            return Err(ApiError::DuplicateResource(
                "Role name is already taken".to_string(),
            ))
        }
        None => return Err(ApiError::NotFound("Role")),
    }

    let record = storage::fetch_role(&pool, role_id)
        .await?
        .ok_or(ApiError::NotFound("Role"))?;

    Ok(Json(RoleResponse::from(record)))
}

/// Replace a role's permission map.
#[utoipa::path(
    put,
    path = "/api/roles/{id}/permissions",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = PermissionMap,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Permissions updated", body = RoleResponse),
        (status = 404, description = "Role not found")
    ),
    tag = "roles"
)]
pub async fn update_role_permissions(
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<PermissionMap>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_role(&principal, &["superadmin"])?;

    let Some(Json(permissions)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    if !storage::update_role_permissions(&pool, role_id, &permissions).await? {
        return Err(ApiError::NotFound("Role"));
    }

    let record = storage::fetch_role(&pool, role_id)
        .await?
        .ok_or(ApiError::NotFound("Role"))?;

    info!(role = %record.name, "role permissions updated");

    Ok(Json(RoleResponse::from(record)))
}

/// Deactivate a role. Refused while accounts still hold it, and the
/// superadmin role can never be deactivated.
#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Role deactivated", body = MessageResponse),
        (status = 400, description = "Role still assigned"),
        (status = 404, description = "Role not found")
    ),
    tag = "roles"
)]
pub async fn delete_role(
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_role(&principal, &["superadmin"])?;

    let members = storage::count_role_members(&pool, role_id).await?;
    if members > 0 {
        return Err(ApiError::Validation(format!(
            "Role is still assigned to {members} user(s)"
        )));
    }

    if !storage::deactivate_role(&pool, role_id).await? {
        return Err(ApiError::NotFound("Role"));
    }

    info!(%role_id, "role deactivated");

    Ok(Json(MessageResponse::new("Role deactivated")))
}

/// Assign a role to a user.
#[utoipa::path(
    post,
    path = "/api/roles/{id}/assign",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = AssignRoleRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Role assigned", body = MessageResponse),
        (status = 404, description = "Role or user not found")
    ),
    tag = "roles"
)]
pub async fn assign_role(
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<AssignRoleRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_role(&principal, &["superadmin"])?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    if !storage::assign_role(&pool, role_id, request.user_id).await? {
        return Err(ApiError::NotFound("Role or user"));
    }

    info!(%role_id, user_id = %request.user_id, "role assigned");

    Ok(Json(MessageResponse::new("Role assigned")))
}

/// List the users holding a role.
#[utoipa::path(
    get,
    path = "/api/roles/{id}/users",
    params(("id" = Uuid, Path, description = "Role id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Users with the role", body = [RoleMemberResponse]),
        (status = 404, description = "Role not found")
    ),
    tag = "roles"
)]
pub async fn list_role_users(
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;
    require_role(&principal, READ_ROLES)?;

    if storage::fetch_role(&pool, role_id).await?.is_none() {
        return Err(ApiError::NotFound("Role"));
    }

    let members = storage::list_role_members(&pool, role_id).await?;

    Ok(Json(
        members
            .into_iter()
            .map(RoleMemberResponse::from)
            .collect::<Vec<_>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_name_rules() {
        assert!(validate_role_name("support").is_ok());
        assert!(validate_role_name("  support  ").is_ok());
        assert!(validate_role_name("").is_err());
    }

    #[test]
    fn assign_request_uses_camel_case_keys() {
        let user_id = Uuid::new_v4();
        let request: AssignRoleRequest =
            serde_json::from_str(&format!(r#"{{"userId":"{user_id}"}}"#)).expect("deserialize");
        assert_eq!(request.user_id, user_id);
    }

    #[test]
    fn role_response_serializes_camel_case_keys() {
        let response = RoleResponse {
            id: Uuid::new_v4(),
            name: "support".to_string(),
            description: None,
            permissions: PermissionMap::default(),
            subscription_tier: "basic".to_string(),
            is_superadmin: false,
            is_active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let body = serde_json::to_value(&response).expect("serialize");
        assert_eq!(body["subscriptionTier"], serde_json::json!("basic"));
        assert_eq!(body["isSuperadmin"], serde_json::json!(false));
        assert!(body.get("is_active").is_none());
    }
}
