//! Session revocation endpoints.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::principal::require_auth;
use super::storage;
use super::types::MessageResponse;
use super::AuthConfig;
use crate::api::error::ApiError;

/// Revoke the presented session. The token stops working immediately even
/// though its signature remains valid until expiry.
#[utoipa::path(
    post,
    path = "/api/users/logout",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Session revoked", body = MessageResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
pub async fn logout(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    storage::delete_session(&pool, &principal.token_hash).await?;

    info!(account_id = %principal.account_id, "session revoked");

    Ok(Json(MessageResponse::new("Logged out")))
}

/// Revoke every session of the authenticated account, including this one.
#[utoipa::path(
    post,
    path = "/api/users/logout-all",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All sessions revoked", body = MessageResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
pub async fn logout_all(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let revoked = storage::delete_all_sessions(&pool, principal.account_id).await?;

    info!(account_id = %principal.account_id, revoked, "all sessions revoked");

    Ok(Json(MessageResponse::new(format!(
        "Logged out of {revoked} session(s)"
    ))))
}
