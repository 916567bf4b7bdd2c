//! Profile and preference endpoints for the authenticated account.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;

use super::auth::{require_auth, AuthConfig};
use crate::api::error::ApiError;
use crate::api::handlers::auth::storage;
use crate::api::handlers::auth::types::{
    MessageResponse, PublicAccount, UpdatePreferencesRequest, UpdateProfileRequest,
};

/// Return the authenticated account's profile.
#[utoipa::path(
    get,
    path = "/api/users/me",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current account", body = PublicAccount),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
pub async fn get_me(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let profile = storage::fetch_profile(&pool, principal.account_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(PublicAccount::from(profile)))
}

/// Update profile fields; omitted fields are left unchanged. Email and role
/// are not editable here.
#[utoipa::path(
    put,
    path = "/api/users/me",
    request_body = UpdateProfileRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated account", body = PublicAccount),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
pub async fn update_me(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdateProfileRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let first_name = request.first_name.as_deref().map(str::trim);
    let last_name = request.last_name.as_deref().map(str::trim);
    if first_name.is_some_and(str::is_empty) || last_name.is_some_and(str::is_empty) {
        return Err(ApiError::Validation("Name fields cannot be empty".to_string()));
    }

    storage::update_profile(
        &pool,
        principal.account_id,
        first_name,
        last_name,
        request.company.as_deref().map(str::trim),
        request.position.as_deref().map(str::trim),
        request.phone.as_deref().map(str::trim),
    )
    .await?;

    let profile = storage::fetch_profile(&pool, principal.account_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(PublicAccount::from(profile)))
}

/// Update UI and notification preferences.
#[utoipa::path(
    put,
    path = "/api/users/preferences",
    request_body = UpdatePreferencesRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Preferences updated", body = MessageResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
pub async fn update_preferences(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<UpdatePreferencesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    if let Some(theme) = request.theme.as_deref() {
        if !matches!(theme, "light" | "dark" | "system") {
            return Err(ApiError::Validation(
                "Theme must be one of: light, dark, system".to_string(),
            ));
        }
    }

    storage::update_preferences(
        &pool,
        principal.account_id,
        request.theme.as_deref(),
        request.notify_email,
        request.notify_push,
        request.timezone.as_deref().map(str::trim),
    )
    .await?;

    Ok(Json(MessageResponse::new("Preferences updated")))
}
