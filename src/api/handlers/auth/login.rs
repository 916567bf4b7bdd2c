//! Login and lockout handling.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use super::storage;
use super::types::{LoginRequest, LoginResponse, PublicAccount};
use super::{password, token, utils, AuthConfig};
use crate::api::error::ApiError;

/// Exchange credentials for a session token.
///
/// Failures are reported uniformly as invalid credentials; whether the email
/// exists is never revealed. Repeated failures lock the account for a
/// configurable window.
#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials or account locked")
    ),
    tag = "users"
)]
pub async fn login(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = utils::normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let Some(credentials) = storage::find_credentials(&pool, &email).await? else {
        // Burn the same argon2 work as a mismatch so timing stays uniform.
        password::dummy_verify(&request.password);
        return Err(ApiError::InvalidCredentials);
    };

    if !credentials.is_active {
        return Err(ApiError::InvalidCredentials);
    }

    if credentials
        .locked_until
        .is_some_and(|until| until > Utc::now())
    {
        return Err(ApiError::AccountLocked);
    }

    if password::verify_password(&request.password, &credentials.password_hash).is_err() {
        let locked = storage::record_login_failure(
            &pool,
            credentials.id,
            config.lockout_threshold(),
            config.lockout_seconds(),
        )
        .await?;
        if locked {
            warn!(account_id = %credentials.id, "account locked after repeated failures");
            return Err(ApiError::AccountLocked);
        }
        return Err(ApiError::InvalidCredentials);
    }

    storage::record_login_success(&pool, credentials.id).await?;

    let session_token = token::issue(
        credentials.id,
        token::TokenPurpose::Session,
        config.session_ttl_seconds(),
        config.jwt_secret(),
    )
    .map_err(|err| ApiError::Internal(anyhow::anyhow!(err)))?;

    storage::insert_session(
        &pool,
        credentials.id,
        &utils::hash_token(&session_token),
        &utils::device_label(&headers),
        config.session_ttl_seconds(),
    )
    .await?;

    let profile = storage::fetch_profile(&pool, credentials.id)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    info!(account_id = %credentials.id, "login succeeded");

    Ok(Json(LoginResponse {
        success: true,
        token: session_token,
        user: PublicAccount::from(profile),
    }))
}
