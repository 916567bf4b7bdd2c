//! Password reset and change endpoints.

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::principal::require_auth;
use super::storage;
use super::types::{
    ChangePasswordRequest, ForgotPasswordRequest, MessageResponse, ResetPasswordRequest,
};
use super::{password, token, utils, AuthConfig};
use crate::api::error::ApiError;

/// Request a password reset link.
///
/// The response is identical whether or not the email is registered.
#[utoipa::path(
    post,
    path = "/api/users/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link queued if the account exists", body = MessageResponse)
    ),
    tag = "users"
)]
pub async fn forgot_password(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = utils::normalize_email(&request.email);
    if utils::valid_email(&email) {
        if let Some(credentials) = storage::find_credentials(&pool, &email).await? {
            let reset_token = token::issue(
                credentials.id,
                token::TokenPurpose::Reset,
                config.reset_token_ttl_seconds(),
                config.jwt_secret(),
            )
            .map_err(|err| ApiError::Internal(anyhow::anyhow!(err)))?;

            let stored = storage::set_reset_token(
                &pool,
                &email,
                &utils::hash_token(&reset_token),
                config.reset_token_ttl_seconds(),
                &utils::build_reset_url(config.frontend_base_url(), &reset_token),
            )
            .await?;
            if stored {
                info!(account_id = %credentials.id, "password reset requested");
            }
        }
    }

    // Uniform response regardless of outcome.
    Ok(Json(MessageResponse::new(
        "If an account exists for that email, a reset link has been sent",
    )))
}

/// Consume a reset token and set a new password.
///
/// All sessions are revoked so a stolen token cannot outlive the reset.
#[utoipa::path(
    put,
    path = "/api/users/reset-password/{token}",
    params(("token" = String, Path, description = "Reset token from the emailed link")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token")
    ),
    tag = "users"
)]
pub async fn reset_password(
    Path(raw_token): Path<String>,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    password::validate_password_strength(&request.password)
        .map_err(|message| ApiError::Validation(message.to_string()))?;

    let claims = token::verify(&raw_token, token::TokenPurpose::Reset, config.jwt_secret())
        .map_err(|_| ApiError::InvalidOrExpired)?;
    let account_id = claims.account_id().map_err(|_| ApiError::InvalidOrExpired)?;

    let new_password_hash = password::hash_password(&request.password)
        .map_err(|err| ApiError::Internal(anyhow::anyhow!(err)))?;

    let consumed = storage::consume_reset_token(
        &pool,
        account_id,
        &utils::hash_token(&raw_token),
        &new_password_hash,
    )
    .await?;
    if !consumed {
        return Err(ApiError::InvalidOrExpired);
    }

    storage::delete_all_sessions(&pool, account_id).await?;

    info!(account_id = %account_id, "password reset completed");

    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// Change the password of the authenticated account.
#[utoipa::path(
    put,
    path = "/api/users/change-password",
    request_body = ChangePasswordRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password incorrect or not authenticated")
    ),
    tag = "users"
)]
pub async fn change_password(
    headers: HeaderMap,
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &pool, &config).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    password::validate_password_strength(&request.new_password)
        .map_err(|message| ApiError::Validation(message.to_string()))?;

    let current_hash = storage::fetch_password_hash(&pool, principal.account_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if password::verify_password(&request.current_password, &current_hash).is_err() {
        return Err(ApiError::InvalidCredentials);
    }

    let new_password_hash = password::hash_password(&request.new_password)
        .map_err(|err| ApiError::Internal(anyhow::anyhow!(err)))?;
    storage::update_password(&pool, principal.account_id, &new_password_hash).await?;

    info!(account_id = %principal.account_id, "password changed");

    Ok(Json(MessageResponse::new("Password changed successfully")))
}
