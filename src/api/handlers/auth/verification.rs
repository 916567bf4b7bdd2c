//! Email verification endpoint.

use axum::{extract::Extension, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::storage;
use super::types::{MessageResponse, VerifyEmailRequest};
use super::{token, utils, AuthConfig};
use crate::api::error::ApiError;

/// Consume a verification token and mark the address verified.
///
/// The token is single-use: the stored digest is cleared in the same
/// statement that flips the flag, so replaying the link fails.
#[utoipa::path(
    post,
    path = "/api/users/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token")
    ),
    tag = "users"
)]
pub async fn verify_email(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let raw_token = request.token.trim();
    if raw_token.is_empty() {
        return Err(ApiError::Validation("Missing token".to_string()));
    }

    let claims = token::verify(raw_token, token::TokenPurpose::Verify, config.jwt_secret())
        .map_err(|_| ApiError::InvalidOrExpired)?;
    let account_id = claims.account_id().map_err(|_| ApiError::InvalidOrExpired)?;

    let consumed =
        storage::consume_verification_token(&pool, account_id, &utils::hash_token(raw_token))
            .await?;
    if !consumed {
        return Err(ApiError::InvalidOrExpired);
    }

    info!(account_id = %account_id, "email verified");

    Ok(Json(MessageResponse::new("Email verified successfully")))
}
