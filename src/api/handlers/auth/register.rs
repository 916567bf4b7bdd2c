//! Account registration.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::storage::{self, NewAccount, RegisterOutcome};
use super::types::{MessageResponse, RegisterRequest};
use super::{password, token, utils, AuthConfig};
use crate::api::error::ApiError;

/// Create a new account with the default employee role.
///
/// The account starts unverified; a verification link is queued for delivery.
/// No session token is issued until the user logs in.
#[utoipa::path(
    post,
    path = "/api/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = MessageResponse),
        (status = 400, description = "Validation failed or email already registered")
    ),
    tag = "users"
)]
pub async fn register(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Arc<AuthConfig>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::Validation(
            "First name and last name are required".to_string(),
        ));
    }

    let email = utils::normalize_email(&request.email);
    if !utils::valid_email(&email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    password::validate_password_strength(&request.password)
        .map_err(|message| ApiError::Validation(message.to_string()))?;

    let password_hash = password::hash_password(&request.password)
        .map_err(|err| ApiError::Internal(anyhow::anyhow!(err)))?;

    // The id is fixed up front so the verification token can name the account
    // before the row exists.
    let account_id = Uuid::new_v4();
    let verify_token = token::issue(
        account_id,
        token::TokenPurpose::Verify,
        config.verification_token_ttl_seconds(),
        config.jwt_secret(),
    )
    .map_err(|err| ApiError::Internal(anyhow::anyhow!(err)))?;
    let verify_token_hash = utils::hash_token(&verify_token);
    let verify_url = utils::build_verify_url(config.frontend_base_url(), &verify_token);

    let account = NewAccount {
        id: account_id,
        first_name,
        last_name,
        email: &email,
        password_hash: &password_hash,
        company: request.company.as_deref().map(str::trim),
        position: request.position.as_deref().map(str::trim),
        phone: request.phone.as_deref().map(str::trim),
    };

    match storage::register_account(
        &pool,
        &account,
        &verify_token_hash,
        config.verification_token_ttl_seconds(),
        &verify_url,
    )
    .await?
    {
        RegisterOutcome::Created => {
            info!(account_id = %account_id, "account registered");
            Ok((
                StatusCode::CREATED,
                Json(MessageResponse::new(
                    "Account created. Please check your email to verify your address.",
                )),
            ))
        }
        RegisterOutcome::Conflict => Err(ApiError::DuplicateEmail),
    }
}
