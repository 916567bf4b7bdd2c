//! Request and response bodies for the auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::storage::AccountProfile;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub company: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    /// Bearer token for subsequent requests.
    pub token: String,
    pub user: PublicAccount,
}

/// Account fields safe to return to the account holder.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub company: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub is_email_verified: bool,
    pub theme: String,
    pub notify_email: bool,
    pub notify_push: bool,
    pub timezone: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<AccountProfile> for PublicAccount {
    fn from(profile: AccountProfile) -> Self {
        Self {
            id: profile.id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            role: profile.role_name,
            company: profile.company,
            position: profile.position,
            phone: profile.phone,
            is_email_verified: profile.is_email_verified,
            theme: profile.theme,
            notify_email: profile.notify_email,
            notify_push: profile.notify_push,
            timezone: profile.timezone,
            last_login_at: profile.last_login_at,
            created_at: profile.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    pub theme: Option<String>,
    pub notify_email: Option<bool>,
    pub notify_push: Option<bool>,
    pub timezone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_response_serializes_envelope() {
        let body = serde_json::to_value(MessageResponse::new("done")).expect("serialize");
        assert_eq!(body["success"], serde_json::json!(true));
        assert_eq!(body["message"], serde_json::json!("done"));
    }

    #[test]
    fn register_request_accepts_optional_fields() {
        let request: RegisterRequest = serde_json::from_str(
            r#"{"firstName":"Ada","lastName":"Lovelace","email":"ada@example.com","password":"Password1"}"#,
        )
        .expect("deserialize");
        assert_eq!(request.first_name, "Ada");
        assert!(request.company.is_none());
    }

    #[test]
    fn change_password_request_uses_camel_case_keys() {
        let request: ChangePasswordRequest = serde_json::from_str(
            r#"{"currentPassword":"Password1","newPassword":"Password2"}"#,
        )
        .expect("deserialize");
        assert_eq!(request.current_password, "Password1");
        assert_eq!(request.new_password, "Password2");
    }

    #[test]
    fn public_account_serializes_camel_case_keys() {
        let account = PublicAccount {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            role: "employee".to_string(),
            company: None,
            position: None,
            phone: None,
            is_email_verified: true,
            theme: "light".to_string(),
            notify_email: true,
            notify_push: false,
            timezone: "UTC".to_string(),
            last_login_at: None,
            created_at: Utc::now(),
        };

        let body = serde_json::to_value(&account).expect("serialize");
        assert_eq!(body["firstName"], serde_json::json!("Ada"));
        assert_eq!(body["isEmailVerified"], serde_json::json!(true));
        assert_eq!(body["notifyEmail"], serde_json::json!(true));
        assert_eq!(body["id"], serde_json::json!(account.id));
        assert!(body.get("first_name").is_none());
    }
}
