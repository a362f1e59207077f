//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::{Deserialize, Serialize};

use crate::domain::entity::{session_claims::SessionClaims, user::AuthenticatedIdentity};
use crate::domain::value_object::user_role::UserRole;

// ============================================================================
// Sign Up
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub user_id: UserId,
    /// Always true: the account is waiting for its verification code
    pub verification_required: bool,
}

// ============================================================================
// Sign In
// ============================================================================

/// Both fields optional so a missing one is a credential failure, not a 422
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user: AuthenticatedIdentity,
    pub expires_at: i64,
}

// ============================================================================
// Session Status
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub authenticated: bool,
    pub user: Option<SessionUser>,
    /// Unix seconds
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: UserId,
    pub name: Option<String>,
    pub email: String,
    pub role: UserRole,
    pub email_verified: Option<DateTime<Utc>>,
}

impl SessionStatusResponse {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user: None,
            expires_at: None,
        }
    }

    pub fn from_claims(claims: &SessionClaims) -> Self {
        Self {
            authenticated: true,
            user: Some(SessionUser {
                id: claims.sub,
                name: claims.name.clone(),
                email: claims.email.to_string(),
                role: claims.role,
                email_verified: claims
                    .email_verified
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            }),
            expires_at: Some(claims.exp),
        }
    }
}

// ============================================================================
// Email Verification
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub email: String,
}

// ============================================================================
// Password Reset
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

// ============================================================================
// OAuth
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Where a message-only endpoint leaves the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: &'static str,
}
