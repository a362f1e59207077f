//! Identity Error Types
//!
//! Identity-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Identity-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email, missing password hash or wrong password. All three look the same.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Correct password, but the email address was never confirmed
    #[error("Email address not verified")]
    EmailNotVerified,

    /// No session token, or one whose signature does not verify
    #[error("Session token missing or expired")]
    TokenExpiredOrMissing,

    #[error("Insufficient role")]
    InsufficientRole,

    /// Refresh found no user behind the token; the old token stays in use
    #[error("User behind session token no longer exists")]
    StaleRefreshTargetMissing,

    #[error("Email address already registered")]
    EmailTaken,

    #[error("Invalid verification code")]
    InvalidVerificationCode,

    #[error("Invalid or expired token")]
    InvalidOrExpiredResetToken,

    /// Provider email matches an account that signs in with a password
    #[error("Account exists with a different sign-in method")]
    OAuthAccountNotLinked,

    #[error("Identity provider error: {0}")]
    OAuthProvider(String),

    #[error("Unknown identity provider: {0}")]
    UnknownProvider(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Password validation failed: {0}")]
    PasswordValidation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::TokenExpiredOrMissing => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::EmailNotVerified | AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::EmailTaken | AuthError::OAuthAccountNotLinked => StatusCode::CONFLICT,
            AuthError::InvalidVerificationCode
            | AuthError::InvalidOrExpiredResetToken
            | AuthError::Validation(_)
            | AuthError::PasswordValidation(_) => StatusCode::BAD_REQUEST,
            AuthError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            AuthError::OAuthProvider(_) => StatusCode::BAD_GATEWAY,
            AuthError::StaleRefreshTargetMissing
            | AuthError::Database(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials | AuthError::TokenExpiredOrMissing => {
                ErrorKind::Unauthorized
            }
            AuthError::EmailNotVerified | AuthError::InsufficientRole => ErrorKind::Forbidden,
            AuthError::EmailTaken | AuthError::OAuthAccountNotLinked => ErrorKind::Conflict,
            AuthError::InvalidVerificationCode
            | AuthError::InvalidOrExpiredResetToken
            | AuthError::Validation(_)
            | AuthError::PasswordValidation(_) => ErrorKind::BadRequest,
            AuthError::UnknownProvider(_) => ErrorKind::NotFound,
            AuthError::OAuthProvider(_) => ErrorKind::BadGateway,
            AuthError::StaleRefreshTargetMissing
            | AuthError::Database(_)
            | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Stable machine-readable code the front end branches on
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AuthError::TokenExpiredOrMissing => "TOKEN_EXPIRED_OR_MISSING",
            AuthError::InsufficientRole => "INSUFFICIENT_ROLE",
            AuthError::StaleRefreshTargetMissing => "STALE_REFRESH_TARGET_MISSING",
            AuthError::EmailTaken => "EMAIL_TAKEN",
            AuthError::InvalidVerificationCode => "INVALID_VERIFICATION_CODE",
            AuthError::InvalidOrExpiredResetToken => "INVALID_OR_EXPIRED_RESET_TOKEN",
            AuthError::OAuthAccountNotLinked => "OAUTH_ACCOUNT_NOT_LINKED",
            AuthError::OAuthProvider(_) => "OAUTH_PROVIDER_ERROR",
            AuthError::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            AuthError::Validation(_) => "VALIDATION_FAILED",
            AuthError::PasswordValidation(_) => "PASSWORD_VALIDATION_FAILED",
            AuthError::Database(_) | AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to AppError
    ///
    /// Server-side details (SQL errors, provider responses) never reach the body.
    pub fn to_app_error(&self) -> AppError {
        let message = match self {
            AuthError::Database(_) | AuthError::Internal(_) | AuthError::StaleRefreshTargetMissing => {
                "Internal server error".to_string()
            }
            AuthError::OAuthProvider(_) => "Sign-in with the identity provider failed".to_string(),
            other => other.to_string(),
        };

        let err = AppError::new(self.kind(), message).with_code(self.code());
        match self {
            AuthError::EmailNotVerified => {
                err.with_action("Enter the verification code sent to your email")
            }
            AuthError::OAuthAccountNotLinked => {
                err.with_action("Sign in with your email and password")
            }
            AuthError::InvalidOrExpiredResetToken => {
                err.with_action("Request a new password reset link")
            }
            _ => err,
        }
    }

    /// Log the error with appropriate level
    pub(crate) fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Identity database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Identity internal error");
            }
            AuthError::OAuthProvider(msg) => {
                tracing::warn!(message = %msg, "Identity provider failure");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid sign-in attempt");
            }
            AuthError::StaleRefreshTargetMissing => {
                tracing::warn!("Session refresh target missing");
            }
            _ => {
                tracing::debug!(error = %self, "Identity error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        match err.kind() {
            ErrorKind::BadRequest | ErrorKind::UnprocessableEntity => {
                AuthError::Validation(err.message().to_string())
            }
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<platform::token::TokenError> for AuthError {
    fn from(err: platform::token::TokenError) -> Self {
        AuthError::Internal(format!("session token: {err}"))
    }
}
