//! User Entity
//!
//! One row per email address. Credential accounts carry a password hash and
//! start unverified; OAuth-only accounts have no hash and are verified at
//! creation.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::Serialize;

use crate::domain::value_object::{
    email::Email, user_password::UserPassword, user_role::UserRole,
    verification_code::VerificationCode,
};

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    /// Unique, normalized
    pub email: Email,
    pub name: Option<String>,
    pub image: Option<String>,
    /// Absent for OAuth-only accounts
    pub password_hash: Option<UserPassword>,
    pub email_verified: Option<DateTime<Utc>>,
    /// Pending six-digit code, cleared when consumed
    pub verification_token: Option<String>,
    /// SHA-256 digest of the outstanding reset token
    pub reset_token_digest: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub user_role: UserRole,
    /// Set once the welcome email has been claimed
    pub welcome_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New email + password account, awaiting verification
    pub fn new_with_password(
        email: Email,
        name: Option<String>,
        password_hash: UserPassword,
        code: &VerificationCode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: UserId::new(),
            email,
            name,
            image: None,
            password_hash: Some(password_hash),
            email_verified: None,
            verification_token: Some(code.as_str().to_string()),
            reset_token_digest: None,
            reset_token_expiry: None,
            user_role: UserRole::default(),
            welcome_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// New account created from an identity provider profile; the provider
    /// has already confirmed the address
    pub fn new_from_provider(
        email: Email,
        name: Option<String>,
        image: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: UserId::new(),
            email,
            name,
            image,
            password_hash: None,
            email_verified: Some(now),
            verification_token: None,
            reset_token_digest: None,
            reset_token_expiry: None,
            user_role: UserRole::default(),
            welcome_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified.is_some()
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// What the rest of the site gets to know about a signed-in user
    pub fn identity(&self) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            user_id: self.user_id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.user_role,
            email_verified: self.email_verified,
        }
    }
}

/// Result of a successful credential or provider sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedIdentity {
    #[serde(rename = "id")]
    pub user_id: UserId,
    pub email: Email,
    pub name: Option<String>,
    pub role: UserRole,
    pub email_verified: Option<DateTime<Utc>>,
}
