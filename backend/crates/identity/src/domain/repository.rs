//! Repository Traits
//!
//! Persistence ports. Every state transition that must happen at most once
//! (consuming a code or reset token, claiming the welcome email) is a single
//! conditional write that reports whether it matched, never read-then-write.

use chrono::{DateTime, Utc};
use kernel::id::UserId;

use crate::domain::entity::{linked_account::LinkedAccount, user::User};
use crate::domain::value_object::{email::Email, user_password::UserPassword};
use crate::error::AuthResult;

#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Insert a new user; `AuthError::EmailTaken` on a duplicate email
    async fn create(&self, user: &User) -> AuthResult<()>;

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    /// Set `email_verified = now` if unset and clear any pending code. An
    /// existing verification time is kept. Returns whether a row changed.
    async fn mark_email_verified(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<bool>;

    /// Consume a verification code: matches only an unverified user with this
    /// email and exactly this code. Returns the updated user on a match.
    async fn consume_verification(
        &self,
        email: &Email,
        code: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<User>>;

    /// Swap the pending code of a still-unverified user
    async fn replace_verification_token(
        &self,
        user_id: &UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Store a reset token digest; overwrites any earlier one
    async fn store_reset_token(
        &self,
        user_id: &UserId,
        digest: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<()>;

    /// Set the new hash and clear the token, only while `expiry > now`.
    /// Returns the owner on a match.
    async fn consume_reset_token(
        &self,
        digest: &str,
        new_password: &UserPassword,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<UserId>>;

    /// `true` exactly once per user
    async fn claim_welcome(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<bool>;
}

#[trait_variant::make(OAuthAccountRepository: Send)]
pub trait LocalOAuthAccountRepository {
    /// User owning `(provider, provider_account_id)`
    async fn find_by_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AuthResult<Option<User>>;

    /// Attach a provider identity to an existing user; no-op if already linked
    async fn link_account(&self, account: &LinkedAccount) -> AuthResult<()>;

    /// Create a user together with its first linked account, atomically
    async fn create_with_account(&self, user: &User, account: &LinkedAccount) -> AuthResult<()>;
}
