//! Password Reset Use Case
//!
//! Request: email a one-hour token to an account that has a password.
//! Reset: exchange a live token for a new password hash.
//!
//! A newer request overwrites the stored digest, so only the latest link works.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::config::IdentityConfig;
use crate::domain::mailer::EmailSender;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    email::Email,
    reset_token::ResetToken,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

pub struct PasswordResetUseCase<U, M>
where
    U: UserRepository,
    M: EmailSender,
{
    user_repo: Arc<U>,
    mailer: Arc<M>,
    config: Arc<IdentityConfig>,
}

impl<U, M> PasswordResetUseCase<U, M>
where
    U: UserRepository,
    M: EmailSender,
{
    pub fn new(user_repo: Arc<U>, mailer: Arc<M>, config: Arc<IdentityConfig>) -> Self {
        Self {
            user_repo,
            mailer,
            config,
        }
    }

    pub async fn request(&self, email: &str) -> AuthResult<()> {
        self.request_at(email, Utc::now()).await
    }

    /// Always `Ok` for well-formed input, whether or not the account exists
    pub async fn request_at(&self, email: &str, now: DateTime<Utc>) -> AuthResult<()> {
        let email = Email::new(email)?;

        let Some(user) = self.user_repo.find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };
        if !user.has_password() {
            tracing::debug!(user_id = %user.user_id, "Password reset requested for provider-only account");
            return Ok(());
        }

        let token = ResetToken::generate();
        let expires_at = now + self.config.reset_token_ttl();
        self.user_repo
            .store_reset_token(&user.user_id, &token.digest(), expires_at, now)
            .await?;

        tracing::info!(user_id = %user.user_id, "Password reset token issued");

        if let Err(e) = self
            .mailer
            .send_password_reset_email(&user.email, user.name.as_deref(), &token)
            .await
        {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to send password reset email");
        }

        Ok(())
    }

    pub async fn reset(&self, token: &str, new_password: String) -> AuthResult<()> {
        self.reset_at(token, new_password, Utc::now()).await
    }

    pub async fn reset_at(
        &self,
        token: &str,
        new_password: String,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        let token = ResetToken::from_submitted(token);
        if token.as_str().is_empty() {
            return Err(AuthError::InvalidOrExpiredResetToken);
        }

        let raw = RawPassword::new(new_password)?;
        let password_hash = UserPassword::from_raw(&raw, self.config.pepper())?;

        let user_id = self
            .user_repo
            .consume_reset_token(&token.digest(), &password_hash, now)
            .await?
            .ok_or(AuthError::InvalidOrExpiredResetToken)?;

        tracing::info!(user_id = %user_id, "Password reset completed");
        Ok(())
    }
}
