//! Email Verification Use Case

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::entity::user::User;
use crate::domain::mailer::EmailSender;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{email::Email, verification_code::VerificationCode};
use crate::error::{AuthError, AuthResult};

pub struct VerifyEmailUseCase<U, M>
where
    U: UserRepository,
    M: EmailSender,
{
    user_repo: Arc<U>,
    mailer: Arc<M>,
}

impl<U, M> VerifyEmailUseCase<U, M>
where
    U: UserRepository,
    M: EmailSender,
{
    pub fn new(user_repo: Arc<U>, mailer: Arc<M>) -> Self {
        Self { user_repo, mailer }
    }

    pub async fn verify(&self, email: &str, code: &str) -> AuthResult<()> {
        self.verify_at(email, code, Utc::now()).await
    }

    /// Consume the code. A second attempt with the same code fails because the
    /// first one cleared it.
    pub async fn verify_at(&self, email: &str, code: &str, now: DateTime<Utc>) -> AuthResult<()> {
        let email = Email::new(email).map_err(|_| AuthError::InvalidVerificationCode)?;
        let code = VerificationCode::parse(code).ok_or(AuthError::InvalidVerificationCode)?;

        let user = self
            .user_repo
            .consume_verification(&email, code.as_str(), now)
            .await?
            .ok_or(AuthError::InvalidVerificationCode)?;

        tracing::info!(user_id = %user.user_id, "Email verified");

        send_welcome_once(self.user_repo.as_ref(), self.mailer.as_ref(), &user, now).await
    }

    pub async fn resend(&self, email: &str) -> AuthResult<()> {
        self.resend_at(email, Utc::now()).await
    }

    /// Issue a fresh code. Silent for unknown or already verified addresses.
    pub async fn resend_at(&self, email: &str, now: DateTime<Utc>) -> AuthResult<()> {
        let Ok(email) = Email::new(email) else {
            return Ok(());
        };
        let Some(user) = self.user_repo.find_by_email(&email).await? else {
            return Ok(());
        };
        if user.is_email_verified() {
            return Ok(());
        }

        let code = VerificationCode::generate();
        if !self
            .user_repo
            .replace_verification_token(&user.user_id, code.as_str(), now)
            .await?
        {
            // Verified in the meantime
            return Ok(());
        }

        if let Err(e) = self
            .mailer
            .send_verification_email(&user.email, user.name.as_deref(), &code)
            .await
        {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to resend verification email");
        }

        Ok(())
    }
}

/// Send the welcome email if this call wins the one-time claim
pub(crate) async fn send_welcome_once<U, M>(
    user_repo: &U,
    mailer: &M,
    user: &User,
    now: DateTime<Utc>,
) -> AuthResult<()>
where
    U: UserRepository,
    M: EmailSender,
{
    if !user_repo.claim_welcome(&user.user_id, now).await? {
        return Ok(());
    }

    if let Err(e) = mailer
        .send_welcome_email(&user.email, user.name.as_deref())
        .await
    {
        tracing::warn!(user_id = %user.user_id, error = %e, "Failed to send welcome email");
    }

    Ok(())
}
