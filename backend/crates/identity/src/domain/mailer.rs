//! Outbound email port
//!
//! Callers log and swallow [`MailError`]: a lost email never undoes the
//! account change that triggered it.

use thiserror::Error;

use crate::domain::value_object::{
    email::Email, reset_token::ResetToken, verification_code::VerificationCode,
};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail transport failed: {0}")]
    Transport(String),

    #[error("Mail API rejected message with status {0}")]
    Rejected(u16),
}

#[trait_variant::make(EmailSender: Send)]
pub trait LocalEmailSender {
    async fn send_verification_email(
        &self,
        to: &Email,
        name: Option<&str>,
        code: &VerificationCode,
    ) -> Result<(), MailError>;

    async fn send_welcome_email(&self, to: &Email, name: Option<&str>) -> Result<(), MailError>;

    async fn send_password_reset_email(
        &self,
        to: &Email,
        name: Option<&str>,
        token: &ResetToken,
    ) -> Result<(), MailError>;
}
