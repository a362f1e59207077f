//! Mail transport picked at startup

use identity::domain::mailer::{EmailSender, MailError};
use identity::domain::value_object::{
    email::Email, reset_token::ResetToken, verification_code::VerificationCode,
};
use identity::mail::{HttpMailer, LogMailer};

pub enum SiteMailer {
    /// Writes messages to the log (local development)
    Log(LogMailer),
    Http(HttpMailer),
}

impl EmailSender for SiteMailer {
    async fn send_verification_email(
        &self,
        to: &Email,
        name: Option<&str>,
        code: &VerificationCode,
    ) -> Result<(), MailError> {
        match self {
            SiteMailer::Log(m) => m.send_verification_email(to, name, code).await,
            SiteMailer::Http(m) => m.send_verification_email(to, name, code).await,
        }
    }

    async fn send_welcome_email(&self, to: &Email, name: Option<&str>) -> Result<(), MailError> {
        match self {
            SiteMailer::Log(m) => m.send_welcome_email(to, name).await,
            SiteMailer::Http(m) => m.send_welcome_email(to, name).await,
        }
    }

    async fn send_password_reset_email(
        &self,
        to: &Email,
        name: Option<&str>,
        token: &ResetToken,
    ) -> Result<(), MailError> {
        match self {
            SiteMailer::Log(m) => m.send_password_reset_email(to, name, token).await,
            SiteMailer::Http(m) => m.send_password_reset_email(to, name, token).await,
        }
    }
}
