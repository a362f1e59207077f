//! Email sender implementations
//!
//! - [`LogMailer`]: writes the message to the log (local runs)
//! - [`HttpMailer`]: JSON transactional-email API (`api-key` header,
//!   sender/to/subject/textContent body)

use serde::Serialize;

use crate::domain::mailer::{EmailSender, MailError};
use crate::domain::value_object::{
    email::Email, reset_token::ResetToken, verification_code::VerificationCode,
};

/// Rendered message, independent of transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub text: String,
}

/// Site facts the message bodies need
#[derive(Debug, Clone)]
pub struct MailContent {
    pub site_name: String,
    /// Public origin of the site, no trailing slash
    pub site_url: String,
}

impl Default for MailContent {
    fn default() -> Self {
        Self {
            site_name: "Wanderlust Travel".to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

impl MailContent {
    pub fn verification(&self, to: &Email, name: Option<&str>, code: &VerificationCode) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            to_name: name.map(str::to_string),
            subject: format!("Your {} verification code", self.site_name),
            text: format!(
                "{}\n\nYour verification code is {}.\n\nEnter it on the sign-in page to activate your account.",
                greeting(name),
                code.as_str()
            ),
        }
    }

    pub fn welcome(&self, to: &Email, name: Option<&str>) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            to_name: name.map(str::to_string),
            subject: format!("Welcome to {}", self.site_name),
            text: format!(
                "{}\n\nYour account is ready. Browse our packages at {}/packages.",
                greeting(name),
                self.site_url
            ),
        }
    }

    pub fn password_reset(&self, to: &Email, name: Option<&str>, token: &ResetToken) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            to_name: name.map(str::to_string),
            subject: format!("Reset your {} password", self.site_name),
            text: format!(
                "{}\n\nUse this link within one hour to choose a new password:\n{}/reset-password?token={}\n\nIf you did not ask for this, ignore this email.",
                greeting(name),
                self.site_url,
                urlencoding::encode(token.as_str())
            ),
        }
    }
}

fn greeting(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("Hi {name},"),
        None => "Hi,".to_string(),
    }
}

// ============================================================================
// Log Mailer
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    content: MailContent,
}

impl LogMailer {
    pub fn new(content: MailContent) -> Self {
        Self { content }
    }

    fn deliver(&self, email: OutgoingEmail) {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.text,
            "Email (log transport)"
        );
    }
}

impl EmailSender for LogMailer {
    async fn send_verification_email(
        &self,
        to: &Email,
        name: Option<&str>,
        code: &VerificationCode,
    ) -> Result<(), MailError> {
        self.deliver(self.content.verification(to, name, code));
        Ok(())
    }

    async fn send_welcome_email(&self, to: &Email, name: Option<&str>) -> Result<(), MailError> {
        self.deliver(self.content.welcome(to, name));
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to: &Email,
        name: Option<&str>,
        token: &ResetToken,
    ) -> Result<(), MailError> {
        self.deliver(self.content.password_reset(to, name, token));
        Ok(())
    }
}

// ============================================================================
// HTTP Mailer
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpMailerConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    text_content: String,
}

#[derive(Clone)]
pub struct HttpMailer {
    config: HttpMailerConfig,
    content: MailContent,
    http: reqwest::Client,
}

impl HttpMailer {
    pub fn new(config: HttpMailerConfig, content: MailContent) -> Self {
        Self {
            config,
            content,
            http: reqwest::Client::new(),
        }
    }

    async fn deliver(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: self.config.sender_email.clone(),
                name: self.config.sender_name.clone(),
            },
            to: vec![EmailAddress {
                email: email.to,
                name: email.to_name,
            }],
            subject: email.subject,
            text_content: email.text,
        };

        let resp = self
            .http
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "Email accepted by mail API");
            return Ok(());
        }

        let detail = resp.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), detail = %detail, "Mail API rejected message");
        Err(MailError::Rejected(status.as_u16()))
    }
}

impl EmailSender for HttpMailer {
    async fn send_verification_email(
        &self,
        to: &Email,
        name: Option<&str>,
        code: &VerificationCode,
    ) -> Result<(), MailError> {
        self.deliver(self.content.verification(to, name, code)).await
    }

    async fn send_welcome_email(&self, to: &Email, name: Option<&str>) -> Result<(), MailError> {
        self.deliver(self.content.welcome(to, name)).await
    }

    async fn send_password_reset_email(
        &self,
        to: &Email,
        name: Option<&str>,
        token: &ResetToken,
    ) -> Result<(), MailError> {
        self.deliver(self.content.password_reset(to, name, token)).await
    }
}
