//! Sign Up Use Case
//!
//! Creates an email + password account that cannot sign in until the emailed
//! code is confirmed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::UserId;

use crate::application::config::IdentityConfig;
use crate::domain::entity::user::User;
use crate::domain::mailer::EmailSender;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    email::Email,
    user_password::{RawPassword, UserPassword},
    verification_code::VerificationCode,
};
use crate::error::{AuthError, AuthResult};

/// Longest display name accepted at sign-up
const NAME_MAX_CHARS: usize = 100;

pub struct SignUpInput {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
pub struct SignUpOutput {
    pub user_id: UserId,
    pub email: Email,
}

pub struct SignUpUseCase<U, M>
where
    U: UserRepository,
    M: EmailSender,
{
    user_repo: Arc<U>,
    mailer: Arc<M>,
    config: Arc<IdentityConfig>,
}

impl<U, M> SignUpUseCase<U, M>
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

    pub async fn execute(&self, input: SignUpInput) -> AuthResult<SignUpOutput> {
        self.execute_at(input, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        input: SignUpInput,
        now: DateTime<Utc>,
    ) -> AuthResult<SignUpOutput> {
        let email = Email::new(input.email)?;
        let name = normalize_name(input.name)?;
        let raw = RawPassword::new(input.password)?;

        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = UserPassword::from_raw(&raw, self.config.pepper())?;
        let code = VerificationCode::generate();
        let user = User::new_with_password(email, name, password_hash, &code, now);

        self.user_repo.create(&user).await?;

        tracing::info!(user_id = %user.user_id, "User signed up");

        if let Err(e) = self
            .mailer
            .send_verification_email(&user.email, user.name.as_deref(), &code)
            .await
        {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to send verification email");
        }

        Ok(SignUpOutput {
            user_id: user.user_id,
            email: user.email,
        })
    }
}

fn normalize_name(name: Option<String>) -> AuthResult<Option<String>> {
    let Some(name) = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if name.chars().count() > NAME_MAX_CHARS {
        return Err(AuthError::Validation(format!(
            "Name must be at most {NAME_MAX_CHARS} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(AuthError::Validation(
            "Name contains invalid characters".to_string(),
        ));
    }

    Ok(Some(name))
}
