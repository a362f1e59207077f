//! Sign In Use Case
//!
//! Credential verification plus token minting. Unknown email, missing
//! password hash and wrong password all fail as `InvalidCredentials` after the
//! same amount of hashing work.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::config::IdentityConfig;
use crate::application::token_issuer::TokenIssuer;
use crate::domain::entity::{session_claims::SessionClaims, user::AuthenticatedIdentity};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    email::Email,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

pub struct SignInInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub remember_me: bool,
}

pub struct SignInOutput {
    pub identity: AuthenticatedIdentity,
    pub claims: SessionClaims,
    pub session_token: String,
}

impl fmt::Debug for SignInOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInOutput")
            .field("identity", &self.identity)
            .field("claims", &self.claims)
            .field("session_token", &"[REDACTED]")
            .finish()
    }
}

pub struct SignInUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<IdentityConfig>,
    issuer: TokenIssuer,
}

impl<U> SignInUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<IdentityConfig>) -> Self {
        Self {
            user_repo,
            issuer: TokenIssuer::new(config.clone()),
            config,
        }
    }

    pub async fn execute(&self, input: SignInInput) -> AuthResult<SignInOutput> {
        self.execute_at(input, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        input: SignInInput,
        now: DateTime<Utc>,
    ) -> AuthResult<SignInOutput> {
        let (Some(email), Some(password)) = (input.email, input.password) else {
            return Err(AuthError::InvalidCredentials);
        };

        let identity = self.verify_credentials(&email, password).await?;

        let claims = self.issuer.mint(&identity, input.remember_me, now);
        let session_token = self.issuer.encode(&claims)?;

        tracing::info!(
            user_id = %identity.user_id,
            remember_me = input.remember_me,
            "User signed in"
        );

        Ok(SignInOutput {
            identity,
            claims,
            session_token,
        })
    }

    /// Check an email/password pair. Performs no writes.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: String,
    ) -> AuthResult<AuthenticatedIdentity> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let raw = RawPassword::submitted(password);
        let pepper = self.config.pepper();

        let user = match Email::new(email) {
            Ok(email) => self.user_repo.find_by_email(&email).await?,
            Err(_) => None,
        };

        let verified = match user.as_ref().and_then(|u| u.password_hash.as_ref()) {
            Some(hash) => hash.verify(&raw, pepper),
            None => UserPassword::verify_absent(&raw, pepper),
        };

        let user = match user {
            Some(user) if verified => user,
            _ => return Err(AuthError::InvalidCredentials),
        };

        if !user.is_email_verified() {
            tracing::info!(user_id = %user.user_id, "Sign-in blocked until email is verified");
            return Err(AuthError::EmailNotVerified);
        }

        Ok(user.identity())
    }
}
