//! OAuth Sign In Use Case
//!
//! Resolves a provider-confirmed profile to a local user, linking or creating
//! as needed, and mints a session. The email-verification gate never applies
//! here: whatever account comes out of this is verified.
//!
//! Resolution order:
//! 1. provider account already linked: that user
//! 2. local user with the same email and no password: link it
//! 3. local user with the same email and a password: refuse, unless
//!    implicit linking is enabled
//! 4. otherwise: new user, verified at creation, welcome email once

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::config::IdentityConfig;
use crate::application::token_issuer::TokenIssuer;
use crate::application::verify_email::send_welcome_once;
use crate::domain::entity::{
    linked_account::{LinkedAccount, ProviderProfile},
    session_claims::SessionClaims,
    user::{AuthenticatedIdentity, User},
};
use crate::domain::mailer::EmailSender;
use crate::domain::repository::{OAuthAccountRepository, UserRepository};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

pub struct OAuthSignInOutput {
    pub identity: AuthenticatedIdentity,
    pub is_new_user: bool,
    pub claims: SessionClaims,
    pub session_token: String,
}

impl fmt::Debug for OAuthSignInOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSignInOutput")
            .field("identity", &self.identity)
            .field("is_new_user", &self.is_new_user)
            .field("claims", &self.claims)
            .field("session_token", &"[REDACTED]")
            .finish()
    }
}

pub struct OAuthSignInUseCase<R, M>
where
    R: UserRepository + OAuthAccountRepository,
    M: EmailSender,
{
    repo: Arc<R>,
    mailer: Arc<M>,
    config: Arc<IdentityConfig>,
    issuer: TokenIssuer,
}

impl<R, M> OAuthSignInUseCase<R, M>
where
    R: UserRepository + OAuthAccountRepository,
    M: EmailSender,
{
    pub fn new(repo: Arc<R>, mailer: Arc<M>, config: Arc<IdentityConfig>) -> Self {
        Self {
            repo,
            mailer,
            issuer: TokenIssuer::new(config.clone()),
            config,
        }
    }

    pub async fn execute(&self, profile: ProviderProfile) -> AuthResult<OAuthSignInOutput> {
        self.execute_at(profile, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        profile: ProviderProfile,
        now: DateTime<Utc>,
    ) -> AuthResult<OAuthSignInOutput> {
        let email = Email::new(profile.email.as_str()).map_err(|_| {
            AuthError::OAuthProvider(format!("{} returned no usable email", profile.provider))
        })?;

        // A concurrent first sign-in can win the insert; the retry finds its user
        let (user, is_new_user) = match self.resolve(&profile, &email, now).await {
            Err(AuthError::EmailTaken) => self.resolve(&profile, &email, now).await?,
            other => other?,
        };

        if is_new_user {
            send_welcome_once(self.repo.as_ref(), self.mailer.as_ref(), &user, now).await?;
        }

        let identity = user.identity();
        let claims = self.issuer.mint(&identity, false, now);
        let session_token = self.issuer.encode(&claims)?;

        tracing::info!(
            user_id = %identity.user_id,
            provider = %profile.provider,
            is_new_user,
            "User signed in with identity provider"
        );

        Ok(OAuthSignInOutput {
            identity,
            is_new_user,
            claims,
            session_token,
        })
    }

    async fn resolve(
        &self,
        profile: &ProviderProfile,
        email: &Email,
        now: DateTime<Utc>,
    ) -> AuthResult<(User, bool)> {
        if let Some(user) = self
            .repo
            .find_by_provider_account(&profile.provider, &profile.provider_account_id)
            .await?
        {
            return Ok((self.ensure_verified(user, now).await?, false));
        }

        if let Some(user) = self.repo.find_by_email(email).await? {
            if user.has_password() && !self.config.allow_implicit_oauth_linking {
                tracing::info!(
                    user_id = %user.user_id,
                    provider = %profile.provider,
                    "Refused to link provider identity to password account"
                );
                return Err(AuthError::OAuthAccountNotLinked);
            }

            self.repo
                .link_account(&LinkedAccount::new(user.user_id, profile, now))
                .await?;
            tracing::info!(user_id = %user.user_id, provider = %profile.provider, "Linked provider account");

            return Ok((self.ensure_verified(user, now).await?, false));
        }

        let user = User::new_from_provider(
            email.clone(),
            profile.name.clone(),
            profile.image.clone(),
            now,
        );
        let account = LinkedAccount::new(user.user_id, profile, now);
        self.repo.create_with_account(&user, &account).await?;

        Ok((user, true))
    }

    async fn ensure_verified(&self, mut user: User, now: DateTime<Utc>) -> AuthResult<User> {
        if self.repo.mark_email_verified(&user.user_id, now).await? {
            user.email_verified.get_or_insert(now);
            user.verification_token = None;
            user.updated_at = now;
        }
        Ok(user)
    }
}
