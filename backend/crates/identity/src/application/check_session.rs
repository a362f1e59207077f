//! Check Session Use Case
//!
//! Decodes the session cookie and refreshes it once `exp` has passed.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::config::IdentityConfig;
use crate::application::token_issuer::TokenIssuer;
use crate::domain::entity::session_claims::SessionClaims;
use crate::domain::repository::UserRepository;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No token, or one that does not verify
    Anonymous,
    /// Valid and not yet due
    Current(SessionClaims),
    /// Re-read from the store; the caller must re-issue the cookie
    Refreshed {
        claims: SessionClaims,
        session_token: String,
    },
}

impl SessionState {
    pub fn claims(&self) -> Option<&SessionClaims> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Current(claims) | SessionState::Refreshed { claims, .. } => Some(claims),
        }
    }
}

pub struct CheckSessionUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    issuer: TokenIssuer,
}

impl<U> CheckSessionUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<IdentityConfig>) -> Self {
        Self {
            user_repo,
            issuer: TokenIssuer::new(config),
        }
    }

    pub async fn execute(&self, token: Option<&str>) -> AuthResult<SessionState> {
        self.execute_at(token, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> AuthResult<SessionState> {
        let Some(claims) = token.and_then(|t| self.issuer.decode(t)) else {
            return Ok(SessionState::Anonymous);
        };

        if !claims.is_expired(now) {
            return Ok(SessionState::Current(claims));
        }

        match self.refresh(&claims, now).await {
            Ok(claims) => {
                let session_token = self.issuer.encode(&claims)?;
                Ok(SessionState::Refreshed {
                    claims,
                    session_token,
                })
            }
            Err(AuthError::StaleRefreshTargetMissing) => {
                tracing::warn!(user_id = %claims.sub, "Refresh target missing; keeping token");
                Ok(SessionState::Current(claims))
            }
            Err(e) => Err(e),
        }
    }

    /// Re-read the user and overwrite the claims. Fails with
    /// `StaleRefreshTargetMissing` when the user is gone.
    pub async fn refresh(
        &self,
        claims: &SessionClaims,
        now: DateTime<Utc>,
    ) -> AuthResult<SessionClaims> {
        let user = self
            .user_repo
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AuthError::StaleRefreshTargetMissing)?;

        tracing::debug!(user_id = %user.user_id, remember_me = claims.remember_me, "Session refreshed");

        Ok(self.issuer.refresh(claims, &user, now))
    }
}
