//! Token Issuer
//!
//! Mints, signs and decodes session tokens. Pure: no store access.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::token::{decode_hs256, encode_hs256};

use crate::application::config::IdentityConfig;
use crate::domain::entity::{
    session_claims::SessionClaims,
    user::{AuthenticatedIdentity, User},
};
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthResult;

/// What a route decision can learn from a token without touching the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenIntrospection {
    pub present: bool,
    pub role: Option<UserRole>,
    /// Refresh-due; the token still counts as present
    pub expired: bool,
}

impl TokenIntrospection {
    pub const ABSENT: Self = Self {
        present: false,
        role: None,
        expired: false,
    };

    pub fn of(claims: &SessionClaims, now: DateTime<Utc>) -> Self {
        Self {
            present: true,
            role: Some(claims.role),
            expired: claims.is_expired(now),
        }
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    config: Arc<IdentityConfig>,
}

impl TokenIssuer {
    pub fn new(config: Arc<IdentityConfig>) -> Self {
        Self { config }
    }

    /// `exp = now + 1 day`, or `now + 30 days` with `remember_me`
    pub fn mint(
        &self,
        identity: &AuthenticatedIdentity,
        remember_me: bool,
        now: DateTime<Utc>,
    ) -> SessionClaims {
        SessionClaims::mint(identity, remember_me, self.config.session_ttl(remember_me), now)
    }

    pub fn refresh(&self, claims: &SessionClaims, user: &User, now: DateTime<Utc>) -> SessionClaims {
        claims.refreshed(user, self.config.session_ttl(claims.remember_me), now)
    }

    pub fn encode(&self, claims: &SessionClaims) -> AuthResult<String> {
        Ok(encode_hs256(&self.config.session_secret, claims)?)
    }

    /// `None` for anything that does not verify: such a token is treated as absent
    pub fn decode(&self, token: &str) -> Option<SessionClaims> {
        match decode_hs256(&self.config.session_secret, token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session token");
                None
            }
        }
    }

    pub fn introspect(&self, token: Option<&str>, now: DateTime<Utc>) -> TokenIntrospection {
        token
            .and_then(|t| self.decode(t))
            .map(|claims| TokenIntrospection::of(&claims, now))
            .unwrap_or(TokenIntrospection::ABSENT)
    }

    /// Persistent cookie for remember sessions, browser-session cookie otherwise
    pub fn cookie_max_age(&self, claims: &SessionClaims) -> Option<u64> {
        claims
            .remember_me
            .then(|| self.config.session_ttl_long.as_secs())
    }
}
