//! Session token payload
//!
//! Everything the site needs about the signed-in user, carried in the signed
//! cookie. Nothing is stored server-side.
//!
//! Lifecycle:
//! - minted at sign-in
//! - trusted as-is while `now < exp`
//! - refresh-due at `now >= exp`: the user is re-read and the fields are
//!   overwritten, with a new `exp` from the same lifetime class

use chrono::{DateTime, Duration, Utc};
use kernel::id::UserId;
use serde::{Deserialize, Serialize};

use crate::domain::entity::user::{AuthenticatedIdentity, User};
use crate::domain::value_object::{email::Email, user_role::UserRole};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub name: Option<String>,
    pub email: Email,
    pub role: UserRole,
    /// Unix seconds; `None` never leaves the issuer for credential accounts
    pub email_verified: Option<i64>,
    /// Chose "remember me" at sign-in; selects the long lifetime on refresh
    #[serde(default)]
    pub remember_me: bool,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn mint(
        identity: &AuthenticatedIdentity,
        remember_me: bool,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: identity.user_id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            email_verified: identity.email_verified.map(|t| t.timestamp()),
            remember_me,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    /// Overwrite every user-derived field from the authoritative record
    pub fn refreshed(&self, user: &User, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self::mint(&user.identity(), self.remember_me, ttl, now)
    }

    /// Refresh-due, not invalid
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}
