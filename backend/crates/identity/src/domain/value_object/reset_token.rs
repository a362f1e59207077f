//! Password reset token
//!
//! The clear token (a UUIDv4) only ever travels in the reset email. The user
//! row keeps its SHA-256 digest, so a leaked table cannot be replayed.

use platform::crypto::sha256_hex;
use std::fmt;
use uuid::Uuid;

#[derive(Clone, PartialEq, Eq)]
pub struct ResetToken(String);

impl ResetToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a token submitted with a new password
    pub fn from_submitted(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex SHA-256, the persisted form
    pub fn digest(&self) -> String {
        sha256_hex(self.0.as_bytes())
    }
}

impl fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResetToken").field(&"[REDACTED]").finish()
    }
}
