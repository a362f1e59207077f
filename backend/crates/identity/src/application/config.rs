//! Application Configuration

use std::time::Duration;

pub use platform::cookie::SameSite;
use platform::cookie::CookieConfig;
use rand::RngCore;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub session_cookie_name: String,
    /// HS256 key for session tokens (32 bytes). Random per process unless set
    pub session_secret: [u8; 32],
    /// Token lifetime without "remember me" (1 day)
    pub session_ttl_short: Duration,
    /// Token lifetime with "remember me" (30 days)
    pub session_ttl_long: Duration,
    /// Password reset link validity (1 hour)
    pub reset_token_ttl: Duration,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// Application-wide secret mixed into password hashes
    pub password_pepper: Option<Vec<u8>>,
    /// Let a provider sign-in attach itself to an existing password account
    /// with the same email
    pub allow_implicit_oauth_linking: bool,
    pub oauth_state_cookie_name: String,
    pub oauth_state_ttl: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let mut session_secret = [0u8; 32];
        rand::rng().fill_bytes(&mut session_secret);

        Self {
            session_cookie_name: "travel_session".to_string(),
            session_secret,
            session_ttl_short: Duration::from_secs(24 * 3600),
            session_ttl_long: Duration::from_secs(30 * 24 * 3600),
            reset_token_ttl: Duration::from_secs(3600),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            password_pepper: None,
            allow_implicit_oauth_linking: false,
            oauth_state_cookie_name: "travel_oauth_state".to_string(),
            oauth_state_ttl: Duration::from_secs(10 * 60),
        }
    }
}

impl IdentityConfig {
    /// Cookie that works over plain http
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::default()
        }
    }

    /// Token lifetime for the chosen class
    pub fn session_ttl(&self, remember_me: bool) -> chrono::Duration {
        let ttl = if remember_me {
            self.session_ttl_long
        } else {
            self.session_ttl_short
        };
        to_chrono(ttl)
    }

    pub fn reset_token_ttl(&self) -> chrono::Duration {
        to_chrono(self.reset_token_ttl)
    }

    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    pub fn session_cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.session_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
        }
    }

    pub fn oauth_state_cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.oauth_state_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            // Must survive the top-level redirect back from the provider
            same_site: SameSite::Lax,
            path: "/".to_string(),
        }
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::seconds(ttl.as_secs() as i64)
}
