//! Identity Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository and mail ports
//! - `application/` - Use cases, token issuing, route policy
//! - `infra/` - PostgreSQL and in-memory stores, mail transports, OAuth client
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Features
//! - Email + password sign-up with a six-digit verification code
//! - Sign-in with an optional 30-day "remember me" session
//! - OAuth sign-in (authorization code flow) with account linking
//! - Password reset by one-hour emailed link
//! - Path-based route guard for admin and booking pages
//!
//! ## Security Model
//! - Passwords hashed with Argon2id; timing does not reveal unknown emails
//! - Stateless HS256-signed session cookie, refreshed from the store once due
//! - Single-use codes and reset tokens consumed by conditional updates
//! - Reset tokens stored as SHA-256 digests

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::IdentityConfig;
pub use error::{AuthError, AuthResult};
pub use infra::{InMemoryIdentityRepository, PgIdentityRepository};
pub use presentation::router::{identity_router, with_session_layers};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::linked_account::*;
    pub use crate::domain::entity::session_claims::*;
    pub use crate::domain::entity::user::*;
    pub use crate::presentation::dto::*;
}

pub mod mail {
    pub use crate::domain::mailer::{EmailSender, MailError};
    pub use crate::infra::mailer::*;
}

pub mod oauth {
    pub use crate::infra::oauth::*;
}
