//! Domain Layer
//!
//! Entities, value objects, and the ports (repository, mail) the use cases
//! depend on.

pub mod entity;
pub mod mailer;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{
    linked_account::{LinkedAccount, ProviderProfile},
    session_claims::SessionClaims,
    user::{AuthenticatedIdentity, User},
};
pub use mailer::{EmailSender, MailError};
pub use repository::{OAuthAccountRepository, UserRepository};
