//! Infrastructure Layer
//!
//! Store implementations and outbound integrations (mail API, identity
//! providers).

pub mod mailer;
pub mod memory;
pub mod oauth;
pub mod postgres;

pub use mailer::{HttpMailer, HttpMailerConfig, LogMailer, MailContent};
pub use memory::InMemoryIdentityRepository;
pub use oauth::{OAuthClient, OAuthProviderConfig, ProviderRegistry};
pub use postgres::PgIdentityRepository;
