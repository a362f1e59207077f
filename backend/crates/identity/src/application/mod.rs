//! Application Layer
//!
//! Use cases and application services.

pub mod check_session;
pub mod config;
pub mod oauth_sign_in;
pub mod password_reset;
pub mod route_guard;
pub mod sign_in;
pub mod sign_up;
pub mod token_issuer;
pub mod verify_email;

// Re-exports
pub use check_session::{CheckSessionUseCase, SessionState};
pub use config::IdentityConfig;
pub use oauth_sign_in::{OAuthSignInOutput, OAuthSignInUseCase};
pub use password_reset::PasswordResetUseCase;
pub use route_guard::GuardOutcome;
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};
pub use token_issuer::{TokenIntrospection, TokenIssuer};
pub use verify_email::VerifyEmailUseCase;
