//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::IdentityAppState;
pub use middleware::{CurrentSession, SessionMiddlewareState, refresh_session, route_guard};
pub use router::{identity_router, with_session_layers};
