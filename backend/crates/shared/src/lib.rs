//! Shared Kernel
//!
//! Vocabulary shared by every backend crate:
//! - the unified HTTP-facing error type ([`error::app_error::AppError`])
//! - error classification ([`error::kind::ErrorKind`])
//! - typed UUID identifiers ([`id::Id`])
//!
//! Anything domain-specific (users, sessions, bookings) lives in its own crate.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
