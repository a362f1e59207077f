//! Route Guard Policy
//!
//! Path-based access decision. First match wins:
//!
//! | Path                          | Condition         | Outcome                       |
//! |-------------------------------|-------------------|-------------------------------|
//! | `/admin`, `/admin/**`         | no valid token    | `/login`                      |
//! | `/admin`, `/admin/**`         | role is not ADMIN | `/`                           |
//! | `/bookings`, `/bookings/**`   | no valid token    | `/login?redirect=<path>`      |
//! | `/packages/<id>/book`         | no valid token    | `/login?redirect=<path>`      |
//! | anything else                 |                   | pass through                  |
//!
//! "Valid token" means the signature verifies. A token past `exp` is
//! refresh-due, not missing.

use crate::application::token_issuer::TokenIntrospection;
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthError;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

#[derive(Debug)]
pub enum GuardOutcome {
    PassThrough,
    Redirect {
        location: String,
        reason: AuthError,
    },
}

impl GuardOutcome {
    pub fn location(&self) -> Option<&str> {
        match self {
            GuardOutcome::PassThrough => None,
            GuardOutcome::Redirect { location, .. } => Some(location),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProtectedArea {
    Admin,
    Bookings,
    PackageBooking,
}

fn classify(path: &str) -> Option<ProtectedArea> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        ["admin", ..] => Some(ProtectedArea::Admin),
        ["bookings", ..] => Some(ProtectedArea::Bookings),
        ["packages", _, "book"] => Some(ProtectedArea::PackageBooking),
        _ => None,
    }
}

pub fn evaluate(path: &str, session: &TokenIntrospection) -> GuardOutcome {
    let Some(area) = classify(path) else {
        return GuardOutcome::PassThrough;
    };

    match area {
        ProtectedArea::Admin if !session.present => GuardOutcome::Redirect {
            location: LOGIN_PATH.to_string(),
            reason: AuthError::TokenExpiredOrMissing,
        },
        ProtectedArea::Admin if session.role != Some(UserRole::Admin) => GuardOutcome::Redirect {
            location: HOME_PATH.to_string(),
            reason: AuthError::InsufficientRole,
        },
        ProtectedArea::Bookings | ProtectedArea::PackageBooking if !session.present => {
            GuardOutcome::Redirect {
                location: login_with_return(path),
                reason: AuthError::TokenExpiredOrMissing,
            }
        }
        _ => GuardOutcome::PassThrough,
    }
}

/// `/login?redirect=<path>`, path percent-encoded (`/` becomes `%2F`)
pub fn login_with_return(path: &str) -> String {
    format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(path))
}
