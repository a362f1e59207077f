//! Entity Module

pub mod linked_account;
pub mod session_claims;
pub mod user;
