//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations with no domain knowledge:
//! - Password hashing (Argon2id, NIST SP 800-63B policy)
//! - Signed token codec (HS256 JWT)
//! - Cryptographic helpers (SHA-256, base64url, constant-time compare)
//! - Cookie building and parsing

pub mod cookie;
pub mod crypto;
pub mod password;
pub mod token;
