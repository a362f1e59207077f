//! Signed Token Codec
//!
//! HS256 JWTs via `jsonwebtoken`. Only the algorithm and signature are
//! checked here: `exp` is left to whoever owns the claims type, since an
//! elapsed session token is refresh-due rather than invalid.

use std::collections::HashSet;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl TokenError {
    pub fn is_bad_signature(&self) -> bool {
        let TokenError::Jwt(e) = self;
        matches!(e.kind(), jsonwebtoken::errors::ErrorKind::InvalidSignature)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    validation
}

/// Sign `claims` with `secret`
pub fn encode_hs256<T: Serialize>(secret: &[u8], claims: &T) -> Result<String, TokenError> {
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )?;
    Ok(token)
}

/// Verify the signature and decode the claims
pub fn decode_hs256<T: DeserializeOwned>(secret: &[u8], token: &str) -> Result<T, TokenError> {
    let data = jsonwebtoken::decode::<T>(
        token.trim(),
        &DecodingKey::from_secret(secret),
        &validation(),
    )?;
    Ok(data.claims)
}
