//! Email verification code
//!
//! Six decimal digits, uniform in `100000..=999999`, emailed at sign-up and
//! stored as-is on the user until consumed.

use rand::Rng;
use std::fmt;

pub const CODE_LENGTH: usize = 6;

#[derive(Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub fn generate() -> Self {
        let n: u32 = rand::rng().random_range(100_000..=999_999);
        Self(n.to_string())
    }

    /// Accept user input only if it has the shape of a code
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        (input.len() == CODE_LENGTH && input.bytes().all(|b| b.is_ascii_digit()))
            .then(|| Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerificationCode").field(&"******").finish()
    }
}
