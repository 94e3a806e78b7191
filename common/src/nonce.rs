// common/src/nonce.rs
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of freshly generated nonces
pub const NONCE_LENGTH: usize = 17;
/// Shortest nonce accepted in a sign-in message (EIP-4361)
pub const MIN_NONCE_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NonceError {
    #[error("nonce must be at least {MIN_NONCE_LENGTH} characters, got {0}")]
    TooShort(usize),
    #[error("nonce must be alphanumeric")]
    NotAlphanumeric,
}

/// Single-use sign-in token issued by the auth backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce(String);

impl Nonce {
    pub fn generate() -> Self {
        let token = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LENGTH)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn parse(s: &str) -> Result<Self, NonceError> {
        let s = s.trim();
        if s.len() < MIN_NONCE_LENGTH {
            return Err(NonceError::TooShort(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(NonceError::NotAlphanumeric);
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Nonce {
    type Err = NonceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Nonce {
    type Error = NonceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Nonce> for String {
    fn from(nonce: Nonce) -> Self {
        nonce.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_nonce() {
        let nonce = Nonce::generate();
        assert_eq!(nonce.as_str().len(), NONCE_LENGTH);
        assert!(Nonce::parse(nonce.as_str()).is_ok());

        // Nonces should be unique
        assert_ne!(nonce, Nonce::generate());
    }

    #[test]
    fn test_parse_nonce() {
        assert_eq!(Nonce::parse("abc123").unwrap_err(), NonceError::TooShort(6));
        assert_eq!(Nonce::parse("abc-1234").unwrap_err(), NonceError::NotAlphanumeric);
        assert_eq!(Nonce::parse(" abcd1234\n").unwrap().as_str(), "abcd1234");
    }

    #[test]
    fn test_nonce_serde_validates() {
        assert!(serde_json::from_str::<Nonce>("\"short\"").is_err());
        let nonce: Nonce = serde_json::from_str("\"abcdefgh12\"").unwrap();
        assert_eq!(serde_json::to_string(&nonce).unwrap(), "\"abcdefgh12\"");
    }
}
