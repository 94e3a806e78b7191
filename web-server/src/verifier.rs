// web-server/src/verifier.rs
use chrono::{DateTime, Utc};
use siwe_common::config::AuthConfig;
use siwe_common::{SignInMessage, Signature};

use crate::error::AuthError;

/// Stateless checks on a signed sign-in message. Nonce consumption is done
/// separately by the nonce registry once these pass.
#[derive(Clone, Debug)]
pub struct SiweVerifier {
    domain: String,
    allowed_chain_ids: Vec<u64>,
}

impl SiweVerifier {
    pub fn new(domain: impl Into<String>, allowed_chain_ids: Vec<u64>) -> Self {
        Self {
            domain: domain.into(),
            allowed_chain_ids,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.domain.clone(), config.allowed_chain_ids.clone())
    }

    pub fn verify(
        &self,
        raw_message: &str,
        signature: &Signature,
        now: DateTime<Utc>,
    ) -> Result<SignInMessage, AuthError> {
        let message: SignInMessage = raw_message.parse()?;

        // The wallet signed `raw_message`; only accept text we would produce ourselves
        if message.to_string() != raw_message {
            return Err(AuthError::NonCanonical);
        }

        if message.domain != self.domain {
            return Err(AuthError::DomainMismatch {
                expected: self.domain.clone(),
                actual: message.domain,
            });
        }

        if !self.allowed_chain_ids.is_empty() && !self.allowed_chain_ids.contains(&message.chain_id) {
            return Err(AuthError::ChainNotAllowed(message.chain_id));
        }

        if !message.valid_at(now) {
            return Err(AuthError::MessageNotValidNow);
        }

        match signature.recover(raw_message.as_bytes()) {
            Ok(signer) if signer == message.address => Ok(message),
            Ok(signer) => {
                tracing::debug!("Recovered {} but message claims {}", signer, message.address);
                Err(AuthError::SignerMismatch)
            }
            Err(e) => {
                tracing::debug!("Signature recovery failed: {}", e);
                Err(AuthError::SignerMismatch)
            }
        }
    }
}
