// client/src/error.rs
use std::time::Duration;
use thiserror::Error;

/// Why a handshake step failed. Kept cloneable so it can live in the
/// published client state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("signature request rejected: {0}")]
    UserRejected(String),
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("signature verification failed with status {status}")]
    VerificationFailed { status: u16 },
    #[error("wallet did not answer within {0:?}")]
    Timeout(Duration),
    #[error("sign-in attempt was cancelled")]
    Cancelled,
    #[error("a sign-in attempt is already in progress")]
    AlreadyInProgress,
    #[error("no wallet connected")]
    WalletNotConnected,
    #[error("could not build sign-in message: {0}")]
    Message(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Network(e.to_string())
    }
}

impl From<siwe_common::MessageError> for ClientError {
    fn from(e: siwe_common::MessageError) -> Self {
        ClientError::Message(e.to_string())
    }
}
