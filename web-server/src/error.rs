// web-server/src/error.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use siwe_common::{MessageError, SignatureError};
use thiserror::Error;

/// Reasons a sign-in or session request is refused
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed sign-in message: {0}")]
    Message(#[from] MessageError),
    #[error("malformed signature: {0}")]
    Signature(#[from] SignatureError),
    #[error("message is not in canonical form")]
    NonCanonical,
    #[error("message domain {actual:?} does not match {expected:?}")]
    DomainMismatch { expected: String, actual: String },
    #[error("chain id {0} is not accepted")]
    ChainNotAllowed(u64),
    #[error("message is outside its validity window")]
    MessageNotValidNow,
    #[error("signature does not match message address")]
    SignerMismatch,
    #[error("nonce was not issued by this server")]
    UnknownNonce,
    #[error("nonce was not issued to this client")]
    NonceNotBound,
    #[error("nonce has expired")]
    NonceExpired,
    #[error("nonce was already used")]
    NonceReused,
    #[error("session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("registry unavailable: {0}")]
    Mailbox(#[from] actix::MailboxError),
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Message(_) | AuthError::Signature(_) | AuthError::NonCanonical => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Token(_) | AuthError::Mailbox(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(json!({ "error": message }))
    }
}
