// common/src/utils.rs
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::models::session::SessionClaims;

/// Setup tracing for consistent logging across binaries
pub fn setup_tracing(level: Level) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

// Sign session claims into an HS256 token
pub fn encode_session_token(
    claims: &SessionClaims,
    secret: &[u8],
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret))
}

// Validate signature and expiry of a session token
pub fn decode_session_token(
    token: &str,
    secret: &[u8],
) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = decode::<SessionClaims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}
