// web-server/src/api/auth.rs
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use siwe_common::models::session::{MeResponse, VerifyRequest, VerifyResponse};
use siwe_common::Signature;

use crate::error::AuthError;
use crate::nonce_registry::{ConsumeNonce, IssueNonce, NonceStatus};
use crate::session_registry::{CreateSession, GetSession, InvalidateSession, SessionResult};
use crate::AppState;

// Issue a fresh single-use nonce as plain text, bound to the caller by cookie
#[get("/nonce")]
pub async fn nonce(state: web::Data<AppState>) -> Result<HttpResponse, AuthError> {
    let nonce = state.nonces.send(IssueNonce).await?;
    Ok(HttpResponse::Ok()
        .cookie(state.cookies.issue_nonce(&nonce))
        .content_type("text/plain; charset=utf-8")
        .body(nonce.to_string()))
}

// Verify a signed sign-in message and open a session
#[post("/verify")]
pub async fn verify(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> Result<HttpResponse, AuthError> {
    let VerifyRequest { message, signature } = body.into_inner();
    let signature: Signature = signature.parse()?;

    let message = match state.verifier.verify(&message, &signature, Utc::now()) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Sign-in verification failed: {}", e);
            return Err(e);
        }
    };

    // The nonce must be the one this client was handed
    if state.cookies.read_nonce(&req).as_ref() != Some(&message.nonce) {
        tracing::warn!("Sign-in for {} used a nonce not issued to this client", message.address);
        return Err(AuthError::NonceNotBound);
    }

    match state.nonces.send(ConsumeNonce { nonce: message.nonce.clone() }).await? {
        NonceStatus::Consumed => {}
        NonceStatus::Unknown => return Err(AuthError::UnknownNonce),
        NonceStatus::Expired => return Err(AuthError::NonceExpired),
        NonceStatus::AlreadyConsumed => return Err(AuthError::NonceReused),
    }

    let record = state
        .sessions
        .send(CreateSession {
            address: message.address,
            chain_id: message.chain_id,
        })
        .await?;
    let cookie = state.cookies.issue(&record)?;

    tracing::info!("Signed in {} on chain {}", record.address, record.chain_id);

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .cookie(state.cookies.nonce_removal())
        .json(VerifyResponse { address: record.address }))
}

// Report the address bound to the current session, if any
#[get("/me")]
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AuthError> {
    let Some(claims) = state.cookies.read(&req) else {
        return Ok(HttpResponse::Ok().json(MeResponse::default()));
    };

    match state.sessions.send(GetSession { session_id: claims.sid }).await? {
        SessionResult::Active(record) => Ok(HttpResponse::Ok().json(MeResponse {
            address: Some(record.address),
        })),
        SessionResult::Expired | SessionResult::NotFound => {
            tracing::debug!("Cookie names inactive session {}", claims.sid);
            Ok(HttpResponse::Ok()
                .cookie(state.cookies.removal())
                .json(MeResponse::default()))
        }
    }
}

// Invalidate/logout the current session; always succeeds
#[get("/logout")]
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(claims) = state.cookies.read(&req) {
        match state.sessions.send(InvalidateSession { session_id: claims.sid }).await {
            Ok(true) => tracing::info!("Session {} logged out", claims.sid),
            Ok(false) => tracing::debug!("Logout for unknown session {}", claims.sid),
            Err(e) => tracing::error!("Error invalidating session: {}", e),
        }
    }

    HttpResponse::Ok()
        .cookie(state.cookies.removal())
        .json(serde_json::json!({ "ok": true }))
}
