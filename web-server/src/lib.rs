// web-server/src/lib.rs
//! Sign-In with Ethereum auth backend.
//!
//! Issues nonces, verifies signed EIP-4361 messages and keeps wallet
//! sessions in an encrypted cookie backed by an in-memory registry.
pub mod api;
pub mod error;
pub mod middleware;
pub mod nonce_registry;
pub mod session_cookie;
pub mod session_registry;
pub mod verifier;

use actix::{Actor, Addr};
use siwe_common::Config;

use nonce_registry::NonceRegistryActor;
use session_cookie::SessionCookies;
use session_registry::SessionRegistryActor;
use verifier::SiweVerifier;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub nonces: Addr<NonceRegistryActor>,
    pub sessions: Addr<SessionRegistryActor>,
    pub cookies: SessionCookies,
    pub verifier: SiweVerifier,
}

impl AppState {
    /// Start the registries on the current actix system.
    ///
    /// `config` must already be validated.
    pub fn start(config: &Config) -> Self {
        let nonces = NonceRegistryActor::new()
            .with_ttl(config.auth.nonce_ttl_secs)
            .with_cleanup_interval(config.auth.cleanup_interval_secs)
            .start();
        let sessions = SessionRegistryActor::new()
            .with_ttl(config.session.ttl_secs)
            .with_cleanup_interval(config.auth.cleanup_interval_secs)
            .start();

        Self {
            nonces,
            sessions,
            cookies: SessionCookies::from_config(config),
            verifier: SiweVerifier::from_config(&config.auth),
        }
    }
}
