// web-server/src/nonce_registry.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use siwe_common::Nonce;
use std::collections::HashMap;
use std::time::Duration;

// Default nonce TTL in seconds (5 minutes)
const DEFAULT_NONCE_TTL: i64 = 300;

/// Actor message: Issue and remember a fresh nonce
#[derive(Message)]
#[rtype(result = "Nonce")]
pub struct IssueNonce;

/// Actor message: Consume a nonce named in a verified sign-in message
#[derive(Message)]
#[rtype(result = "NonceStatus")]
pub struct ConsumeNonce {
    pub nonce: Nonce,
}

/// Actor message: Drop expired nonces
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredNonces;

/// Outcome of consuming a nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceStatus {
    Consumed,
    Unknown,
    Expired,
    AlreadyConsumed,
}

#[derive(Debug, Clone)]
struct NonceEntry {
    expires_at: DateTime<Utc>,
    consumed: bool,
}

/// NonceRegistryActor owns every outstanding nonce; messages are handled one
/// at a time, so a nonce can be consumed at most once.
pub struct NonceRegistryActor {
    nonces: HashMap<Nonce, NonceEntry>,
    nonce_ttl: i64,
    cleanup_interval: u64,
}

impl Default for NonceRegistryActor {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceRegistryActor {
    pub fn new() -> Self {
        Self {
            nonces: HashMap::new(),
            nonce_ttl: DEFAULT_NONCE_TTL,
            cleanup_interval: 60,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.nonce_ttl = ttl_seconds;
        self
    }

    pub fn with_cleanup_interval(mut self, interval_seconds: u64) -> Self {
        self.cleanup_interval = interval_seconds;
        self
    }

    fn cleanup_nonces(&mut self) -> usize {
        let now = Utc::now();
        let before = self.nonces.len();
        self.nonces.retain(|_, entry| entry.expires_at > now);
        before - self.nonces.len()
    }
}

impl Actor for NonceRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("NonceRegistryActor started with TTL: {}s", self.nonce_ttl);

        ctx.run_interval(Duration::from_secs(self.cleanup_interval), |act, _ctx| {
            let expired_count = act.cleanup_nonces();
            if expired_count > 0 {
                tracing::debug!("Cleaned up {} expired nonces", expired_count);
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "NonceRegistryActor stopped with {} outstanding nonces",
            self.nonces.len()
        );
    }
}

impl Handler<IssueNonce> for NonceRegistryActor {
    type Result = MessageResult<IssueNonce>;

    fn handle(&mut self, _msg: IssueNonce, _ctx: &mut Self::Context) -> Self::Result {
        let mut nonce = Nonce::generate();
        while self.nonces.contains_key(&nonce) {
            nonce = Nonce::generate();
        }

        self.nonces.insert(
            nonce.clone(),
            NonceEntry {
                expires_at: Utc::now() + ChronoDuration::seconds(self.nonce_ttl),
                consumed: false,
            },
        );

        tracing::debug!("Issued nonce, {} outstanding", self.nonces.len());
        MessageResult(nonce)
    }
}

impl Handler<ConsumeNonce> for NonceRegistryActor {
    type Result = MessageResult<ConsumeNonce>;

    fn handle(&mut self, msg: ConsumeNonce, _ctx: &mut Self::Context) -> Self::Result {
        let status = match self.nonces.get_mut(&msg.nonce) {
            None => NonceStatus::Unknown,
            Some(entry) if entry.consumed => NonceStatus::AlreadyConsumed,
            Some(entry) if entry.expires_at <= Utc::now() => NonceStatus::Expired,
            Some(entry) => {
                // Kept until expiry so replays are reported as such
                entry.consumed = true;
                NonceStatus::Consumed
            }
        };

        if status != NonceStatus::Consumed {
            tracing::warn!("Rejected nonce {}: {:?}", msg.nonce, status);
        }
        MessageResult(status)
    }
}

impl Handler<CleanupExpiredNonces> for NonceRegistryActor {
    type Result = MessageResult<CleanupExpiredNonces>;

    fn handle(&mut self, _msg: CleanupExpiredNonces, _ctx: &mut Self::Context) -> Self::Result {
        let expired_count = self.cleanup_nonces();
        tracing::info!("Cleaned up {} expired nonces", expired_count);
        MessageResult(expired_count)
    }
}
