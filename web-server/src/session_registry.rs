// web-server/src/session_registry.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use chrono::Utc;
use siwe_common::models::session::SessionRecord;
use siwe_common::Address;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

// Default session TTL in seconds (24 hours)
const DEFAULT_SESSION_TTL: i64 = 86400;

/// Actor message: Register a session for a freshly verified address
#[derive(Message)]
#[rtype(result = "SessionRecord")]
pub struct CreateSession {
    pub address: Address,
    pub chain_id: u64,
}

/// Actor message: Look up a session by id
#[derive(Message)]
#[rtype(result = "SessionResult")]
pub struct GetSession {
    pub session_id: Uuid,
}

/// Actor message: Invalidate/remove a session
#[derive(Message)]
#[rtype(result = "bool")]
pub struct InvalidateSession {
    pub session_id: Uuid,
}

/// Actor message: Clean up expired sessions
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredSessions;

/// Actor message: Get session metrics
#[derive(Message)]
#[rtype(result = "SessionMetrics")]
pub struct GetSessionMetrics;

/// Result of a session lookup
#[derive(Debug, Clone, PartialEq)]
pub enum SessionResult {
    Active(SessionRecord),
    Expired,
    NotFound,
}

/// Session metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    pub active_sessions: usize,
    pub created_count: usize,
    pub invalidated_count: usize,
    pub expired_count: usize,
}

/// SessionRegistryActor tracks live sessions so a logged-out cookie stops
/// working even before its token expires.
pub struct SessionRegistryActor {
    // Map from session id to session record
    sessions: HashMap<Uuid, SessionRecord>,
    // Session TTL in seconds
    session_ttl: i64,
    // Cleanup interval in seconds
    cleanup_interval: u64,
    metrics: SessionMetrics,
}

impl Default for SessionRegistryActor {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistryActor {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            session_ttl: DEFAULT_SESSION_TTL,
            cleanup_interval: 3600, // Run cleanup every hour
            metrics: SessionMetrics::default(),
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.session_ttl = ttl_seconds;
        self
    }

    pub fn with_cleanup_interval(mut self, interval_seconds: u64) -> Self {
        self.cleanup_interval = interval_seconds;
        self
    }

    /// Remove expired sessions and update metrics
    fn cleanup_sessions(&mut self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        let expired_count = before - self.sessions.len();

        self.metrics.expired_count += expired_count;
        self.metrics.active_sessions = self.sessions.len();
        expired_count
    }

    fn log_metrics(&self) {
        let SessionMetrics {
            active_sessions,
            created_count,
            invalidated_count,
            expired_count,
        } = self.metrics;
        tracing::info!(
            active_sessions,
            created_count,
            invalidated_count,
            expired_count,
            "Session metrics"
        );
    }
}

impl Actor for SessionRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("SessionRegistryActor started with TTL: {}s", self.session_ttl);

        // Schedule periodic session cleanup
        ctx.run_interval(Duration::from_secs(self.cleanup_interval), |act, _ctx| {
            let expired_count = act.cleanup_sessions();
            if expired_count > 0 {
                tracing::info!("Cleaned up {} expired sessions", expired_count);
            }
            act.log_metrics();
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "SessionRegistryActor stopped. Final metrics: {} created, {} invalidated, {} expired",
            self.metrics.created_count,
            self.metrics.invalidated_count,
            self.metrics.expired_count
        );
    }
}

impl Handler<CreateSession> for SessionRegistryActor {
    type Result = MessageResult<CreateSession>;

    fn handle(&mut self, msg: CreateSession, _ctx: &mut Self::Context) -> Self::Result {
        let record = SessionRecord::new(msg.address, msg.chain_id, self.session_ttl);
        self.sessions.insert(record.session_id, record.clone());

        self.metrics.created_count += 1;
        self.metrics.active_sessions = self.sessions.len();

        tracing::info!("Created session {} for {}", record.session_id, record.address);
        MessageResult(record)
    }
}

impl Handler<GetSession> for SessionRegistryActor {
    type Result = MessageResult<GetSession>;

    fn handle(&mut self, msg: GetSession, _ctx: &mut Self::Context) -> Self::Result {
        let result = match self.sessions.get(&msg.session_id) {
            Some(session) if session.is_expired(Utc::now()) => {
                tracing::debug!("Session expired: {}", msg.session_id);
                SessionResult::Expired
            }
            Some(session) => SessionResult::Active(session.clone()),
            None => {
                tracing::debug!("Session not found: {}", msg.session_id);
                SessionResult::NotFound
            }
        };

        MessageResult(result)
    }
}

impl Handler<InvalidateSession> for SessionRegistryActor {
    type Result = MessageResult<InvalidateSession>;

    fn handle(&mut self, msg: InvalidateSession, _ctx: &mut Self::Context) -> Self::Result {
        let result = if let Some(session) = self.sessions.remove(&msg.session_id) {
            self.metrics.invalidated_count += 1;
            self.metrics.active_sessions = self.sessions.len();

            tracing::info!("Invalidated session {} for {}", session.session_id, session.address);
            true
        } else {
            false
        };

        MessageResult(result)
    }
}

impl Handler<CleanupExpiredSessions> for SessionRegistryActor {
    type Result = MessageResult<CleanupExpiredSessions>;

    fn handle(&mut self, _msg: CleanupExpiredSessions, _ctx: &mut Self::Context) -> Self::Result {
        let expired_count = self.cleanup_sessions();
        tracing::info!("Cleaned up {} expired sessions", expired_count);
        MessageResult(expired_count)
    }
}

impl Handler<GetSessionMetrics> for SessionRegistryActor {
    type Result = MessageResult<GetSessionMetrics>;

    fn handle(&mut self, _msg: GetSessionMetrics, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.metrics.clone())
    }
}
