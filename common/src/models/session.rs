// common/src/models/session.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::Address;

/// Server-side record of an authenticated wallet session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    /// Unique session identifier, carried inside the session token
    pub session_id: Uuid,
    /// Address proven by the verified sign-in message
    pub address: Address,
    /// Chain the message was signed for
    pub chain_id: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(address: Address, chain_id: u64, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            address,
            chain_id,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Claims of the signed token stored inside the encrypted session cookie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,   // checksummed wallet address
    pub sid: Uuid,     // session_id in the registry
    pub chain_id: u64,
    pub iat: usize,
    pub exp: usize,
}

impl From<&SessionRecord> for SessionClaims {
    fn from(record: &SessionRecord) -> Self {
        Self {
            sub: record.address.to_string(),
            sid: record.session_id,
            chain_id: record.chain_id,
            iat: record.created_at.timestamp().max(0) as usize,
            exp: record.expires_at.timestamp().max(0) as usize,
        }
    }
}

/// Body of `POST /api/verify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Canonical EIP-4361 text that was signed
    pub message: String,
    /// 0x-prefixed 65-byte signature
    pub signature: String,
}

/// Successful `POST /api/verify` response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyResponse {
    pub address: Address,
}

/// Response of `GET /api/me`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}
