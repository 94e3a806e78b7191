// common/src/message.rs
//! EIP-4361 sign-in message.
//!
//! The serialized text is what the wallet signs and what the verifier
//! recomputes, so [`SignInMessage`]'s `Display` output must be reproducible
//! byte for byte from a parsed message.
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::address::{Address, AddressError};
use crate::crypto::{Signature, SignatureError};
use crate::nonce::{Nonce, NonceError};

const PREAMBLE: &str = " wants you to sign in with your Ethereum account:";
const URI_TAG: &str = "URI: ";
const VERSION_TAG: &str = "Version: ";
const CHAIN_TAG: &str = "Chain ID: ";
const NONCE_TAG: &str = "Nonce: ";
const ISSUED_AT_TAG: &str = "Issued At: ";
const EXPIRATION_TAG: &str = "Expiration Time: ";
const NOT_BEFORE_TAG: &str = "Not Before: ";
const REQUEST_ID_TAG: &str = "Request ID: ";
const RESOURCES_TAG: &str = "Resources:";
const RESOURCE_PREFIX: &str = "- ";

/// Statement shown to the user by the sign-in flow.
pub const DEFAULT_STATEMENT: &str = "Sign in with Ethereum to the app.";

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid domain: {0:?}")]
    InvalidDomain(String),
    #[error("invalid uri {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("statement must be non-empty and single-line")]
    InvalidStatement,
    #[error("request id must be non-empty and single-line")]
    InvalidRequestId,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),
    #[error("invalid chain id: {0}")]
    InvalidChainId(String),
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
    #[error("invalid nonce: {0}")]
    Nonce(#[from] NonceError),
    #[error("expected line starting with {expected:?}, found {found:?}")]
    UnexpectedLine { expected: &'static str, found: String },
    #[error("message ended before {0:?}")]
    Truncated(&'static str),
    #[error("trailing content after message: {0:?}")]
    TrailingContent(String),
}

/// Protocol version. EIP-4361 only defines `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    #[default]
    V1,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V1 => f.write_str("1"),
        }
    }
}

impl FromStr for Version {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Version::V1),
            other => Err(MessageError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// RFC 3339 timestamp that remembers its original text.
#[derive(Debug, Clone)]
pub struct TimeStamp {
    raw: String,
    at: DateTime<Utc>,
}

impl TimeStamp {
    pub fn now() -> Self {
        Utc::now().into()
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self {
            raw: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            at,
        }
    }
}

impl FromStr for TimeStamp {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let at = DateTime::parse_from_rfc3339(s)
            .map_err(|_| MessageError::InvalidTimestamp(s.to_string()))?
            .with_timezone(&Utc);
        Ok(Self {
            raw: s.to_string(),
            at,
        })
    }
}

impl PartialEq for TimeStamp {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for TimeStamp {}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A Sign-In with Ethereum message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInMessage {
    pub domain: String,
    pub address: Address,
    pub statement: Option<String>,
    pub uri: String,
    pub version: Version,
    pub chain_id: u64,
    pub nonce: Nonce,
    pub issued_at: TimeStamp,
    pub expiration_time: Option<TimeStamp>,
    pub not_before: Option<TimeStamp>,
    pub request_id: Option<String>,
    pub resources: Vec<String>,
}

impl SignInMessage {
    /// Build a message issued now. Optional fields can be set with the
    /// `with_*` methods.
    pub fn new(
        domain: impl Into<String>,
        address: Address,
        uri: impl Into<String>,
        chain_id: u64,
        nonce: Nonce,
    ) -> Result<Self, MessageError> {
        let message = Self {
            domain: domain.into(),
            address,
            statement: None,
            uri: uri.into(),
            version: Version::V1,
            chain_id,
            nonce,
            issued_at: TimeStamp::now(),
            expiration_time: None,
            not_before: None,
            request_id: None,
            resources: Vec::new(),
        };
        message.validate()?;
        Ok(message)
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Result<Self, MessageError> {
        self.statement = Some(statement.into());
        self.validate()?;
        Ok(self)
    }

    pub fn with_expiration_time(mut self, at: DateTime<Utc>) -> Self {
        self.expiration_time = Some(at.into());
        self
    }

    pub fn with_not_before(mut self, at: DateTime<Utc>) -> Self {
        self.not_before = Some(at.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Result<Self, MessageError> {
        self.request_id = Some(id.into());
        self.validate()?;
        Ok(self)
    }

    pub fn with_resources(mut self, resources: Vec<String>) -> Result<Self, MessageError> {
        self.resources = resources;
        self.validate()?;
        Ok(self)
    }

    /// Check field constraints that keep the serialized form unambiguous.
    pub fn validate(&self) -> Result<(), MessageError> {
        validate_domain(&self.domain)?;
        validate_uri(&self.uri)?;
        for resource in &self.resources {
            validate_uri(resource)?;
        }
        if let Some(statement) = &self.statement {
            if statement.is_empty() || statement.contains('\n') {
                return Err(MessageError::InvalidStatement);
            }
        }
        if let Some(id) = &self.request_id {
            if id.is_empty() || id.contains('\n') {
                return Err(MessageError::InvalidRequestId);
            }
        }
        Ok(())
    }

    /// Whether the message's validity window contains `now`.
    pub fn valid_at(&self, now: DateTime<Utc>) -> bool {
        if let Some(exp) = &self.expiration_time {
            if now >= exp.as_datetime() {
                return false;
            }
        }
        if let Some(nbf) = &self.not_before {
            if now < nbf.as_datetime() {
                return false;
            }
        }
        true
    }

    /// Recover the signer of the canonical text and compare it with `address`.
    pub fn signed_by_address(&self, signature: &Signature) -> Result<bool, SignatureError> {
        let signer = signature.recover(self.to_string().as_bytes())?;
        Ok(signer == self.address)
    }
}

fn validate_domain(domain: &str) -> Result<(), MessageError> {
    if domain.is_empty() || domain.contains(char::is_whitespace) || domain.contains('/') {
        return Err(MessageError::InvalidDomain(domain.to_string()));
    }
    Ok(())
}

fn validate_uri(uri: &str) -> Result<(), MessageError> {
    if uri.contains(char::is_whitespace) {
        return Err(MessageError::InvalidUri {
            uri: uri.to_string(),
            reason: "contains whitespace".to_string(),
        });
    }
    Url::parse(uri).map_err(|e| MessageError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

impl fmt::Display for SignInMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{}", self.domain, PREAMBLE)?;
        writeln!(f, "{}", self.address)?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{}", statement)?;
        }
        writeln!(f)?;
        writeln!(f, "{}{}", URI_TAG, self.uri)?;
        writeln!(f, "{}{}", VERSION_TAG, self.version)?;
        writeln!(f, "{}{}", CHAIN_TAG, self.chain_id)?;
        writeln!(f, "{}{}", NONCE_TAG, self.nonce)?;
        write!(f, "{}{}", ISSUED_AT_TAG, self.issued_at)?;
        if let Some(exp) = &self.expiration_time {
            write!(f, "\n{}{}", EXPIRATION_TAG, exp)?;
        }
        if let Some(nbf) = &self.not_before {
            write!(f, "\n{}{}", NOT_BEFORE_TAG, nbf)?;
        }
        if let Some(id) = &self.request_id {
            write!(f, "\n{}{}", REQUEST_ID_TAG, id)?;
        }
        if !self.resources.is_empty() {
            write!(f, "\n{}", RESOURCES_TAG)?;
            for resource in &self.resources {
                write!(f, "\n{}{}", RESOURCE_PREFIX, resource)?;
            }
        }
        Ok(())
    }
}

struct Lines<'a> {
    inner: std::iter::Peekable<std::str::Split<'a, char>>,
}

impl<'a> Lines<'a> {
    fn next(&mut self, expected: &'static str) -> Result<&'a str, MessageError> {
        self.inner.next().ok_or(MessageError::Truncated(expected))
    }

    fn tagged(&mut self, tag: &'static str) -> Result<&'a str, MessageError> {
        let line = self.next(tag)?;
        line.strip_prefix(tag).ok_or_else(|| MessageError::UnexpectedLine {
            expected: tag,
            found: line.to_string(),
        })
    }

    fn optional_tagged(&mut self, tag: &'static str) -> Option<&'a str> {
        let line: &'a str = *self.inner.peek()?;
        let value = line.strip_prefix(tag)?;
        self.inner.next();
        Some(value)
    }

    fn blank(&mut self, expected: &'static str) -> Result<(), MessageError> {
        let line = self.next(expected)?;
        if !line.is_empty() {
            return Err(MessageError::UnexpectedLine {
                expected,
                found: line.to_string(),
            });
        }
        Ok(())
    }
}

impl FromStr for SignInMessage {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = Lines {
            inner: s.split('\n').peekable(),
        };

        let header = lines.next(PREAMBLE)?;
        let domain = header
            .strip_suffix(PREAMBLE)
            .ok_or_else(|| MessageError::UnexpectedLine {
                expected: PREAMBLE,
                found: header.to_string(),
            })?;
        let address = Address::parse_checksummed(lines.next("address")?)?;
        lines.blank("blank line")?;

        let statement = match lines.next(URI_TAG)? {
            "" => None,
            statement => {
                lines.blank("blank line")?;
                Some(statement.to_string())
            }
        };

        let uri = lines.tagged(URI_TAG)?;
        let version: Version = lines.tagged(VERSION_TAG)?.parse()?;
        let chain_id = lines.tagged(CHAIN_TAG)?;
        let chain_id = chain_id
            .parse::<u64>()
            .map_err(|_| MessageError::InvalidChainId(chain_id.to_string()))?;
        let nonce = Nonce::parse(lines.tagged(NONCE_TAG)?)?;
        let issued_at: TimeStamp = lines.tagged(ISSUED_AT_TAG)?.parse()?;
        let expiration_time = lines
            .optional_tagged(EXPIRATION_TAG)
            .map(TimeStamp::from_str)
            .transpose()?;
        let not_before = lines
            .optional_tagged(NOT_BEFORE_TAG)
            .map(TimeStamp::from_str)
            .transpose()?;
        let request_id = lines.optional_tagged(REQUEST_ID_TAG).map(str::to_string);

        let mut resources = Vec::new();
        if lines.inner.peek() == Some(&RESOURCES_TAG) {
            lines.inner.next();
            while let Some(resource) = lines.optional_tagged(RESOURCE_PREFIX) {
                resources.push(resource.to_string());
            }
        }

        if let Some(extra) = lines.inner.next() {
            return Err(MessageError::TrailingContent(extra.to_string()));
        }

        let message = Self {
            domain: domain.to_string(),
            address,
            statement,
            uri: uri.to_string(),
            version,
            chain_id,
            nonce,
            issued_at,
            expiration_time,
            not_before,
            request_id,
            resources,
        };
        message.validate()?;
        Ok(message)
    }
}
