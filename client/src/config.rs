// client/src/config.rs
use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use siwe_common::config::config_dir;
use siwe_common::DEFAULT_STATEMENT;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::ClientError;

/// Client agent configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where the auth endpoints live
    pub api_base_url: String,
    /// Origin of the page the user signs in to; its host becomes the message domain
    pub origin: String,
    pub statement: String,
    /// Upper bound on waiting for the wallet; `None` waits forever
    pub signature_timeout_secs: Option<u64>,
    /// Hex private key for the local demo wallet
    pub wallet_private_key: Option<String>,
    pub chain_id: u64,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8081".to_string(),
            origin: "http://localhost:3000".to_string(),
            statement: DEFAULT_STATEMENT.to_string(),
            signature_timeout_secs: Some(120),
            wallet_private_key: None,
            chain_id: 1,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load `client.toml` from the config directory, overridden by `CLIENT__*` variables
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(
            &config_dir(),
            Environment::with_prefix("CLIENT").separator("__"),
        )
    }

    pub fn load_from(config_dir: &Path, environment: Environment) -> Result<Self, config::ConfigError> {
        ConfigFile::builder()
            .add_source(File::from(config_dir.join("client.toml")).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    pub fn signature_timeout(&self) -> Option<Duration> {
        self.signature_timeout_secs.map(Duration::from_secs)
    }

    /// Domain and URI for sign-in messages: the origin's `host[:port]` and
    /// its serialized origin
    pub fn message_origin(&self) -> Result<(String, String), ClientError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ClientError::Message(format!("invalid origin {:?}: {}", self.origin, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::Message(format!("origin {:?} has no host", self.origin)))?;
        let domain = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Ok((domain, url.origin().ascii_serialization()))
    }
}
