// common/src/config.rs
use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Minimum length of the session encryption secret, in bytes
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),
    #[error("session.password is not set; supply it via APP__SESSION__PASSWORD")]
    MissingSecret,
    #[error("session.password must be at least {MIN_SECRET_LENGTH} bytes, got {0}")]
    WeakSecret(usize),
    #[error("auth.domain must be a host[:port] authority, got {0:?}")]
    InvalidDomain(String),
    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

/// Deployment mode, taken from `RUN_MODE`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Test,
    Production,
}

impl RunMode {
    pub fn from_env() -> Self {
        env::var("RUN_MODE")
            .map(|v| Self::from_name(&v))
            .unwrap_or_default()
    }

    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => RunMode::Production,
            "test" => RunMode::Test,
            _ => RunMode::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Development => "development",
            RunMode::Test => "test",
            RunMode::Production => "production",
        }
    }
}

/// Auth backend configuration, built once at startup
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web_server_addr: String,
    pub log_level: String,
    #[serde(skip)]
    pub run_mode: RunMode,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Authority sign-in messages must name (the page host)
    pub domain: String,
    /// Accepted chain ids; empty accepts any chain
    pub allowed_chain_ids: Vec<u64>,
    pub nonce_ttl_secs: i64,
    pub cleanup_interval_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Encryption secret for the session cookie
    pub password: String,
    /// Explicit override; otherwise secure only in production
    pub secure: Option<bool>,
    pub ttl_secs: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
    pub paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            log_level: "info".to_string(),
            run_mode: RunMode::Development,
            auth: AuthConfig::default(),
            session: SessionConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            domain: "localhost:3000".to_string(),
            allowed_chain_ids: Vec::new(),
            nonce_ttl_secs: 300,
            cleanup_interval_secs: 60,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "siwe".to_string(),
            password: String::new(),
            secure: None,
            ttl_secs: 86400,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
            paths: vec!["/api/nonce".to_string(), "/api/verify".to_string()],
        }
    }
}

impl SessionConfig {
    pub fn is_secure(&self, run_mode: RunMode) -> bool {
        self.secure.unwrap_or(run_mode == RunMode::Production)
    }
}

/// Locate the config directory: `CONFIG_DIR`, else `./config`, else `../config`
pub fn config_dir() -> PathBuf {
    env::var("CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            // Check if we're in the project root or a subcrate
            let mut path = PathBuf::from("./config");
            if !path.exists() {
                path = PathBuf::from("../config");
            }
            path
        })
}

impl Config {
    /// Load configuration from files and environment, then validate it
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = RunMode::from_env();
        let config_dir = config_dir();

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode.as_str());

        let environment = Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("auth.allowed_chain_ids")
            .with_list_parse_key("rate_limit.paths");

        Self::load_from(&config_dir, run_mode, environment)
    }

    pub fn load_from(
        config_dir: &Path,
        run_mode: RunMode,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let mut config: Config = ConfigFile::builder()
            // Start with defaults
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add environment specific config
            .add_source(
                File::from(config_dir.join(format!("{}.toml", run_mode.as_str()))).required(false),
            )
            // Add a local config file for local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.run_mode = run_mode;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on settings the server cannot run safely without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.password.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.session.password.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::WeakSecret(self.session.password.len()));
        }
        let domain = &self.auth.domain;
        if domain.is_empty() || domain.contains(char::is_whitespace) || domain.contains('/') {
            return Err(ConfigError::InvalidDomain(domain.clone()));
        }
        self.tracing_level()?;
        if self.auth.nonce_ttl_secs <= 0 {
            return Err(ConfigError::NonPositive("auth.nonce_ttl_secs"));
        }
        if self.session.ttl_secs <= 0 {
            return Err(ConfigError::NonPositive("session.ttl_secs"));
        }
        if self.auth.cleanup_interval_secs == 0 {
            return Err(ConfigError::NonPositive("auth.cleanup_interval_secs"));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::NonPositive("rate_limit.window_secs"));
        }
        Ok(())
    }

    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }

    pub fn secure_cookies(&self) -> bool {
        self.session.is_secure(self.run_mode)
    }
}
