// web-server/src/session_cookie.rs
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, CookieJar, Key, SameSite};
use actix_web::HttpRequest;
use siwe_common::config::Config;
use siwe_common::models::session::{SessionClaims, SessionRecord};
use siwe_common::{decode_session_token, encode_session_token, Nonce};

use crate::error::AuthError;

// Default lifetime of the nonce cookie in seconds (5 minutes)
const DEFAULT_NONCE_TTL: i64 = 300;

/// Issues and reads the session and nonce cookies.
///
/// The session cookie value is a signed session token, encrypted and
/// authenticated with a key derived from the configured password. The nonce
/// cookie ties an issued nonce to the client that asked for it. Clients only
/// ever see ciphertext.
#[derive(Clone)]
pub struct SessionCookies {
    name: String,
    nonce_name: String,
    key: Key,
    token_secret: Vec<u8>,
    secure: bool,
    max_age: i64,
    nonce_max_age: i64,
}

impl SessionCookies {
    /// `password` must be at least 32 bytes; `Config::validate` enforces this.
    pub fn new(name: impl Into<String>, password: &str, secure: bool, max_age: i64) -> Self {
        let name = name.into();
        Self {
            nonce_name: format!("{}_nonce", name),
            name,
            key: Key::derive_from(password.as_bytes()),
            token_secret: password.as_bytes().to_vec(),
            secure,
            max_age,
            nonce_max_age: DEFAULT_NONCE_TTL,
        }
    }

    pub fn with_nonce_ttl(mut self, ttl_seconds: i64) -> Self {
        self.nonce_max_age = ttl_seconds;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.session.cookie_name.clone(),
            &config.session.password,
            config.secure_cookies(),
            config.session.ttl_secs,
        )
        .with_nonce_ttl(config.auth.nonce_ttl_secs)
    }

    fn build(&self, name: &str, value: String, max_age: i64) -> Cookie<'static> {
        Cookie::build(name.to_string(), value)
            .path("/")
            .secure(self.secure)
            .http_only(true)
            .same_site(SameSite::Strict)
            .max_age(CookieDuration::seconds(max_age))
            .finish()
    }

    /// Encrypt a plaintext cookie
    fn seal(&self, cookie: Cookie<'static>) -> Cookie<'static> {
        let name = cookie.name().to_string();
        let mut jar = CookieJar::new();
        jar.private_mut(&self.key).add(cookie);
        jar.get(&name)
            .cloned()
            .unwrap_or_else(|| self.build(&name, String::new(), 0))
    }

    /// Decrypt the request's cookie called `name`
    fn open(&self, req: &HttpRequest, name: &str) -> Option<Cookie<'static>> {
        let cookie = req.cookie(name)?;

        let mut jar = CookieJar::new();
        jar.add_original(cookie);
        let opened = jar.private(&self.key).get(name);
        if opened.is_none() {
            tracing::warn!("Cookie {} failed to decrypt", name);
        }
        opened
    }

    /// Build the encrypted cookie for a new session
    pub fn issue(&self, record: &SessionRecord) -> Result<Cookie<'static>, AuthError> {
        let token = encode_session_token(&SessionClaims::from(record), &self.token_secret)?;
        Ok(self.seal(self.build(&self.name, token, self.max_age)))
    }

    /// Decrypt the request's session cookie and validate its token
    pub fn read(&self, req: &HttpRequest) -> Option<SessionClaims> {
        let decrypted = self.open(req, &self.name)?;

        match decode_session_token(decrypted.value(), &self.token_secret) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!("Session token rejected: {}", e);
                None
            }
        }
    }

    /// Empty cookie that clears the session in the browser
    pub fn removal(&self) -> Cookie<'static> {
        self.build(&self.name, String::new(), 0)
    }

    /// Encrypted cookie remembering the nonce handed to this client
    pub fn issue_nonce(&self, nonce: &Nonce) -> Cookie<'static> {
        self.seal(self.build(&self.nonce_name, nonce.to_string(), self.nonce_max_age))
    }

    /// Nonce previously issued to the requesting client, if any
    pub fn read_nonce(&self, req: &HttpRequest) -> Option<Nonce> {
        let decrypted = self.open(req, &self.nonce_name)?;
        Nonce::parse(decrypted.value()).ok()
    }

    pub fn nonce_removal(&self) -> Cookie<'static> {
        self.build(&self.nonce_name, String::new(), 0)
    }
}
