// client/src/backend.rs
use async_trait::async_trait;
use reqwest::Client;
use siwe_common::models::session::{MeResponse, VerifyRequest};
use siwe_common::{Address, Nonce, Signature};
use url::Url;

use crate::error::ClientError;

/// The auth endpoints the handshake talks to.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// GET /api/nonce
    async fn fetch_nonce(&self) -> Result<Nonce, ClientError>;

    /// POST /api/verify; returns the HTTP status, success or not
    async fn verify(&self, message: &str, signature: &Signature) -> Result<u16, ClientError>;

    /// GET /api/me
    async fn me(&self) -> Result<Option<Address>, ClientError>;

    /// GET /api/logout
    async fn logout(&self) -> Result<(), ClientError>;
}

/// reqwest-based backend that keeps the session cookie in its own cookie store
#[derive(Clone)]
pub struct HttpAuthBackend {
    client: Client,
    base_url: Url,
}

impl HttpAuthBackend {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| ClientError::Network(format!("bad base url: {}", e)))?;
        // Keep relative joins under the base path
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Network(format!("bad endpoint {}: {}", path, e)))
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn fetch_nonce(&self) -> Result<Nonce, ClientError> {
        let text = self
            .client
            .get(self.endpoint("api/nonce")?)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Nonce::parse(&text).map_err(|e| ClientError::Network(format!("malformed nonce: {}", e)))
    }

    async fn verify(&self, message: &str, signature: &Signature) -> Result<u16, ClientError> {
        let body = VerifyRequest {
            message: message.to_string(),
            signature: signature.to_string(),
        };
        let resp = self
            .client
            .post(self.endpoint("api/verify")?)
            .json(&body)
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }

    async fn me(&self) -> Result<Option<Address>, ClientError> {
        let me: MeResponse = self
            .client
            .get(self.endpoint("api/me")?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(me.address)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.client.get(self.endpoint("api/logout")?).send().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_resolve_under_base_path() {
        let backend = HttpAuthBackend::new("http://localhost:8081/auth").unwrap();
        assert_eq!(
            backend.endpoint("api/nonce").unwrap().as_str(),
            "http://localhost:8081/auth/api/nonce"
        );

        let backend = HttpAuthBackend::new("http://localhost:8081").unwrap();
        assert_eq!(
            backend.endpoint("api/me").unwrap().as_str(),
            "http://localhost:8081/api/me"
        );
    }

    #[test]
    fn test_bad_base_url() {
        assert!(matches!(
            HttpAuthBackend::new("not a url"),
            Err(ClientError::Network(_))
        ));
    }
}
