// client/src/agent.rs
//! Handshake driver: nonce, sign, verify, session.
//!
//! State lives in a `watch` channel and is only ever changed with
//! `send_modify`/`send_if_modified`, so concurrent callers merge into the
//! latest value instead of overwriting each other. Every sign-in takes an
//! attempt ticket; `sign_out` (or a newer attempt) invalidates it, and a
//! result carrying a stale ticket is dropped.
use siwe_common::{Address, Nonce, SignInMessage, Signature};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::backend::AuthBackend;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::state::ClientState;
use crate::wallet::Wallet;

/// Text of the alert raised when the backend rejects a signature
pub const VERIFICATION_ALERT: &str = "There was an error verifying your signature.";

/// Surface for user-visible alerts
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Notifier that writes alerts to the log
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn alert(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

pub struct ClientAgent {
    config: ClientConfig,
    backend: Arc<dyn AuthBackend>,
    wallet: Arc<dyn Wallet>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<ClientState>,
}

impl ClientAgent {
    pub fn new(config: ClientConfig, backend: Arc<dyn AuthBackend>, wallet: Arc<dyn Wallet>) -> Self {
        let (state, _) = watch::channel(ClientState::default());
        Self {
            config,
            backend,
            wallet,
            notifier: Arc::new(TracingNotifier),
            state,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ClientState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Run the full handshake for the connected wallet.
    pub async fn sign_in(&self) -> Result<Address, ClientError> {
        let (address, chain_id) = match (self.wallet.address(), self.wallet.chain_id()) {
            (Some(address), Some(chain_id)) => (address, chain_id),
            _ => return Err(ClientError::WalletNotConnected),
        };

        // A session for another account does not cover this wallet
        let current = self.state.borrow().address;
        if current == Some(address) {
            return Ok(address);
        }

        let mut ticket = None;
        self.state.send_if_modified(|s| {
            if s.loading {
                return false;
            }
            s.loading = true;
            s.error = None;
            s.attempt += 1;
            ticket = Some(s.attempt);
            true
        });
        let Some(attempt) = ticket else {
            tracing::debug!("Ignoring sign-in while another attempt is running");
            return Err(ClientError::AlreadyInProgress);
        };

        let result = self.handshake(attempt, address, chain_id).await;

        let applied = self.state.send_if_modified(|s| {
            if s.attempt != attempt {
                return false;
            }
            s.loading = false;
            match &result {
                Ok(address) => {
                    s.address = Some(*address);
                    s.error = None;
                }
                Err(e) => s.error = Some(e.clone()),
            }
            true
        });

        match &result {
            Ok(address) if applied => tracing::info!("Signed in as {}", address),
            Ok(_) => tracing::debug!("Sign-in attempt {} finished after being superseded", attempt),
            Err(e) => tracing::warn!("Sign-in attempt {} failed: {}", attempt, e),
        }
        if !applied && result.is_ok() {
            return Err(ClientError::Cancelled);
        }
        result
    }

    async fn handshake(&self, attempt: u64, address: Address, chain_id: u64) -> Result<Address, ClientError> {
        let nonce = self.cancellable(attempt, self.backend.fetch_nonce()).await??;

        let message = self.build_message(address, chain_id, nonce)?.to_string();

        let signature = self.cancellable(attempt, self.request_signature(&message)).await??;

        let status = self
            .cancellable(attempt, self.backend.verify(&message, &signature))
            .await??;
        if !(200..300).contains(&status) {
            self.notifier.alert(VERIFICATION_ALERT);
            return Err(ClientError::VerificationFailed { status });
        }

        Ok(address)
    }

    fn build_message(&self, address: Address, chain_id: u64, nonce: Nonce) -> Result<SignInMessage, ClientError> {
        let (domain, uri) = self.config.message_origin()?;
        let message = SignInMessage::new(domain, address, uri, chain_id, nonce)?
            .with_statement(self.config.statement.clone())?;
        Ok(message)
    }

    async fn request_signature(&self, message: &str) -> Result<Signature, ClientError> {
        let sign = self.wallet.sign_message(message);
        let signed = match self.config.signature_timeout() {
            Some(limit) => tokio::time::timeout(limit, sign)
                .await
                .map_err(|_| ClientError::Timeout(limit))?,
            None => sign.await,
        };
        Ok(signed?)
    }

    /// Race `fut` against invalidation of `attempt`.
    async fn cancellable<F: Future>(&self, attempt: u64, fut: F) -> Result<F::Output, ClientError> {
        let mut rx = self.state.subscribe();
        tokio::select! {
            out = fut => Ok(out),
            _ = rx.wait_for(|s| s.attempt != attempt) => Err(ClientError::Cancelled),
        }
    }

    /// Log out on the backend, then clear local state regardless of the outcome.
    pub async fn sign_out(&self) {
        // Invalidate any in-flight attempt first so it cannot land afterwards
        self.state.send_modify(|s| s.attempt += 1);

        if let Err(e) = self.backend.logout().await {
            tracing::warn!("Logout request failed: {}", e);
        }

        self.state.send_modify(|s| {
            *s = ClientState {
                attempt: s.attempt + 1,
                ..ClientState::default()
            };
        });
        tracing::info!("Signed out");
    }

    /// Ask the backend who we are and adopt an existing session.
    ///
    /// Never demotes an authenticated state and never touches a sign-in in
    /// progress.
    pub async fn probe_session(&self) -> Result<Option<Address>, ClientError> {
        let attempt = self.state.borrow().attempt;

        let address = match self.backend.me().await {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!("Session probe failed: {}", e);
                return Err(e);
            }
        };

        if let Some(found) = address {
            self.state.send_if_modified(|s| {
                if s.attempt != attempt || s.loading || s.address == Some(found) {
                    return false;
                }
                s.address = Some(found);
                s.error = None;
                true
            });
        }
        Ok(address)
    }

    /// Probe once, then again on every focus event until the sender is dropped.
    pub async fn run_session_sync(&self, mut focus_events: mpsc::Receiver<()>) {
        let _ = self.probe_session().await;
        while focus_events.recv().await.is_some() {
            let _ = self.probe_session().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use crate::wallet::{LocalWallet, WalletError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[derive(Default)]
    struct FakeBackend {
        nonce: Mutex<Option<Result<String, ClientError>>>,
        verify_status: Mutex<u16>,
        session: Mutex<Option<Address>>,
        fail_me: Mutex<bool>,
        verified: Mutex<Vec<(String, Signature)>>,
        logouts: Mutex<usize>,
    }

    impl FakeBackend {
        fn new(nonce: &str, verify_status: u16) -> Self {
            Self {
                nonce: Mutex::new(Some(Ok(nonce.to_string()))),
                verify_status: Mutex::new(verify_status),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl AuthBackend for FakeBackend {
        async fn fetch_nonce(&self) -> Result<Nonce, ClientError> {
            let nonce = self.nonce.lock().unwrap().clone().expect("nonce configured")?;
            Nonce::parse(&nonce).map_err(|e| ClientError::Network(e.to_string()))
        }

        async fn verify(&self, message: &str, signature: &Signature) -> Result<u16, ClientError> {
            self.verified.lock().unwrap().push((message.to_string(), *signature));
            let status = *self.verify_status.lock().unwrap();
            if (200..300).contains(&status) {
                let address = message.parse::<SignInMessage>().unwrap().address;
                *self.session.lock().unwrap() = Some(address);
            }
            Ok(status)
        }

        async fn me(&self) -> Result<Option<Address>, ClientError> {
            if *self.fail_me.lock().unwrap() {
                return Err(ClientError::Network("connection refused".into()));
            }
            Ok(*self.session.lock().unwrap())
        }

        async fn logout(&self) -> Result<(), ClientError> {
            *self.logouts.lock().unwrap() += 1;
            *self.session.lock().unwrap() = None;
            Err(ClientError::Network("logout endpoint down".into()))
        }
    }

    /// Wallet that waits for `release` before answering.
    struct GatedWallet {
        inner: LocalWallet,
        release: Notify,
        reject: bool,
    }

    #[async_trait]
    impl Wallet for GatedWallet {
        fn address(&self) -> Option<Address> {
            self.inner.address()
        }

        fn chain_id(&self) -> Option<u64> {
            self.inner.chain_id()
        }

        async fn sign_message(&self, message: &str) -> Result<Signature, WalletError> {
            self.release.notified().await;
            if self.reject {
                return Err(WalletError::Rejected("user denied".into()));
            }
            self.inner.sign_message(message).await
        }
    }

    struct DisconnectedWallet;

    #[async_trait]
    impl Wallet for DisconnectedWallet {
        fn address(&self) -> Option<Address> {
            None
        }

        fn chain_id(&self) -> Option<u64> {
            None
        }

        async fn sign_message(&self, _message: &str) -> Result<Signature, WalletError> {
            Err(WalletError::Unavailable("not connected".into()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<String>>);

    impl Notifier for RecordingNotifier {
        fn alert(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn local_wallet() -> Arc<LocalWallet> {
        Arc::new(LocalWallet::from_hex(DEV_KEY, 1).unwrap())
    }

    fn gated_wallet(reject: bool) -> Arc<GatedWallet> {
        Arc::new(GatedWallet {
            inner: LocalWallet::from_hex(DEV_KEY, 1).unwrap(),
            release: Notify::new(),
            reject,
        })
    }

    fn agent(backend: Arc<FakeBackend>, wallet: Arc<dyn Wallet>) -> (ClientAgent, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let agent = ClientAgent::new(ClientConfig::default(), backend, wallet)
            .with_notifier(notifier.clone());
        (agent, notifier)
    }

    #[tokio::test]
    async fn test_successful_sign_in() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let (agent, notifier) = agent(backend.clone(), local_wallet());

        let address = agent.sign_in().await.unwrap();
        assert_eq!(address.to_string(), DEV_ADDRESS);

        let state = agent.state();
        assert_eq!(state.address, Some(address));
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.phase(), Phase::Authenticated);
        assert!(notifier.0.lock().unwrap().is_empty());

        let verified = backend.verified.lock().unwrap();
        assert_eq!(verified.len(), 1);
        let (text, signature) = &verified[0];
        let message: SignInMessage = text.parse().unwrap();
        assert_eq!(message.domain, "localhost:3000");
        assert_eq!(message.uri, "http://localhost:3000");
        assert_eq!(message.chain_id, 1);
        assert_eq!(message.nonce.as_str(), "abc123de");
        assert_eq!(message.statement.as_deref(), Some(siwe_common::DEFAULT_STATEMENT));
        assert_eq!(signature.recover(text.as_bytes()).unwrap(), address);
    }

    #[tokio::test]
    async fn test_verification_rejected() {
        let backend = Arc::new(FakeBackend::new("abc123de", 401));
        let (agent, notifier) = agent(backend, local_wallet());

        let err = agent.sign_in().await.unwrap_err();
        assert_eq!(err, ClientError::VerificationFailed { status: 401 });

        let state = agent.state();
        assert_eq!(state.address, None);
        // The loading flag is reset on this path as well
        assert!(!state.loading);
        assert_eq!(state.error, Some(ClientError::VerificationFailed { status: 401 }));
        assert_eq!(state.phase(), Phase::Error);
        assert_eq!(*notifier.0.lock().unwrap(), vec![VERIFICATION_ALERT.to_string()]);
    }

    #[tokio::test]
    async fn test_nonce_failure_fails_closed() {
        let backend = Arc::new(FakeBackend::default());
        *backend.nonce.lock().unwrap() = Some(Err(ClientError::Network("503".into())));
        let (agent, _) = agent(backend.clone(), local_wallet());

        let err = agent.sign_in().await.unwrap_err();
        assert_eq!(err, ClientError::Network("503".into()));
        assert!(backend.verified.lock().unwrap().is_empty());
        assert_eq!(agent.state().phase(), Phase::Error);
    }

    #[tokio::test]
    async fn test_short_nonce_rejected() {
        let backend = Arc::new(FakeBackend::new("abc123", 200));
        let (agent, _) = agent(backend.clone(), local_wallet());

        assert!(matches!(agent.sign_in().await, Err(ClientError::Network(_))));
        assert!(backend.verified.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_rejection() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let wallet = gated_wallet(true);
        let (agent, _) = agent(backend.clone(), wallet.clone());

        wallet.release.notify_one();
        let err = agent.sign_in().await.unwrap_err();
        assert_eq!(err, ClientError::UserRejected("user denied".into()));
        assert_eq!(agent.state().error, Some(err));
        assert!(backend.verified.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_not_connected() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let (agent, _) = agent(backend, Arc::new(DisconnectedWallet));
        assert_eq!(agent.sign_in().await.unwrap_err(), ClientError::WalletNotConnected);
        assert_eq!(agent.state().phase(), Phase::Anonymous);
    }

    #[tokio::test]
    async fn test_signature_timeout() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let config = ClientConfig {
            signature_timeout_secs: Some(0),
            ..ClientConfig::default()
        };
        let agent = ClientAgent::new(config, backend, gated_wallet(false));

        let err = agent.sign_in().await.unwrap_err();
        assert_eq!(err, ClientError::Timeout(Duration::from_secs(0)));
        assert!(!agent.state().loading);
    }

    #[tokio::test]
    async fn test_concurrent_sign_in_is_refused() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let wallet = gated_wallet(false);
        let (agent, _) = agent(backend.clone(), wallet.clone());
        let agent = Arc::new(agent);

        let first = tokio::spawn({
            let agent = agent.clone();
            async move { agent.sign_in().await }
        });

        let mut rx = agent.subscribe();
        rx.wait_for(|s| s.loading).await.unwrap();

        assert_eq!(agent.sign_in().await.unwrap_err(), ClientError::AlreadyInProgress);

        wallet.release.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(backend.verified.lock().unwrap().len(), 1);
        assert!(agent.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_out_cancels_pending_sign_in() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let wallet = gated_wallet(false);
        let (agent, _) = agent(backend.clone(), wallet.clone());
        let agent = Arc::new(agent);

        let pending = tokio::spawn({
            let agent = agent.clone();
            async move { agent.sign_in().await }
        });
        let mut rx = agent.subscribe();
        rx.wait_for(|s| s.loading).await.unwrap();

        agent.sign_out().await;

        assert_eq!(pending.await.unwrap().unwrap_err(), ClientError::Cancelled);
        // The wallet never answered and nothing was submitted
        assert!(backend.verified.lock().unwrap().is_empty());
        assert_eq!(agent.state().phase(), Phase::Anonymous);
        assert_eq!(agent.state().error, None);
    }

    #[tokio::test]
    async fn test_sign_out_clears_state_even_if_logout_fails() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let (agent, _) = agent(backend.clone(), local_wallet());

        agent.sign_in().await.unwrap();
        agent.sign_out().await;

        assert_eq!(*backend.logouts.lock().unwrap(), 1);
        assert_eq!(agent.state().phase(), Phase::Anonymous);
        assert_eq!(agent.probe_session().await.unwrap(), None);
        assert_eq!(agent.state().phase(), Phase::Anonymous);
    }

    #[tokio::test]
    async fn test_probe_adopts_existing_session() {
        let backend = Arc::new(FakeBackend::default());
        let address: Address = DEV_ADDRESS.parse().unwrap();
        *backend.session.lock().unwrap() = Some(address);
        let (agent, _) = agent(backend, local_wallet());

        assert_eq!(agent.probe_session().await.unwrap(), Some(address));
        assert_eq!(agent.state().address, Some(address));
        assert_eq!(agent.state().phase(), Phase::Authenticated);
    }

    #[tokio::test]
    async fn test_sign_in_reuses_session_for_same_wallet() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let address: Address = DEV_ADDRESS.parse().unwrap();
        *backend.session.lock().unwrap() = Some(address);
        let (agent, _) = agent(backend.clone(), local_wallet());

        agent.probe_session().await.unwrap();
        assert_eq!(agent.sign_in().await.unwrap(), address);
        assert!(backend.verified.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_with_other_wallet_runs_handshake() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let other: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        *backend.session.lock().unwrap() = Some(other);
        let (agent, _) = agent(backend.clone(), local_wallet());

        agent.probe_session().await.unwrap();
        assert_eq!(agent.state().address, Some(other));

        let address = agent.sign_in().await.unwrap();
        assert_eq!(address.to_string(), DEV_ADDRESS);
        assert_eq!(agent.state().address, Some(address));
        assert_eq!(backend.verified.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_probe_never_demotes() {
        let backend = Arc::new(FakeBackend::new("abc123de", 200));
        let (agent, _) = agent(backend.clone(), local_wallet());
        agent.sign_in().await.unwrap();

        *backend.session.lock().unwrap() = None;
        assert_eq!(agent.probe_session().await.unwrap(), None);
        assert!(agent.state().is_authenticated());

        *backend.fail_me.lock().unwrap() = true;
        assert!(agent.probe_session().await.is_err());
        assert!(agent.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_session_sync_probes_on_focus() {
        let backend = Arc::new(FakeBackend::default());
        let (agent, _) = agent(backend.clone(), local_wallet());
        let agent = Arc::new(agent);

        let (focus, events) = mpsc::channel(4);
        let sync = tokio::spawn({
            let agent = agent.clone();
            async move { agent.run_session_sync(events).await }
        });

        let address: Address = DEV_ADDRESS.parse().unwrap();
        *backend.session.lock().unwrap() = Some(address);
        focus.send(()).await.unwrap();
        drop(focus);
        sync.await.unwrap();

        assert_eq!(agent.state().address, Some(address));
    }
}
