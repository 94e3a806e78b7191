// client/src/lib.rs
//! Client side of the Sign-In with Ethereum handshake.
pub mod agent;
pub mod backend;
pub mod config;
pub mod error;
pub mod state;
pub mod wallet;

pub use agent::{ClientAgent, Notifier, TracingNotifier, VERIFICATION_ALERT};
pub use backend::{AuthBackend, HttpAuthBackend};
pub use self::config::ClientConfig;
pub use error::ClientError;
pub use state::{ClientState, Phase};
pub use wallet::{LocalWallet, Wallet, WalletError};
