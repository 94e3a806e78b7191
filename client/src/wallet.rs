// client/src/wallet.rs
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use siwe_common::crypto::{address_from_verifying_key, signing_key_from_hex};
use siwe_common::{Address, Signature};
use thiserror::Error;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The user declined the signature request
    #[error("user rejected the request: {0}")]
    Rejected(String),
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

impl From<WalletError> for ClientError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Rejected(reason) => ClientError::UserRejected(reason),
            WalletError::Unavailable(reason) => ClientError::Wallet(reason),
        }
    }
}

/// A connected wallet that can sign `personal_sign` messages.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Currently connected account, if any
    fn address(&self) -> Option<Address>;

    /// Chain the wallet is connected to, if any
    fn chain_id(&self) -> Option<u64>;

    /// May wait indefinitely for user approval.
    async fn sign_message(&self, message: &str) -> Result<Signature, WalletError>;
}

/// Wallet backed by an in-process private key. Signs without prompting.
pub struct LocalWallet {
    key: SigningKey,
    address: Address,
    chain_id: u64,
}

impl LocalWallet {
    pub fn new(key: SigningKey, chain_id: u64) -> Self {
        let address = address_from_verifying_key(key.verifying_key());
        Self { key, address, chain_id }
    }

    pub fn from_hex(private_key: &str, chain_id: u64) -> Result<Self, WalletError> {
        let key = signing_key_from_hex(private_key)
            .map_err(|e| WalletError::Unavailable(e.to_string()))?;
        Ok(Self::new(key, chain_id))
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    fn address(&self) -> Option<Address> {
        Some(self.address)
    }

    fn chain_id(&self) -> Option<u64> {
        Some(self.chain_id)
    }

    async fn sign_message(&self, message: &str) -> Result<Signature, WalletError> {
        Signature::sign_personal(&self.key, message.as_bytes())
            .map_err(|e| WalletError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_wallet_signs_recoverably() {
        let wallet = LocalWallet::from_hex(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            1,
        )
        .unwrap();
        let address = wallet.address().unwrap();
        assert_eq!(address.to_string(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

        let signature = wallet.sign_message("hello").await.unwrap();
        assert_eq!(signature.recover(b"hello").unwrap(), address);
    }

    #[test]
    fn test_bad_key() {
        assert!(matches!(
            LocalWallet::from_hex("0xnothex", 1),
            Err(WalletError::Unavailable(_))
        ));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ClientError::from(WalletError::Rejected("nope".into())),
            ClientError::UserRejected("nope".into())
        );
    }
}
