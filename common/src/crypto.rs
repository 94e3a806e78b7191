// common/src/crypto.rs
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::address::Address;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature must be 0x-prefixed hex")]
    MissingPrefix,
    #[error("signature contains non-hex characters")]
    InvalidHex,
    #[error("signature must decode to 65 bytes, got {0}")]
    InvalidLength(usize),
    #[error("signature recovery id must be 0/1 or 27/28, got {0}")]
    InvalidRecoveryId(u8),
    #[error("invalid private key")]
    InvalidKey,
    #[error("ecdsa failure: {0}")]
    Ecdsa(#[from] k256::ecdsa::Error),
}

/// Keccak-256 as used by Ethereum (not NIST SHA3-256).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// EIP-191 `personal_sign` digest of a message.
pub fn eip191_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

/// Load a secp256k1 signing key from (optionally 0x-prefixed) hex.
pub fn signing_key_from_hex(private_key: &str) -> Result<SigningKey, SignatureError> {
    let trimmed = private_key.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|_| SignatureError::InvalidHex)?;
    SigningKey::from_slice(&bytes).map_err(|_| SignatureError::InvalidKey)
}

/// 65-byte recoverable signature laid out as `r || s || v`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 65]);

impl Signature {
    pub const fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Sign `message` the way wallets do for `personal_sign`.
    pub fn sign_personal(key: &SigningKey, message: &[u8]) -> Result<Self, SignatureError> {
        let prehash = eip191_hash(message);
        let (sig, recid) = key.sign_prehash_recoverable(&prehash)?;
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&sig.to_bytes());
        bytes[64] = recid.to_byte() + 27;
        Ok(Self(bytes))
    }

    /// Recover the address that produced this signature over `message`.
    pub fn recover(&self, message: &[u8]) -> Result<Address, SignatureError> {
        let sig = EcdsaSignature::try_from(&self.0[..64])?;
        let recovery_id = normalize_recovery_id(self.0[64])?;
        let prehash = eip191_hash(message);
        let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recovery_id)?;
        Ok(address_from_verifying_key(&key))
    }
}

fn normalize_recovery_id(raw: u8) -> Result<RecoveryId, SignatureError> {
    let id = match raw {
        27 | 28 => raw - 27,
        0 | 1 => raw,
        _ => return Err(SignatureError::InvalidRecoveryId(raw)),
    };
    RecoveryId::from_byte(id).ok_or(SignatureError::InvalidRecoveryId(raw))
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().strip_prefix("0x").ok_or(SignatureError::MissingPrefix)?;
        let bytes = hex::decode(digits).map_err(|_| SignatureError::InvalidHex)?;
        let bytes: [u8; 65] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| SignatureError::InvalidLength(b.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (hardhat/anvil account #0)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_address_from_key() {
        let key = signing_key_from_hex(DEV_KEY).unwrap();
        let address = address_from_verifying_key(key.verifying_key());
        assert_eq!(address.to_string(), DEV_ADDRESS);
    }

    #[test]
    fn test_sign_and_recover() {
        let key = signing_key_from_hex(DEV_KEY).unwrap();
        let sig = Signature::sign_personal(&key, b"hello siwe").unwrap();
        assert!(sig.as_bytes()[64] == 27 || sig.as_bytes()[64] == 28);
        assert_eq!(sig.recover(b"hello siwe").unwrap().to_string(), DEV_ADDRESS);
    }

    #[test]
    fn test_tampered_signature_does_not_recover_signer() {
        let key = signing_key_from_hex(DEV_KEY).unwrap();
        let sig = Signature::sign_personal(&key, b"hello siwe").unwrap();

        let mut bytes = *sig.as_bytes();
        bytes[10] ^= 0x01;
        let tampered = Signature::from_bytes(bytes);
        match tampered.recover(b"hello siwe") {
            Ok(address) => assert_ne!(address.to_string(), DEV_ADDRESS),
            Err(_) => {}
        }
    }

    #[test]
    fn test_different_message_recovers_other_address() {
        let key = signing_key_from_hex(DEV_KEY).unwrap();
        let sig = Signature::sign_personal(&key, b"hello siwe").unwrap();
        if let Ok(address) = sig.recover(b"hello siwf") {
            assert_ne!(address.to_string(), DEV_ADDRESS);
        }
    }

    #[test]
    fn test_hex_parsing() {
        let key = signing_key_from_hex(DEV_KEY).unwrap();
        let sig = Signature::sign_personal(&key, b"msg").unwrap();
        let text = sig.to_string();
        assert_eq!(text.len(), 132);
        assert_eq!(text.parse::<Signature>().unwrap(), sig);

        assert!(matches!("abcd".parse::<Signature>(), Err(SignatureError::MissingPrefix)));
        assert!(matches!("0xzz".parse::<Signature>(), Err(SignatureError::InvalidHex)));
        assert!(matches!(
            "0xabcd".parse::<Signature>(),
            Err(SignatureError::InvalidLength(2))
        ));
    }

    #[test]
    fn test_recovery_id_rejected() {
        let mut bytes = [1u8; 65];
        bytes[64] = 5;
        assert!(matches!(
            Signature::from_bytes(bytes).recover(b"x"),
            Err(SignatureError::InvalidRecoveryId(5))
        ));
    }
}
