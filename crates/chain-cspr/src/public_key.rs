//! Casper account public keys.
//!
//! An account is identified by its tag-prefixed public key hex:
//!
//! ```text
//! 01 || ed25519 key (32 bytes)
//! 02 || compressed secp256k1 key (33 bytes)
//! ```
//!
//! The same tag-prefixed bytes are what the deploy header serializes.

use std::fmt;

use crate::error::CsprError;

const ED25519_TAG: u8 = 0x01;
const SECP256K1_TAG: u8 = 0x02;
const ED25519_KEY_LEN: usize = 32;
const SECP256K1_KEY_LEN: usize = 33;

/// A validated Casper account public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublicKey {
    Ed25519([u8; ED25519_KEY_LEN]),
    Secp256k1([u8; SECP256K1_KEY_LEN]),
}

impl PublicKey {
    /// Parse a tag-prefixed hex public key, checking that the key is a valid
    /// point on its curve.
    pub fn from_hex(account_hex: &str) -> Result<Self, CsprError> {
        let bytes = hex::decode(account_hex.trim())
            .map_err(|e| CsprError::InvalidPublicKey(format!("invalid hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Parse tag-prefixed public key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CsprError> {
        let (tag, key) = bytes
            .split_first()
            .ok_or_else(|| CsprError::InvalidPublicKey("empty key".into()))?;

        match *tag {
            ED25519_TAG => {
                let key: [u8; ED25519_KEY_LEN] = key.try_into().map_err(|_| {
                    CsprError::InvalidPublicKey(format!(
                        "ed25519 key must be {ED25519_KEY_LEN} bytes, got {}",
                        key.len()
                    ))
                })?;
                ed25519_dalek::VerifyingKey::from_bytes(&key)
                    .map_err(|e| CsprError::InvalidPublicKey(format!("ed25519: {e}")))?;
                Ok(PublicKey::Ed25519(key))
            }
            SECP256K1_TAG => {
                let key: [u8; SECP256K1_KEY_LEN] = key.try_into().map_err(|_| {
                    CsprError::InvalidPublicKey(format!(
                        "secp256k1 key must be {SECP256K1_KEY_LEN} bytes, got {}",
                        key.len()
                    ))
                })?;
                k256::PublicKey::from_sec1_bytes(&key)
                    .map_err(|e| CsprError::InvalidPublicKey(format!("secp256k1: {e}")))?;
                Ok(PublicKey::Secp256k1(key))
            }
            other => Err(CsprError::InvalidPublicKey(format!("unknown key tag {other:02x}"))),
        }
    }

    /// Tag-prefixed key bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (tag, key): (u8, &[u8]) = match self {
            PublicKey::Ed25519(key) => (ED25519_TAG, key),
            PublicKey::Secp256k1(key) => (SECP256K1_TAG, key),
        };
        let mut out = Vec::with_capacity(1 + key.len());
        out.push(tag);
        out.extend_from_slice(key);
        out
    }

    /// Tag-prefixed lowercase hex, the form used in deploy JSON.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
