//! # Recoverable Signatures
//!
//! A 65-byte `r || s || v` secp256k1 signature, and the one operation the
//! ledger needs from it: given a 32-byte digest, who signed this?
//!
//! ## Strictness
//!
//! We reject high-`s` signatures. For every valid `(r, s)` there is a twin
//! `(r, n - s)` that verifies just as well; accepting both would let a
//! relayer mint a second, different-looking signature for the same permit.
//! `v` may be given as `0/1` or `27/28`.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::address_from_verifying_key;
use crate::config::SIGNATURE_LENGTH;
use crate::types::Address;

/// Errors during signature parsing or recovery.
///
/// Intentionally vague — callers only learn "nope", never why.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature bytes: expected {SIGNATURE_LENGTH} bytes")]
    InvalidLength,

    #[error("malformed signature")]
    Malformed,

    #[error("signer recovery failed")]
    RecoveryFailed,

    #[error("signing failed")]
    SigningFailed,
}

/// A 65-byte recoverable ECDSA signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverableSignature {
    #[serde(with = "hex_bytes")]
    bytes: Vec<u8>,
}

impl RecoverableSignature {
    /// Wraps wire bytes after a length check. Content is validated lazily at
    /// recovery time.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(SignatureError::InvalidLength);
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Parses a hex string (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|_| SignatureError::Malformed)?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn from_parts(signature: &Signature, recovery_id: RecoveryId) -> Self {
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(27 + recovery_id.to_byte());
        Self { bytes }
    }

    /// Raw `r || s || v` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes))
    }

    fn split(&self) -> Result<(Signature, RecoveryId), SignatureError> {
        if self.bytes.len() != SIGNATURE_LENGTH {
            return Err(SignatureError::InvalidLength);
        }
        let signature =
            Signature::from_slice(&self.bytes[..64]).map_err(|_| SignatureError::Malformed)?;
        if signature.normalize_s().is_some() {
            return Err(SignatureError::Malformed);
        }
        let v = match self.bytes[64] {
            27 | 28 => self.bytes[64] - 27,
            0 | 1 => self.bytes[64],
            _ => return Err(SignatureError::Malformed),
        };
        let recovery_id = RecoveryId::from_byte(v).ok_or(SignatureError::Malformed)?;
        Ok((signature, recovery_id))
    }
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoverableSignature({})", self.to_hex())
    }
}

/// Recovers the address that produced `signature` over `digest`.
pub fn recover_signer(
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> Result<Address, SignatureError> {
    let (sig, recovery_id) = signature.split()?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    Ok(address_from_verifying_key(&key))
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let trimmed = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(trimmed).map_err(serde::de::Error::custom)
    }
}
