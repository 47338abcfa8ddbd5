//! # Key Management
//!
//! secp256k1 keypairs for Aegis accounts.
//!
//! An account address is the last 20 bytes of Keccak-256 over the 64-byte
//! uncompressed public key (the `0x04` tag stripped). That derivation is the
//! whole reason for using secp256k1 here: a permit signature lets anyone
//! recover the public key, and from the public key, the address. No key
//! registry required.
//!
//! ## Security considerations
//!
//! - Secret scalars are zeroized on drop (thanks, `k256`).
//! - Key generation uses the OS RNG.
//! - Key bytes are never logged.

use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::hash::keccak256;
use super::signatures::{RecoverableSignature, SignatureError};
use crate::types::Address;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,
}

/// Derives the account address controlled by a public key.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address::new(out)
}

/// An Aegis account keypair.
///
/// Deliberately not `Serialize`. Exporting a secret should be an explicit
/// call to [`secret_key_hex`](Self::secret_key_hex), not a side effect of
/// dumping a struct to JSON.
#[derive(Clone)]
pub struct AegisKeypair {
    signing_key: SigningKey,
}

impl AegisKeypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Reconstructs a keypair from a 32-byte secret scalar.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, KeyError> {
        let signing_key = SigningKey::from_slice(secret).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Reconstructs a keypair from a hex-encoded secret (with or without
    /// `0x`). Convenient for devnet; use a real key store anywhere else.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let trimmed = hex_str.trim().strip_prefix("0x").unwrap_or(hex_str.trim());
        let bytes = hex::decode(trimmed).map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_bytes(&bytes)
    }

    /// Deterministic keypair from a small seed. Test fixtures only: the
    /// resulting keys are trivially guessable.
    pub fn from_seed(seed: u8) -> Result<Self, KeyError> {
        let mut secret = [0u8; 32];
        secret[31] = seed.max(1);
        secret[0] = 0x11;
        Self::from_bytes(&secret)
    }

    /// The account address this keypair controls.
    pub fn address(&self) -> Address {
        address_from_verifying_key(self.signing_key.verifying_key())
    }

    /// The public verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Signs a 32-byte prehashed digest, producing a recoverable signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<RecoverableSignature, SignatureError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|_| SignatureError::SigningFailed)?;
        Ok(RecoverableSignature::from_parts(&signature, recovery_id))
    }

    /// Hex-encoded secret scalar. Handle with care.
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl std::fmt::Debug for AegisKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AegisKeypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
