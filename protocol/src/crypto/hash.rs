//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **Keccak-256** — the digest behind permit signatures, the signing
//!   domain, role identifiers, and address derivation. Wallets expect exactly
//!   this function, so this is what we use wherever a signature is involved.
//!
//! - **BLAKE3** — state fingerprints. Internal only, and fast.

use sha3::{Digest, Keccak256};

/// Compute the Keccak-256 hash of the input data.
///
/// Note this is the original Keccak padding, not NIST SHA3-256. The two
/// differ in one byte of padding and produce unrelated digests.
///
/// # Example
///
/// ```
/// use aegis_protocol::crypto::keccak256;
///
/// let hash = keccak256(b"");
/// assert_eq!(hash[0], 0xc5);
/// ```
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Keccak-256 over the concatenation of several byte strings, without
/// allocating the concatenation first.
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}
