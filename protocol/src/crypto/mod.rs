//! # Cryptographic Primitives for Aegis
//!
//! Everything signature- or digest-shaped in the ledger flows through here.
//!
//! We deliberately chose boring, well-audited cryptography:
//!
//! - **secp256k1 ECDSA** with public-key recovery — a permit carries only a
//!   signature, and the ledger has to work out *who* signed it.
//! - **Keccak-256** for structured-data digests and role identifiers.
//! - **BLAKE3** for state fingerprints, where nobody outside this process
//!   needs to reproduce the bytes.
//!
//! Nothing here is hand-rolled. These are thin, typed wrappers around the
//! `k256`, `sha3` and `blake3` crates.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, keccak256};
pub use keys::{address_from_verifying_key, AegisKeypair};
pub use signatures::{recover_signer, RecoverableSignature, SignatureError};
