// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Aegis Protocol — Core Library
//!
//! The primitives the Aegis token ledger is built from. Nothing in here knows
//! what a mint or a deny-list is; this crate only knows how to name an
//! account, count money without wrapping, hash things, recover who signed
//! something, and put bytes on disk without tearing them in half.
//!
//! ## Architecture
//!
//! - **types** — `Address` (20 bytes, with a null value) and `Amount` (256-bit
//!   unsigned). The two types every other module passes around.
//! - **crypto** — Keccak-256 digests, BLAKE3 fingerprints, secp256k1 keys and
//!   recoverable signatures. Thin wrappers over audited crates.
//! - **config** — Network identifiers, signing-domain constants, and the
//!   per-token configuration file.
//! - **storage** — sled-backed persistence for the versioned state blob and
//!   the event journal.
//!
//! ## Design Philosophy
//!
//! 1. Fixed-width money, checked arithmetic. `U256::MAX` means "infinite",
//!    never "oops".
//! 2. Account identity is derived from keys the same way everywhere: the
//!    last 20 bytes of Keccak-256 over the uncompressed public key.
//! 3. Storage writes are atomic or they don't happen.

pub mod config;
pub mod crypto;
pub mod storage;
pub mod types;

pub use types::{Address, Amount};
