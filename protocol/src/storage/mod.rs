//! # Storage Module
//!
//! Persistent storage for an Aegis token: one versioned state blob plus an
//! append-only event journal, both in sled.
//!
//! ## Design Decisions
//!
//! 1. **Bincode for on-disk serialization.** Compact, fast, deterministic.
//!    JSON is for config files and debugging; bincode is for storage.
//!
//! 2. **The blob carries its own version.** The store records the schema
//!    version next to the blob, but decoding the right layout is the token's
//!    job. The store never migrates anything.
//!
//! 3. **One commit, one transaction.** State and journal move together.

pub mod db;

pub use db::{DbError, DbResult, TokenDB};
