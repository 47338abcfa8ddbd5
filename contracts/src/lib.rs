//! # Aegis Token Contracts
//!
//! A single-asset, account-balance token with administrative controls that
//! can change shape after deployment. The pieces, leaf to root:
//!
//! - **Deny-List** — owner-controlled set of blocked accounts, consulted as
//!   a guard on the transfer paths.
//! - **Authorization** — who may mint, burn, and administer. Starts as
//!   owner-only, can be upgraded once to role-based.
//! - **Ledger** — balances, allowances, permit nonces, total supply.
//! - **Permit** — signed, relayable approvals with per-owner nonces and a
//!   deadline.
//! - **Upgrade** — versioned state layouts and the one-shot migration
//!   between them.
//! - **Token** — the aggregate that owns all of the above and decides which
//!   guard runs where.
//! - **Service** — a lock-guarded, optionally persistent `Token` with a
//!   single writer.
//!
//! ## Design Principles
//!
//! 1. All monetary operations use checked arithmetic on 256-bit amounts.
//!    `Amount::MAX` is a sentinel ("infinite allowance"), never a wrap.
//! 2. Validate first, write last. A failed call changes nothing and emits
//!    nothing.
//! 3. The caller is a parameter. Nothing reads an ambient sender.
//! 4. Storage is append-only across versions: fields are added in new
//!    layouts, never reordered or removed.

pub mod authorization;
pub mod deny_list;
pub mod error;
pub mod events;
pub mod ledger;
pub mod permit;
pub mod service;
pub mod token;
pub mod upgrade;

pub use authorization::{AuthorizationVariant, Role};
pub use error::{ErrorKind, TokenError, TokenResult};
pub use events::{EventRecord, TokenEvent};
pub use service::{ServiceError, TokenService};
pub use token::{Token, TokenCall};
