//! # Upgrade Coordinator
//!
//! The token is upgraded the way deployed logic is upgraded: swap the code,
//! keep the storage. In-process that means the state is captured as a
//! versioned layout, run through an explicit migration, and restored.
//!
//! ## Layout rules
//!
//! - A layout version never changes once shipped. New storage is appended in
//!   a new version that *embeds* the previous one as `base`.
//! - Migrations go one version at a time and run exactly once. The schema
//!   version stored with the state is the re-initializer guard: asking to
//!   reach a version the state already has fails with `AlreadyInitialized`.
//!
//! | Version | Adds                                                   |
//! |---------|--------------------------------------------------------|
//! | 1       | metadata, owner, blocked set, balances, allowances,    |
//! |         | total supply, nonces, chain id, token address, domain  |
//! | 2       | role memberships                                       |
//!
//! [`LayoutV1::fingerprint`] hashes the version-1 portion. A migration must
//! leave it unchanged; the tests check exactly that.

use aegis_protocol::config::{SCHEMA_VERSION_OWNER_ONLY, SCHEMA_VERSION_ROLE_BASED};
use aegis_protocol::crypto::blake3_hash;
use aegis_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::authorization::RoleRegistry;
use crate::error::{TokenError, TokenResult};

/// The newest schema this build understands.
pub const LATEST_SCHEMA_VERSION: u32 = SCHEMA_VERSION_ROLE_BASED;

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

/// Storage of the owner-only token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutV1 {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub owner: Address,
    pub blocked: BTreeSet<Address>,
    pub balances: BTreeMap<Address, Amount>,
    pub allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    pub total_supply: Amount,
    pub nonces: BTreeMap<Address, u64>,
    pub chain_id: u64,
    pub token_address: Address,
    pub domain_separator: [u8; 32],
}

impl LayoutV1 {
    /// BLAKE3 over the canonical bincode encoding.
    pub fn fingerprint(&self) -> Result<[u8; 32], bincode::Error> {
        let encoded = bincode::serialize(self)?;
        Ok(blake3_hash(&encoded))
    }
}

/// Version 1 plus role memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutV2 {
    pub base: LayoutV1,
    pub roles: RoleRegistry,
}

/// Persisted token state, tagged with its layout version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionedState {
    V1(LayoutV1),
    V2(LayoutV2),
}

impl VersionedState {
    pub fn schema_version(&self) -> u32 {
        match self {
            VersionedState::V1(_) => SCHEMA_VERSION_OWNER_ONLY,
            VersionedState::V2(_) => SCHEMA_VERSION_ROLE_BASED,
        }
    }

    /// The version-1 portion, present in every layout.
    pub fn base(&self) -> &LayoutV1 {
        match self {
            VersionedState::V1(base) => base,
            VersionedState::V2(layout) => &layout.base,
        }
    }

    /// Role memberships, if the layout has them.
    pub fn roles(&self) -> Option<&RoleRegistry> {
        match self {
            VersionedState::V1(_) => None,
            VersionedState::V2(layout) => Some(&layout.roles),
        }
    }

    pub fn fingerprint(&self) -> Result<[u8; 32], bincode::Error> {
        self.base().fingerprint()
    }
}

// ---------------------------------------------------------------------------
// Guards & migrations
// ---------------------------------------------------------------------------

/// Re-initializer guard: passes only when `current` is below `target`.
pub fn reinitializer(current: u32, target: u32) -> TokenResult<()> {
    if current >= target {
        return Err(TokenError::AlreadyInitialized(current));
    }
    Ok(())
}

/// Version 1 → 2. The role registry starts empty; the owner seeds it with
/// `bootstrap_admin_role` afterwards.
pub fn migrate_v1_to_v2(base: LayoutV1) -> LayoutV2 {
    LayoutV2 {
        base,
        roles: RoleRegistry::new(),
    }
}

/// Moves `state` one version forward.
///
/// # Errors
///
/// [`TokenError::AlreadyInitialized`] when `state` is already at the latest
/// version.
pub fn migrate(state: VersionedState) -> TokenResult<VersionedState> {
    match state {
        VersionedState::V1(base) => {
            tracing::info!(
                from = SCHEMA_VERSION_OWNER_ONLY,
                to = SCHEMA_VERSION_ROLE_BASED,
                "migrating token layout"
            );
            Ok(VersionedState::V2(migrate_v1_to_v2(base)))
        }
        VersionedState::V2(_) => Err(TokenError::AlreadyInitialized(LATEST_SCHEMA_VERSION)),
    }
}
