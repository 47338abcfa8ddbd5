//! # Protocol Configuration & Constants
//!
//! Every magic number in Aegis lives here. If you're hardcoding a chain ID or
//! a type string somewhere else, you're doing it wrong.
//!
//! The signing-domain constants in particular are consensus-critical in the
//! only sense that matters for a token: change one byte and every permit ever
//! signed stops verifying.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::Address;

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Mainnet chain identifier. Bound into every permit's signing domain.
pub const CHAIN_ID_MAINNET: u64 = 0x4145_4753; // "AEGS"

/// Testnet chain identifier.
pub const CHAIN_ID_TESTNET: u64 = 0x4145_4754; // "AEGT"

/// Devnet chain identifier. The default for local runs.
pub const CHAIN_ID_DEVNET: u64 = 0x4145_4744; // "AEGD"

/// Resolves a network name to its chain ID.
pub fn chain_id_for(network: &str) -> Option<u64> {
    match network.to_ascii_lowercase().as_str() {
        "mainnet" => Some(CHAIN_ID_MAINNET),
        "testnet" => Some(CHAIN_ID_TESTNET),
        "devnet" => Some(CHAIN_ID_DEVNET),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Delegated Approval Domain
// ---------------------------------------------------------------------------

/// Version string bound into the permit signing domain. Fixed for the life of
/// the token; the authorization upgrade does not touch it.
pub const PERMIT_DOMAIN_VERSION: &str = "1";

/// Type string of the signing domain.
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Type string of a permit message.
pub const PERMIT_TYPE: &str =
    "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

/// Prefix bytes of a structured-data digest: `0x19 0x01`.
pub const STRUCTURED_DATA_PREFIX: [u8; 2] = [0x19, 0x01];

/// Signature length on the wire: `r (32) || s (32) || v (1)`.
pub const SIGNATURE_LENGTH: usize = 65;

// ---------------------------------------------------------------------------
// Token Parameters
// ---------------------------------------------------------------------------

/// Default decimal precision when a config omits it.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Upper bound on decimals. 10^36 still leaves a U256 with ~40 digits of
/// headroom for the integer part.
pub const MAX_DECIMALS: u8 = 36;

/// Schema version written by the initial (owner-only) release.
pub const SCHEMA_VERSION_OWNER_ONLY: u32 = 1;

/// Schema version written once the role-based authorization is installed.
pub const SCHEMA_VERSION_ROLE_BASED: u32 = 2;

// ---------------------------------------------------------------------------
// TokenConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`TokenConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

fn default_chain_id() -> u64 {
    CHAIN_ID_DEVNET
}

/// Deployment parameters of a single token.
///
/// `token_address` is the token's own identity: it is bound into the permit
/// domain and is the destination transfers are refused for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Human-readable name, e.g. "Aegis Dollar".
    pub name: String,
    /// Ticker, e.g. "AUSD".
    pub symbol: String,
    /// Decimal places.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Chain the token lives on.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// The token's own address.
    pub token_address: Address,
}

impl TokenConfig {
    /// Reads a JSON config from disk and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: TokenConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants a deployable token must satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".into()));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "decimals {} exceeds maximum {}",
                self.decimals, MAX_DECIMALS
            )));
        }
        if self.token_address.is_zero() {
            return Err(ConfigError::Invalid(
                "token_address must not be the null address".into(),
            ));
        }
        Ok(())
    }

    /// A ready-to-use devnet config. Tests lean on this heavily.
    pub fn devnet(name: &str, symbol: &str, token_address: Address) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals: DEFAULT_DECIMALS,
            chain_id: CHAIN_ID_DEVNET,
            token_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn chain_ids_are_distinct() {
        assert_ne!(CHAIN_ID_MAINNET, CHAIN_ID_TESTNET);
        assert_ne!(CHAIN_ID_TESTNET, CHAIN_ID_DEVNET);
        assert_eq!(chain_id_for("DevNet"), Some(CHAIN_ID_DEVNET));
        assert_eq!(chain_id_for("moonnet"), None);
    }

    #[test]
    fn devnet_config_validates() {
        let cfg = TokenConfig::devnet("Aegis Dollar", "AUSD", Address::from_low_u8(0xaa));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_null_token_address() {
        let cfg = TokenConfig::devnet("Aegis Dollar", "AUSD", Address::ZERO);
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_excessive_decimals() {
        let mut cfg = TokenConfig::devnet("A", "A", Address::from_low_u8(1));
        cfg.decimals = 40;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name":"Aegis Dollar","symbol":"AUSD","token_address":"0x00000000000000000000000000000000000000aa"}}"#
        )
        .unwrap();
        let cfg = TokenConfig::load(file.path()).unwrap();
        assert_eq!(cfg.decimals, DEFAULT_DECIMALS);
        assert_eq!(cfg.chain_id, CHAIN_ID_DEVNET);
        assert_eq!(cfg.token_address, Address::from_low_u8(0xaa));
    }
}
