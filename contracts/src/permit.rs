//! # Delegated Approval (Permit)
//!
//! An allowance owner signs a structured message off-line; anyone can relay
//! it. The token rebuilds the digest, recovers the signer, and if that is
//! the claimed owner, sets the allowance exactly as `approve` would.
//!
//! ## Digest
//!
//! ```text
//! domain    = keccak(DOMAIN_TYPE_HASH || keccak(name) || keccak("1")
//!                    || chainId || verifyingContract)
//! structure = keccak(PERMIT_TYPE_HASH || owner || spender || value
//!                    || nonce || deadline)
//! digest    = keccak(0x19 0x01 || domain || structure)
//! ```
//!
//! Every field is a 32-byte big-endian word; addresses are left-padded.
//!
//! The domain separator depends only on name, version, chain, and token
//! address. It is computed once at initialization and carried in persisted
//! state, so the authorization upgrade cannot disturb it.

use aegis_protocol::config::{
    DOMAIN_TYPE, PERMIT_DOMAIN_VERSION, PERMIT_TYPE, STRUCTURED_DATA_PREFIX,
};
use aegis_protocol::crypto::hash::keccak256_concat;
use aegis_protocol::crypto::{keccak256, recover_signer, AegisKeypair, RecoverableSignature};
use aegis_protocol::crypto::SignatureError;
use aegis_protocol::types::amount_to_word;
use aegis_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::error::{TokenError, TokenResult};

/// The signing domain of one token on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl PermitDomain {
    pub fn new(name: &str, chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: name.to_string(),
            version: PERMIT_DOMAIN_VERSION.to_string(),
            chain_id,
            verifying_contract,
        }
    }

    /// The 32-byte domain separator.
    pub fn separator(&self) -> [u8; 32] {
        let type_hash = keccak256(DOMAIN_TYPE.as_bytes());
        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());
        let chain = amount_to_word(&Amount::from(self.chain_id));
        let contract = self.verifying_contract.to_word();
        keccak256_concat(&[
            &type_hash[..],
            &name_hash[..],
            &version_hash[..],
            &chain[..],
            &contract[..],
        ])
    }
}

/// The signed content of a delegated approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit {
    pub owner: Address,
    pub spender: Address,
    pub value: Amount,
    pub nonce: u64,
    /// Unix seconds. The permit is valid up to and including this second.
    pub deadline: u64,
}

impl Permit {
    fn struct_hash(&self) -> [u8; 32] {
        let type_hash = keccak256(PERMIT_TYPE.as_bytes());
        keccak256_concat(&[
            &type_hash[..],
            &self.owner.to_word()[..],
            &self.spender.to_word()[..],
            &amount_to_word(&self.value)[..],
            &amount_to_word(&Amount::from(self.nonce))[..],
            &amount_to_word(&Amount::from(self.deadline))[..],
        ])
    }

    /// The digest the owner signs, under `domain_separator`.
    pub fn digest(&self, domain_separator: &[u8; 32]) -> [u8; 32] {
        keccak256_concat(&[
            &STRUCTURED_DATA_PREFIX[..],
            &domain_separator[..],
            &self.struct_hash()[..],
        ])
    }
}

/// Checks that `signature` over `permit` was produced by `permit.owner`.
///
/// Any failure (malformed bytes, failed recovery, wrong signer) is reported
/// as [`TokenError::InvalidSignature`].
pub fn verify_permit(
    domain_separator: &[u8; 32],
    permit: &Permit,
    signature: &RecoverableSignature,
) -> TokenResult<()> {
    let digest = permit.digest(domain_separator);
    match recover_signer(&digest, signature) {
        Ok(signer) if signer == permit.owner && !signer.is_zero() => Ok(()),
        Ok(signer) => {
            tracing::debug!(claimed = %permit.owner, recovered = %signer, "permit signer mismatch");
            Err(TokenError::InvalidSignature)
        }
        Err(e) => {
            tracing::debug!(error = %e, "permit signature rejected");
            Err(TokenError::InvalidSignature)
        }
    }
}

/// Signs `permit` with `keypair`. The keypair should control `permit.owner`
/// for the result to verify.
pub fn sign_permit(
    keypair: &AegisKeypair,
    domain_separator: &[u8; 32],
    permit: &Permit,
) -> Result<RecoverableSignature, SignatureError> {
    keypair.sign_digest(&permit.digest(domain_separator))
}
