//! Error types for the token.
//!
//! Every mutating operation returns `Result<_, TokenError>`. A returned error
//! means nothing was written: no balance moved, no event recorded.

use aegis_protocol::{Address, Amount};
use thiserror::Error;

use crate::authorization::{AuthorizationVariant, Capability};

/// Errors that can occur during token operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// A malformed argument, typically a null account where a real one is
    /// required.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Mint to the null account.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(Address),

    /// Burn (or spend) from the null account.
    #[error("invalid account: {0}")]
    InvalidAccount(Address),

    /// Approval for the null account.
    #[error("invalid spender: {0}")]
    InvalidSpender(Address),

    /// Zero-amount mint or burn.
    #[error("invalid amount: must be greater than zero")]
    InvalidAmount,

    /// The caller lacks the capability the operation requires under the
    /// active authorization variant.
    #[error("unauthorized: {caller} may not {capability} under {variant} authorization")]
    Unauthorized {
        /// Who tried.
        caller: Address,
        /// What they tried to do.
        capability: Capability,
        /// Which permission model said no.
        variant: AuthorizationVariant,
    },

    /// A deny-listed account took part in a restricted path.
    #[error("account is blocked: {0}")]
    Blocked(Address),

    /// Transfer whose destination is the token's own address.
    #[error("transfer to the token contract itself is not allowed: {0}")]
    SelfTransferToContract(Address),

    #[error("insufficient balance: {account} has {balance}, needs {needed}")]
    InsufficientBalance {
        account: Address,
        balance: Amount,
        needed: Amount,
    },

    #[error("insufficient allowance: {spender} may spend {allowance} of {owner}'s tokens, needs {needed}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: Amount,
        needed: Amount,
    },

    /// Arithmetic would exceed `Amount::MAX`.
    #[error("arithmetic overflow")]
    Overflow,

    /// Permit presented after its deadline.
    #[error("permit expired: deadline {deadline}, now {now}")]
    Expired { deadline: u64, now: u64 },

    /// Permit signature did not recover to the claimed owner.
    #[error("invalid permit signature")]
    InvalidSignature,

    /// Initializer (or re-initializer) already ran.
    #[error("already initialized at version {0}")]
    AlreadyInitialized(u32),

    /// Any call before `initialize`.
    #[error("token is not initialized")]
    NotInitialized,
}

/// Coarse classification of [`TokenError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Unauthorized,
    Blocked,
    InsufficientFunds,
    DelegatedApproval,
    AlreadyInitialized,
    Overflow,
}

impl ErrorKind {
    /// Stable snake_case label, for metrics and machine-readable output.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Blocked => "blocked",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::DelegatedApproval => "delegated_approval",
            ErrorKind::AlreadyInitialized => "already_initialized",
            ErrorKind::Overflow => "overflow",
        }
    }
}

impl TokenError {
    /// Maps the error onto its taxonomy bucket.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::InvalidArgument(_)
            | TokenError::InvalidRecipient(_)
            | TokenError::InvalidAccount(_)
            | TokenError::InvalidSpender(_)
            | TokenError::InvalidAmount
            | TokenError::SelfTransferToContract(_) => ErrorKind::InvalidArgument,
            TokenError::Unauthorized { .. } => ErrorKind::Unauthorized,
            TokenError::Blocked(_) => ErrorKind::Blocked,
            TokenError::InsufficientBalance { .. } | TokenError::InsufficientAllowance { .. } => {
                ErrorKind::InsufficientFunds
            }
            TokenError::Expired { .. } | TokenError::InvalidSignature => {
                ErrorKind::DelegatedApproval
            }
            TokenError::AlreadyInitialized(_) | TokenError::NotInitialized => {
                ErrorKind::AlreadyInitialized
            }
            TokenError::Overflow => ErrorKind::Overflow,
        }
    }
}

pub type TokenResult<T> = Result<T, TokenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            TokenError::InvalidRecipient(Address::ZERO).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            TokenError::Blocked(Address::from_low_u8(1)).kind(),
            ErrorKind::Blocked
        );
        assert_eq!(TokenError::InvalidSignature.kind(), ErrorKind::DelegatedApproval);
        assert_eq!(TokenError::Overflow.kind(), ErrorKind::Overflow);
    }

    #[test]
    fn unauthorized_message_names_the_model() {
        let err = TokenError::Unauthorized {
            caller: Address::from_low_u8(2),
            capability: Capability::Mint,
            variant: AuthorizationVariant::RoleBased,
        };
        let msg = err.to_string();
        assert!(msg.contains("mint"));
        assert!(msg.contains("role-based"));
    }
}
