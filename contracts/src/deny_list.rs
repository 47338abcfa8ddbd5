//! # Deny-List
//!
//! The set of accounts barred from taking part in transfers.
//!
//! The list itself is dumb on purpose: it stores addresses and answers
//! membership questions. *Who* may edit it is decided by the authorization
//! model (always the owner identity, in either variant), and *which* paths
//! consult it, with or without the owner bypass, is decided by the token.
//!
//! Blocking is idempotent in both directions. Blocking an already-blocked
//! account succeeds and still emits `BlockPlaced`; the event records that
//! the administrator asked, not that the set changed.

use aegis_protocol::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{TokenError, TokenResult};
use crate::events::TokenEvent;

/// Owner-controlled set of blocked accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyList {
    blocked: BTreeSet<Address>,
}

impl DenyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a list from a persisted set.
    pub fn from_set(blocked: BTreeSet<Address>) -> Self {
        Self { blocked }
    }

    /// Marks `account` as blocked.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidArgument`] for the null account.
    pub fn block(&mut self, account: Address) -> TokenResult<TokenEvent> {
        Self::reject_null(&account)?;
        self.blocked.insert(account);
        Ok(TokenEvent::BlockPlaced { account })
    }

    /// Removes `account` from the list.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidArgument`] for the null account.
    pub fn unblock(&mut self, account: Address) -> TokenResult<TokenEvent> {
        Self::reject_null(&account)?;
        self.blocked.remove(&account);
        Ok(TokenEvent::BlockReleased { account })
    }

    pub fn is_blocked(&self, account: &Address) -> bool {
        self.blocked.contains(account)
    }

    /// Guard: fails with [`TokenError::Blocked`] if `account` is listed.
    pub fn ensure_not_blocked(&self, account: &Address) -> TokenResult<()> {
        if self.is_blocked(account) {
            return Err(TokenError::Blocked(*account));
        }
        Ok(())
    }

    /// Guard with the administrative override: a listed `account` passes
    /// when `exempt` is set (the caller is the owner identity).
    pub fn ensure_not_blocked_unless(&self, account: &Address, exempt: bool) -> TokenResult<()> {
        if exempt {
            return Ok(());
        }
        self.ensure_not_blocked(account)
    }

    /// All blocked accounts, in address order.
    pub fn blocked_accounts(&self) -> impl Iterator<Item = &Address> {
        self.blocked.iter()
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    pub(crate) fn as_set(&self) -> &BTreeSet<Address> {
        &self.blocked
    }

    fn reject_null(account: &Address) -> TokenResult<()> {
        if account.is_zero() {
            return Err(TokenError::InvalidArgument(
                "cannot change the block status of the null account".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_low_u8(0xa1)
    }

    #[test]
    fn block_then_check() {
        let mut list = DenyList::new();
        assert!(!list.is_blocked(&alice()));
        let ev = list.block(alice()).unwrap();
        assert_eq!(ev, TokenEvent::BlockPlaced { account: alice() });
        assert!(list.is_blocked(&alice()));
    }

    #[test]
    fn block_is_idempotent() {
        let mut list = DenyList::new();
        list.block(alice()).unwrap();
        list.block(alice()).unwrap();
        assert!(list.is_blocked(&alice()));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn unblock_is_idempotent() {
        let mut list = DenyList::new();
        list.block(alice()).unwrap();
        list.unblock(alice()).unwrap();
        let ev = list.unblock(alice()).unwrap();
        assert_eq!(ev, TokenEvent::BlockReleased { account: alice() });
        assert!(!list.is_blocked(&alice()));
        assert!(list.is_empty());
    }

    #[test]
    fn null_account_rejected() {
        let mut list = DenyList::new();
        assert!(matches!(
            list.block(Address::ZERO),
            Err(TokenError::InvalidArgument(_))
        ));
        assert!(matches!(
            list.unblock(Address::ZERO),
            Err(TokenError::InvalidArgument(_))
        ));
    }

    #[test]
    fn guards() {
        let mut list = DenyList::new();
        list.block(alice()).unwrap();
        assert_eq!(
            list.ensure_not_blocked(&alice()),
            Err(TokenError::Blocked(alice()))
        );
        assert!(list.ensure_not_blocked_unless(&alice(), true).is_ok());
        assert!(list.ensure_not_blocked_unless(&alice(), false).is_err());
        assert!(list.ensure_not_blocked(&Address::from_low_u8(2)).is_ok());
    }
}
