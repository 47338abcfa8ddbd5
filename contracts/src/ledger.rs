//! # Ledger
//!
//! Balances, allowances, permit nonces, and total supply. The accounting
//! core, with no opinion on who is allowed to call it: authorization and
//! deny-list checks happen in [`crate::token`] before anything here runs.
//!
//! ## Invariants
//!
//! - `total_supply == sum(balances)` after every operation.
//! - Every operation validates completely before it writes. A returned error
//!   means nothing changed.
//! - An allowance equal to `Amount::MAX` is infinite: spending from it never
//!   decrements it.
//! - A nonce only ever goes up, by exactly one per consumed permit.
//!
//! Zero balances and zero allowances are pruned from the maps, so "absent"
//! and "zero" mean the same thing and the persisted layout stays canonical.

use aegis_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{TokenError, TokenResult};
use crate::events::TokenEvent;

/// Balance and allowance storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub(crate) balances: BTreeMap<Address, Amount>,
    pub(crate) allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    pub(crate) total_supply: Amount,
    pub(crate) nonces: BTreeMap<Address, u64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Views --------------------------------------------------------------

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or_default()
    }

    /// Current permit nonce of `owner`: the value the next permit must sign.
    pub fn nonce(&self, owner: &Address) -> u64 {
        self.nonces.get(owner).copied().unwrap_or(0)
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Accounts with a non-zero balance, in address order.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    /// Sum of every balance, or `None` if it does not fit (which would mean
    /// the supply invariant is already broken).
    pub fn sum_of_balances(&self) -> Option<Amount> {
        self.balances
            .values()
            .try_fold(Amount::zero(), |acc, b| acc.checked_add(*b))
    }

    // -- Supply -------------------------------------------------------------

    /// Creates `amount` new tokens in `to`.
    pub fn mint(&mut self, to: Address, amount: Amount) -> TokenResult<Vec<TokenEvent>> {
        if to.is_zero() {
            return Err(TokenError::InvalidRecipient(to));
        }
        if amount.is_zero() {
            return Err(TokenError::InvalidAmount);
        }
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        // Cannot overflow once the supply did not: balance <= supply.
        let new_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;

        self.total_supply = new_supply;
        self.set_balance(to, new_balance);
        Ok(vec![
            TokenEvent::Mint { to, amount },
            TokenEvent::Transfer {
                from: Address::ZERO,
                to,
                amount,
            },
        ])
    }

    /// Destroys `amount` tokens held by `from`.
    pub fn burn(&mut self, from: Address, amount: Amount) -> TokenResult<Vec<TokenEvent>> {
        if from.is_zero() {
            return Err(TokenError::InvalidAccount(from));
        }
        if amount.is_zero() {
            return Err(TokenError::InvalidAmount);
        }
        let balance = self.balance_of(&from);
        let new_balance = balance
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: from,
                balance,
                needed: amount,
            })?;
        let new_supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(TokenError::Overflow)?;

        self.total_supply = new_supply;
        self.set_balance(from, new_balance);
        Ok(vec![
            TokenEvent::Burn { from, amount },
            TokenEvent::Transfer {
                from,
                to: Address::ZERO,
                amount,
            },
        ])
    }

    // -- Movement -----------------------------------------------------------

    /// Moves `amount` from `from` to `to`. Supply is unchanged.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> TokenResult<TokenEvent> {
        let plan = self.plan_move(from, to, amount)?;
        self.apply_move(plan);
        Ok(TokenEvent::Transfer { from, to, amount })
    }

    /// Spends `spender`'s allowance over `from` and moves the tokens, as one
    /// step: if the balance is short, the allowance is left untouched.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> TokenResult<TokenEvent> {
        let new_allowance = self.plan_spend(&from, &spender, amount)?;
        let plan = self.plan_move(from, to, amount)?;

        if let Some(remaining) = new_allowance {
            self.set_allowance(from, spender, remaining);
        }
        self.apply_move(plan);
        Ok(TokenEvent::Transfer { from, to, amount })
    }

    // -- Allowances ---------------------------------------------------------

    /// Sets `owner`'s allowance for `spender` to exactly `amount`.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> TokenResult<TokenEvent> {
        if owner.is_zero() {
            return Err(TokenError::InvalidAccount(owner));
        }
        if spender.is_zero() {
            return Err(TokenError::InvalidSpender(spender));
        }
        self.set_allowance(owner, spender, amount);
        Ok(TokenEvent::Approval {
            owner,
            spender,
            amount,
        })
    }

    /// Raises the allowance by `delta`.
    pub fn increase_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        delta: Amount,
    ) -> TokenResult<TokenEvent> {
        let updated = self
            .allowance(&owner, &spender)
            .checked_add(delta)
            .ok_or(TokenError::Overflow)?;
        self.approve(owner, spender, updated)
    }

    /// Lowers the allowance by `delta`.
    pub fn decrease_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        delta: Amount,
    ) -> TokenResult<TokenEvent> {
        let current = self.allowance(&owner, &spender);
        let updated = current
            .checked_sub(delta)
            .ok_or(TokenError::InsufficientAllowance {
                owner,
                spender,
                allowance: current,
                needed: delta,
            })?;
        self.approve(owner, spender, updated)
    }

    // -- Nonces -------------------------------------------------------------

    /// Consumes `owner`'s current nonce and returns it.
    pub fn use_nonce(&mut self, owner: &Address) -> TokenResult<u64> {
        let current = self.nonce(owner);
        let next = current.checked_add(1).ok_or(TokenError::Overflow)?;
        self.nonces.insert(*owner, next);
        Ok(current)
    }

    // -- Internals ----------------------------------------------------------

    /// New allowance after spending, `None` when infinite.
    fn plan_spend(
        &self,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> TokenResult<Option<Amount>> {
        let current = self.allowance(owner, spender);
        if current == Amount::MAX {
            return Ok(None);
        }
        let remaining = current
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                allowance: current,
                needed: amount,
            })?;
        Ok(Some(remaining))
    }

    fn plan_move(&self, from: Address, to: Address, amount: Amount) -> TokenResult<MovePlan> {
        if from.is_zero() {
            return Err(TokenError::InvalidAccount(from));
        }
        if to.is_zero() {
            return Err(TokenError::InvalidRecipient(to));
        }
        let from_balance = self.balance_of(&from);
        let debited = from_balance
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: from,
                balance: from_balance,
                needed: amount,
            })?;
        if from == to {
            return Ok(MovePlan::NoOp);
        }
        let credited = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        Ok(MovePlan::Move {
            from,
            from_balance: debited,
            to,
            to_balance: credited,
        })
    }

    fn apply_move(&mut self, plan: MovePlan) {
        if let MovePlan::Move {
            from,
            from_balance,
            to,
            to_balance,
        } = plan
        {
            self.set_balance(from, from_balance);
            self.set_balance(to, to_balance);
        }
    }

    fn set_balance(&mut self, account: Address, amount: Amount) {
        if amount.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount.is_zero() {
            if let Some(m) = self.allowances.get_mut(&owner) {
                m.remove(&spender);
                if m.is_empty() {
                    self.allowances.remove(&owner);
                }
            }
        } else {
            self.allowances.entry(owner).or_default().insert(spender, amount);
        }
    }
}

/// Validated balance update, computed before anything is written.
enum MovePlan {
    NoOp,
    Move {
        from: Address,
        from_balance: Amount,
        to: Address,
        to_balance: Amount,
    },
}
