//! # Token
//!
//! The top-level aggregate. Owns one of each component and threads every
//! call through them in a fixed order:
//!
//! ```text
//!   caller ──► initialized? ──► Authorizer ──► DenyList ──► Ledger ──► journal
//! ```
//!
//! No component holds a reference back to the token. The token is the only
//! place that knows which paths consult the deny-list, which of them honour
//! the owner bypass, and what the token's own address is.
//!
//! The caller is always an explicit argument. There is no ambient "current
//! sender".
//!
//! ## Atomicity
//!
//! Each operation validates everything it needs before the first write, and
//! events reach the journal only after the operation has succeeded. An `Err`
//! return therefore leaves the token exactly as it was.
//!
//! ## Views before initialization
//!
//! Read-only accessors answer with empty values on an uninitialized token.
//! Every mutating call other than `initialize` fails with
//! [`TokenError::NotInitialized`].

use aegis_protocol::config::{
    TokenConfig, MAX_DECIMALS, SCHEMA_VERSION_OWNER_ONLY, SCHEMA_VERSION_ROLE_BASED,
};
use aegis_protocol::crypto::RecoverableSignature;
use aegis_protocol::types::decimal_amount;
use aegis_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::authorization::{AuthorizationModel, AuthorizationVariant, Capability, Role};
use crate::deny_list::DenyList;
use crate::error::{TokenError, TokenResult};
use crate::events::{EventJournal, EventRecord, TokenEvent};
use crate::ledger::Ledger;
use crate::permit::{verify_permit, Permit, PermitDomain};
use crate::upgrade::{self, LayoutV1, LayoutV2, VersionedState};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Name, symbol, and decimals. Fixed at initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

// ---------------------------------------------------------------------------
// Call surface
// ---------------------------------------------------------------------------

/// Every mutating operation, as data. Batches of these are read from JSON
/// and replayed through [`Token::dispatch`].
///
/// Amounts are decimal strings (or `0x` hex) so that values above 2^53
/// survive JSON tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TokenCall {
    Initialize {
        name: String,
        symbol: String,
        decimals: u8,
    },
    Mint {
        to: Address,
        #[serde(with = "decimal_amount")]
        amount: Amount,
    },
    Burn {
        from: Address,
        #[serde(with = "decimal_amount")]
        amount: Amount,
    },
    Transfer {
        to: Address,
        #[serde(with = "decimal_amount")]
        amount: Amount,
    },
    TransferFrom {
        from: Address,
        to: Address,
        #[serde(with = "decimal_amount")]
        amount: Amount,
    },
    Approve {
        spender: Address,
        #[serde(with = "decimal_amount")]
        amount: Amount,
    },
    IncreaseAllowance {
        spender: Address,
        #[serde(with = "decimal_amount")]
        delta: Amount,
    },
    DecreaseAllowance {
        spender: Address,
        #[serde(with = "decimal_amount")]
        delta: Amount,
    },
    Permit {
        owner: Address,
        spender: Address,
        #[serde(with = "decimal_amount")]
        value: Amount,
        deadline: u64,
        signature: RecoverableSignature,
    },
    Block {
        account: Address,
    },
    Unblock {
        account: Address,
    },
    GrantRole {
        role: Role,
        account: Address,
    },
    RevokeRole {
        role: Role,
        account: Address,
    },
    RenounceRole {
        role: Role,
        account: Address,
    },
    BootstrapAdminRole,
    TransferOwnership {
        new_owner: Address,
    },
    UpgradeToRoleBased,
}

impl TokenCall {
    /// Operation name, used for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            TokenCall::Initialize { .. } => "initialize",
            TokenCall::Mint { .. } => "mint",
            TokenCall::Burn { .. } => "burn",
            TokenCall::Transfer { .. } => "transfer",
            TokenCall::TransferFrom { .. } => "transfer_from",
            TokenCall::Approve { .. } => "approve",
            TokenCall::IncreaseAllowance { .. } => "increase_allowance",
            TokenCall::DecreaseAllowance { .. } => "decrease_allowance",
            TokenCall::Permit { .. } => "permit",
            TokenCall::Block { .. } => "block",
            TokenCall::Unblock { .. } => "unblock",
            TokenCall::GrantRole { .. } => "grant_role",
            TokenCall::RevokeRole { .. } => "revoke_role",
            TokenCall::RenounceRole { .. } => "renounce_role",
            TokenCall::BootstrapAdminRole => "bootstrap_admin_role",
            TokenCall::TransferOwnership { .. } => "transfer_ownership",
            TokenCall::UpgradeToRoleBased => "upgrade_to_role_based",
        }
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A single fungible token.
#[derive(Debug, Clone)]
pub struct Token {
    chain_id: u64,
    token_address: Address,
    /// 0 until `initialize`, then the layout version in force.
    schema_version: u32,
    metadata: TokenMetadata,
    domain_separator: [u8; 32],
    auth: AuthorizationModel,
    deny_list: DenyList,
    ledger: Ledger,
    journal: EventJournal,
}

impl Token {
    /// An uninitialized token living at `token_address` on `chain_id`.
    pub fn new(chain_id: u64, token_address: Address) -> Self {
        Self {
            chain_id,
            token_address,
            schema_version: 0,
            metadata: TokenMetadata::default(),
            domain_separator: [0u8; 32],
            auth: AuthorizationModel::owner_only(Address::ZERO),
            deny_list: DenyList::new(),
            ledger: Ledger::new(),
            journal: EventJournal::default(),
        }
    }

    /// An uninitialized token at the address and chain named by `config`.
    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(config.chain_id, config.token_address)
    }

    // -- Lifecycle ----------------------------------------------------------

    /// One-time initializer. `caller` becomes the owner; the permit domain
    /// separator is computed here and never again.
    ///
    /// # Errors
    ///
    /// - [`TokenError::AlreadyInitialized`] on any second call.
    /// - [`TokenError::InvalidArgument`] for a null caller, an empty name or
    ///   symbol, or more than the maximum decimals.
    pub fn initialize(
        &mut self,
        caller: &Address,
        name: &str,
        symbol: &str,
        decimals: u8,
    ) -> TokenResult<Vec<TokenEvent>> {
        upgrade::reinitializer(self.schema_version, SCHEMA_VERSION_OWNER_ONLY)?;
        if caller.is_zero() {
            return Err(TokenError::InvalidArgument(
                "the null account cannot own a token".into(),
            ));
        }
        if name.trim().is_empty() || symbol.trim().is_empty() {
            return Err(TokenError::InvalidArgument(
                "name and symbol must not be empty".into(),
            ));
        }
        if decimals > MAX_DECIMALS {
            return Err(TokenError::InvalidArgument(format!(
                "decimals {} exceeds maximum {}",
                decimals, MAX_DECIMALS
            )));
        }

        self.metadata = TokenMetadata {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
        };
        self.domain_separator =
            PermitDomain::new(name, self.chain_id, self.token_address).separator();
        self.auth = AuthorizationModel::owner_only(*caller);
        self.schema_version = SCHEMA_VERSION_OWNER_ONLY;

        tracing::info!(
            owner = %caller,
            token_name = name,
            symbol,
            decimals,
            token = %self.token_address,
            "token initialized"
        );
        Ok(self.emit(vec![
            TokenEvent::OwnershipTransferred {
                previous_owner: Address::ZERO,
                new_owner: *caller,
            },
            TokenEvent::Initialized {
                version: SCHEMA_VERSION_OWNER_ONLY,
            },
        ]))
    }

    /// Swaps the owner-only permission model for the role-based one.
    ///
    /// The state is captured as a version-1 layout, migrated, and restored.
    /// Balances, allowances, nonces, the blocked set, the owner, and the
    /// domain separator come through untouched. The role registry starts
    /// empty; follow up with [`bootstrap_admin_role`](Self::bootstrap_admin_role).
    ///
    /// # Errors
    ///
    /// - [`TokenError::Unauthorized`] unless `caller` is the owner.
    /// - [`TokenError::AlreadyInitialized`] if the upgrade already ran.
    pub fn upgrade_to_role_based(&mut self, caller: &Address) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        self.auth.authorize(caller, Capability::Upgrade)?;
        upgrade::reinitializer(self.schema_version, SCHEMA_VERSION_ROLE_BASED)?;

        let migrated = upgrade::migrate(self.export_state()?)?;
        self.restore_components(migrated);

        tracing::info!(
            owner = %caller,
            version = self.schema_version,
            "authorization upgraded to role-based"
        );
        Ok(self.emit(vec![TokenEvent::Initialized {
            version: SCHEMA_VERSION_ROLE_BASED,
        }]))
    }

    // -- Supply -------------------------------------------------------------

    /// Creates `amount` tokens in `to`. Blocked accounts may receive.
    pub fn mint(
        &mut self,
        caller: &Address,
        to: Address,
        amount: Amount,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        self.auth.authorize(caller, Capability::Mint)?;
        let events = self.ledger.mint(to, amount)?;
        tracing::debug!(%caller, %to, %amount, "mint");
        Ok(self.emit(events))
    }

    /// Destroys `amount` of `from`'s tokens. The owner may burn from a
    /// blocked account; anyone else may not.
    pub fn burn(
        &mut self,
        caller: &Address,
        from: Address,
        amount: Amount,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        self.auth.authorize(caller, Capability::Burn)?;
        self.deny_list
            .ensure_not_blocked_unless(&from, self.auth.is_owner(caller))?;
        let events = self.ledger.burn(from, amount)?;
        tracing::debug!(%caller, %from, %amount, "burn");
        Ok(self.emit(events))
    }

    // -- Movement -----------------------------------------------------------

    /// Moves `amount` from `caller` to `to`.
    pub fn transfer(
        &mut self,
        caller: &Address,
        to: Address,
        amount: Amount,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        self.deny_list
            .ensure_not_blocked_unless(caller, self.auth.is_owner(caller))?;
        self.ensure_not_token_itself(&to)?;
        let event = self.ledger.transfer(*caller, to, amount)?;
        tracing::debug!(from = %caller, %to, %amount, "transfer");
        Ok(self.emit(vec![event]))
    }

    /// Moves `amount` from `from` to `to` on `caller`'s allowance.
    ///
    /// A blocked spender is always refused. A blocked `from` is refused
    /// unless the spender is the owner.
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        self.deny_list.ensure_not_blocked(caller)?;
        self.deny_list
            .ensure_not_blocked_unless(&from, self.auth.is_owner(caller))?;
        self.ensure_not_token_itself(&to)?;
        let event = self.ledger.transfer_from(*caller, from, to, amount)?;
        tracing::debug!(spender = %caller, %from, %to, %amount, "transfer_from");
        Ok(self.emit(vec![event]))
    }

    // -- Allowances ---------------------------------------------------------

    /// Sets `caller`'s allowance for `spender` to exactly `amount`.
    pub fn approve(
        &mut self,
        caller: &Address,
        spender: Address,
        amount: Amount,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.guard_allowance_owner(caller, &spender)?;
        let event = self.ledger.approve(*caller, spender, amount)?;
        tracing::debug!(owner = %caller, %spender, %amount, "approve");
        Ok(self.emit(vec![event]))
    }

    pub fn increase_allowance(
        &mut self,
        caller: &Address,
        spender: Address,
        delta: Amount,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.guard_allowance_owner(caller, &spender)?;
        let event = self.ledger.increase_allowance(*caller, spender, delta)?;
        Ok(self.emit(vec![event]))
    }

    pub fn decrease_allowance(
        &mut self,
        caller: &Address,
        spender: Address,
        delta: Amount,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.guard_allowance_owner(caller, &spender)?;
        let event = self.ledger.decrease_allowance(*caller, spender, delta)?;
        Ok(self.emit(vec![event]))
    }

    /// Redeems a signed approval. Anyone may relay it; `caller` is only
    /// logged. `now` is Unix seconds.
    ///
    /// The signature must cover `owner`'s *current* nonce. On success the
    /// allowance is set as by [`approve`](Self::approve) and the nonce moves
    /// up by one, so the same signature can never be redeemed twice.
    #[allow(clippy::too_many_arguments)]
    pub fn permit(
        &mut self,
        caller: &Address,
        owner: Address,
        spender: Address,
        value: Amount,
        deadline: u64,
        signature: &RecoverableSignature,
        now: u64,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        if now > deadline {
            return Err(TokenError::Expired { deadline, now });
        }
        let permit = Permit {
            owner,
            spender,
            value,
            nonce: self.ledger.nonce(&owner),
            deadline,
        };
        verify_permit(&self.domain_separator, &permit, signature)?;
        if spender.is_zero() {
            return Err(TokenError::InvalidSpender(spender));
        }

        let used = self.ledger.use_nonce(&owner)?;
        let event = self.ledger.approve(owner, spender, value)?;
        tracing::debug!(
            relayer = %caller,
            %owner,
            %spender,
            %value,
            nonce = used,
            "permit redeemed"
        );
        Ok(self.emit(vec![event]))
    }

    // -- Deny-list ----------------------------------------------------------

    pub fn block(&mut self, caller: &Address, account: Address) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        self.auth.authorize(caller, Capability::ManageDenyList)?;
        let event = self.deny_list.block(account)?;
        tracing::info!(%account, "account blocked");
        Ok(self.emit(vec![event]))
    }

    pub fn unblock(&mut self, caller: &Address, account: Address) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        self.auth.authorize(caller, Capability::ManageDenyList)?;
        let event = self.deny_list.unblock(account)?;
        tracing::info!(%account, "account unblocked");
        Ok(self.emit(vec![event]))
    }

    // -- Governance ---------------------------------------------------------

    pub fn grant_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        let event = self.auth.grant_role(caller, role, account)?;
        Ok(self.emit(event.into_iter().collect()))
    }

    pub fn revoke_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        let event = self.auth.revoke_role(caller, role, account)?;
        Ok(self.emit(event.into_iter().collect()))
    }

    pub fn renounce_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        let event = self.auth.renounce_role(caller, role, account)?;
        Ok(self.emit(event.into_iter().collect()))
    }

    /// Grants `DEFAULT_ADMIN_ROLE` to the owner. Repeat calls are no-ops.
    pub fn bootstrap_admin_role(&mut self, caller: &Address) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        let event = self.auth.bootstrap_admin_role(caller)?;
        Ok(self.emit(event.into_iter().collect()))
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> TokenResult<Vec<TokenEvent>> {
        self.ensure_initialized()?;
        let event = self.auth.transfer_ownership(caller, new_owner)?;
        tracing::info!(previous = %caller, new = %new_owner, "ownership transferred");
        Ok(self.emit(vec![event]))
    }

    // -- Dispatch -----------------------------------------------------------

    /// Runs `call` on behalf of `caller`. `now` (Unix seconds) is only
    /// consulted by permits.
    pub fn dispatch(
        &mut self,
        caller: &Address,
        call: &TokenCall,
        now: u64,
    ) -> TokenResult<Vec<TokenEvent>> {
        match call {
            TokenCall::Initialize {
                name,
                symbol,
                decimals,
            } => self.initialize(caller, name, symbol, *decimals),
            TokenCall::Mint { to, amount } => self.mint(caller, *to, *amount),
            TokenCall::Burn { from, amount } => self.burn(caller, *from, *amount),
            TokenCall::Transfer { to, amount } => self.transfer(caller, *to, *amount),
            TokenCall::TransferFrom { from, to, amount } => {
                self.transfer_from(caller, *from, *to, *amount)
            }
            TokenCall::Approve { spender, amount } => self.approve(caller, *spender, *amount),
            TokenCall::IncreaseAllowance { spender, delta } => {
                self.increase_allowance(caller, *spender, *delta)
            }
            TokenCall::DecreaseAllowance { spender, delta } => {
                self.decrease_allowance(caller, *spender, *delta)
            }
            TokenCall::Permit {
                owner,
                spender,
                value,
                deadline,
                signature,
            } => self.permit(caller, *owner, *spender, *value, *deadline, signature, now),
            TokenCall::Block { account } => self.block(caller, *account),
            TokenCall::Unblock { account } => self.unblock(caller, *account),
            TokenCall::GrantRole { role, account } => self.grant_role(caller, *role, *account),
            TokenCall::RevokeRole { role, account } => self.revoke_role(caller, *role, *account),
            TokenCall::RenounceRole { role, account } => {
                self.renounce_role(caller, *role, *account)
            }
            TokenCall::BootstrapAdminRole => self.bootstrap_admin_role(caller),
            TokenCall::TransferOwnership { new_owner } => {
                self.transfer_ownership(caller, *new_owner)
            }
            TokenCall::UpgradeToRoleBased => self.upgrade_to_role_based(caller),
        }
    }

    // -- Views --------------------------------------------------------------

    pub fn is_initialized(&self) -> bool {
        self.schema_version != 0
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn total_supply(&self) -> Amount {
        self.ledger.total_supply()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.ledger.balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.ledger.allowance(owner, spender)
    }

    /// The nonce the next permit from `owner` must sign.
    pub fn nonces(&self, owner: &Address) -> u64 {
        self.ledger.nonce(owner)
    }

    pub fn domain_separator(&self) -> [u8; 32] {
        self.domain_separator
    }

    pub fn owner(&self) -> Address {
        self.auth.owner()
    }

    pub fn is_blocked(&self, account: &Address) -> bool {
        self.deny_list.is_blocked(account)
    }

    pub fn blocked_accounts(&self) -> Vec<Address> {
        self.deny_list.blocked_accounts().copied().collect()
    }

    pub fn authorization_variant(&self) -> AuthorizationVariant {
        self.auth.variant()
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.auth.has_role(role, account)
    }

    pub fn role_members(&self, role: Role) -> Vec<Address> {
        self.auth.roles().members(role)
    }

    /// 0 before initialization.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn token_address(&self) -> Address {
        self.token_address
    }

    pub fn holder_count(&self) -> usize {
        self.ledger.holder_count()
    }

    /// Non-zero balances, in address order.
    pub fn holders(&self) -> Vec<(Address, Amount)> {
        self.ledger.holders().map(|(a, b)| (*a, *b)).collect()
    }

    /// Checks `total_supply == sum(balances)`.
    pub fn supply_is_consistent(&self) -> bool {
        self.ledger.sum_of_balances() == Some(self.ledger.total_supply())
    }

    /// The permit domain this token signs under.
    pub fn permit_domain(&self) -> PermitDomain {
        PermitDomain::new(&self.metadata.name, self.chain_id, self.token_address)
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    /// Hands the uncommitted journal records to a persistence layer.
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        self.journal.drain_uncommitted()
    }

    // -- State --------------------------------------------------------------

    /// Captures the persistent state as a versioned layout.
    ///
    /// # Errors
    ///
    /// [`TokenError::NotInitialized`] before `initialize`.
    pub fn export_state(&self) -> TokenResult<VersionedState> {
        self.ensure_initialized()?;
        let base = LayoutV1 {
            name: self.metadata.name.clone(),
            symbol: self.metadata.symbol.clone(),
            decimals: self.metadata.decimals,
            owner: self.auth.owner(),
            blocked: self.deny_list.as_set().clone(),
            balances: self.ledger.balances.clone(),
            allowances: self.ledger.allowances.clone(),
            total_supply: self.ledger.total_supply,
            nonces: self.ledger.nonces.clone(),
            chain_id: self.chain_id,
            token_address: self.token_address,
            domain_separator: self.domain_separator,
        };
        Ok(match self.auth.variant() {
            AuthorizationVariant::OwnerOnly => VersionedState::V1(base),
            AuthorizationVariant::RoleBased => VersionedState::V2(LayoutV2 {
                base,
                roles: self.auth.roles().clone(),
            }),
        })
    }

    /// Rebuilds a token from persisted state. The journal resumes at
    /// `next_event_seq`.
    pub fn from_state(state: VersionedState, next_event_seq: u64) -> Self {
        let base = state.base();
        let mut token = Self::new(base.chain_id, base.token_address);
        token.restore_components(state);
        token.journal = EventJournal::resume_at(next_event_seq);
        token
    }

    /// BLAKE3 fingerprint of the version-1 portion of the state.
    pub fn fingerprint(&self) -> TokenResult<[u8; 32]> {
        self.export_state()?
            .fingerprint()
            .map_err(|e| TokenError::InvalidArgument(format!("state encoding failed: {}", e)))
    }

    // -- Internals ----------------------------------------------------------

    fn restore_components(&mut self, state: VersionedState) {
        self.schema_version = state.schema_version();
        let (base, auth) = match state {
            VersionedState::V1(base) => {
                let auth = AuthorizationModel::owner_only(base.owner);
                (base, auth)
            }
            VersionedState::V2(layout) => {
                let auth = AuthorizationModel::role_based(layout.base.owner, layout.roles);
                (layout.base, auth)
            }
        };
        self.chain_id = base.chain_id;
        self.token_address = base.token_address;
        self.domain_separator = base.domain_separator;
        self.metadata = TokenMetadata {
            name: base.name,
            symbol: base.symbol,
            decimals: base.decimals,
        };
        self.auth = auth;
        self.deny_list = DenyList::from_set(base.blocked);
        self.ledger = Ledger {
            balances: base.balances,
            allowances: base.allowances,
            total_supply: base.total_supply,
            nonces: base.nonces,
        };
    }

    fn ensure_initialized(&self) -> TokenResult<()> {
        if !self.is_initialized() {
            return Err(TokenError::NotInitialized);
        }
        Ok(())
    }

    fn ensure_not_token_itself(&self, to: &Address) -> TokenResult<()> {
        if *to == self.token_address {
            return Err(TokenError::SelfTransferToContract(*to));
        }
        Ok(())
    }

    /// Acting-account guard shared by the allowance operations.
    fn guard_allowance_owner(&self, caller: &Address, spender: &Address) -> TokenResult<()> {
        self.ensure_initialized()?;
        self.deny_list
            .ensure_not_blocked_unless(caller, self.auth.is_owner(caller))?;
        if spender.is_zero() {
            return Err(TokenError::InvalidSpender(*spender));
        }
        Ok(())
    }

    fn emit(&mut self, events: Vec<TokenEvent>) -> Vec<TokenEvent> {
        self.journal.append(&events);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_protocol::config::CHAIN_ID_DEVNET;
    use aegis_protocol::crypto::AegisKeypair;
    use crate::permit::sign_permit;

    const NOW: u64 = 1_800_000_000;

    fn owner() -> Address {
        Address::from_low_u8(0x01)
    }
    fn alice() -> Address {
        Address::from_low_u8(0xa1)
    }
    fn bob() -> Address {
        Address::from_low_u8(0xb0)
    }
    fn contract() -> Address {
        Address::from_low_u8(0xee)
    }
    fn amt(n: u64) -> Amount {
        Amount::from(n)
    }

    fn token() -> Token {
        let mut t = Token::new(CHAIN_ID_DEVNET, contract());
        t.initialize(&owner(), "Aegis Dollar", "AGD", 18).unwrap();
        t
    }

    #[test]
    fn calls_before_initialize_are_rejected() {
        let mut t = Token::new(CHAIN_ID_DEVNET, contract());
        assert_eq!(
            t.mint(&owner(), alice(), amt(1)),
            Err(TokenError::NotInitialized)
        );
        assert_eq!(t.export_state(), Err(TokenError::NotInitialized));
        assert_eq!(t.total_supply(), Amount::zero());
    }

    #[test]
    fn initialize_runs_once() {
        let mut t = token();
        assert_eq!(t.owner(), owner());
        assert_eq!(t.schema_version(), 1);
        assert_eq!(
            t.initialize(&alice(), "Other", "OTH", 6),
            Err(TokenError::AlreadyInitialized(1))
        );
        assert_eq!(t.owner(), owner());
        assert_eq!(t.name(), "Aegis Dollar");
    }

    #[test]
    fn initialize_validates_arguments() {
        let mut t = Token::new(CHAIN_ID_DEVNET, contract());
        assert!(t.initialize(&Address::ZERO, "A", "A", 18).is_err());
        assert!(t.initialize(&owner(), "", "A", 18).is_err());
        assert!(t.initialize(&owner(), "A", "A", MAX_DECIMALS + 1).is_err());
        assert!(!t.is_initialized());
    }

    #[test]
    fn transfer_to_token_address_is_refused() {
        let mut t = token();
        t.mint(&owner(), alice(), amt(10)).unwrap();
        assert_eq!(
            t.transfer(&alice(), contract(), amt(1)),
            Err(TokenError::SelfTransferToContract(contract()))
        );
        t.approve(&alice(), bob(), amt(5)).unwrap();
        assert_eq!(
            t.transfer_from(&bob(), alice(), contract(), amt(1)),
            Err(TokenError::SelfTransferToContract(contract()))
        );
        assert_eq!(t.allowance(&alice(), &bob()), amt(5));
    }

    #[test]
    fn blocked_spender_has_no_bypass() {
        let mut t = token();
        t.mint(&owner(), alice(), amt(10)).unwrap();
        t.approve(&alice(), bob(), amt(10)).unwrap();
        t.block(&owner(), bob()).unwrap();
        assert_eq!(
            t.transfer_from(&bob(), alice(), owner(), amt(1)),
            Err(TokenError::Blocked(bob()))
        );
    }

    #[test]
    fn owner_spender_bypasses_blocked_from() {
        let mut t = token();
        t.mint(&owner(), alice(), amt(10)).unwrap();
        t.approve(&alice(), owner(), amt(10)).unwrap();
        t.block(&owner(), alice()).unwrap();
        t.transfer_from(&owner(), alice(), bob(), amt(4)).unwrap();
        assert_eq!(t.balance_of(&bob()), amt(4));

        t.unblock(&owner(), alice()).unwrap();
        t.approve(&alice(), bob(), amt(3)).unwrap();
        t.block(&owner(), alice()).unwrap();
        assert_eq!(
            t.transfer_from(&bob(), alice(), bob(), amt(1)),
            Err(TokenError::Blocked(alice()))
        );
    }

    #[test]
    fn blocked_caller_cannot_approve() {
        let mut t = token();
        t.block(&owner(), alice()).unwrap();
        assert_eq!(
            t.approve(&alice(), bob(), amt(1)),
            Err(TokenError::Blocked(alice()))
        );
        assert_eq!(
            t.increase_allowance(&alice(), bob(), amt(1)),
            Err(TokenError::Blocked(alice()))
        );
    }

    #[test]
    fn null_spender_checked_before_arithmetic() {
        let mut t = token();
        assert_eq!(
            t.increase_allowance(&alice(), Address::ZERO, Amount::MAX),
            Err(TokenError::InvalidSpender(Address::ZERO))
        );
    }

    #[test]
    fn failed_calls_leave_no_events() {
        let mut t = token();
        let before = t.journal().next_seq();
        assert!(t.transfer(&alice(), bob(), amt(1)).is_err());
        assert!(t.mint(&alice(), bob(), amt(1)).is_err());
        assert_eq!(t.journal().next_seq(), before);
    }

    #[test]
    fn mint_emits_mint_and_transfer() {
        let mut t = token();
        let events = t.mint(&owner(), alice(), amt(7)).unwrap();
        assert_eq!(
            events,
            vec![
                TokenEvent::Mint {
                    to: alice(),
                    amount: amt(7)
                },
                TokenEvent::Transfer {
                    from: Address::ZERO,
                    to: alice(),
                    amount: amt(7)
                },
            ]
        );
    }

    #[test]
    fn upgrade_keeps_state_and_domain() {
        let mut t = token();
        t.mint(&owner(), alice(), amt(100)).unwrap();
        t.block(&owner(), bob()).unwrap();
        let sep = t.domain_separator();
        let fp = t.fingerprint().unwrap();

        let events = t.upgrade_to_role_based(&owner()).unwrap();
        assert_eq!(events, vec![TokenEvent::Initialized { version: 2 }]);
        assert_eq!(t.authorization_variant(), AuthorizationVariant::RoleBased);
        assert_eq!(t.domain_separator(), sep);
        assert_eq!(t.fingerprint().unwrap(), fp);
        assert!(t.is_blocked(&bob()));
        assert_eq!(
            t.upgrade_to_role_based(&owner()),
            Err(TokenError::AlreadyInitialized(2))
        );
    }

    #[test]
    fn only_owner_upgrades() {
        let mut t = token();
        assert!(matches!(
            t.upgrade_to_role_based(&alice()),
            Err(TokenError::Unauthorized { .. })
        ));
        assert_eq!(t.schema_version(), 1);
    }

    #[test]
    fn permit_sets_allowance() {
        let mut t = token();
        let kp = AegisKeypair::from_seed(7).unwrap();
        let permit = Permit {
            owner: kp.address(),
            spender: bob(),
            value: amt(42),
            nonce: 0,
            deadline: NOW + 60,
        };
        let sig = sign_permit(&kp, &t.domain_separator(), &permit).unwrap();
        t.permit(&alice(), kp.address(), bob(), amt(42), NOW + 60, &sig, NOW)
            .unwrap();
        assert_eq!(t.allowance(&kp.address(), &bob()), amt(42));
        assert_eq!(t.nonces(&kp.address()), 1);
    }

    #[test]
    fn permit_to_null_spender_consumes_nothing() {
        let mut t = token();
        let kp = AegisKeypair::from_seed(8).unwrap();
        let permit = Permit {
            owner: kp.address(),
            spender: Address::ZERO,
            value: amt(1),
            nonce: 0,
            deadline: NOW,
        };
        let sig = sign_permit(&kp, &t.domain_separator(), &permit).unwrap();
        assert_eq!(
            t.permit(&alice(), kp.address(), Address::ZERO, amt(1), NOW, &sig, NOW),
            Err(TokenError::InvalidSpender(Address::ZERO))
        );
        assert_eq!(t.nonces(&kp.address()), 0);
    }

    #[test]
    fn state_round_trips_through_layout() {
        let mut t = token();
        t.mint(&owner(), alice(), amt(9)).unwrap();
        t.upgrade_to_role_based(&owner()).unwrap();
        t.bootstrap_admin_role(&owner()).unwrap();
        t.grant_role(&owner(), Role::Minter, alice()).unwrap();

        let state = t.export_state().unwrap();
        let restored = Token::from_state(state, t.journal().next_seq());
        assert_eq!(restored.balance_of(&alice()), amt(9));
        assert!(restored.has_role(Role::Minter, &alice()));
        assert_eq!(restored.schema_version(), 2);
        assert_eq!(restored.domain_separator(), t.domain_separator());
        assert_eq!(restored.journal().next_seq(), t.journal().next_seq());
    }

    #[test]
    fn dispatch_reads_json_calls() {
        let mut t = token();
        let raw = r#"{"op":"mint","to":"0x00000000000000000000000000000000000000a1","amount":"1000"}"#;
        let call: TokenCall = serde_json::from_str(raw).unwrap();
        assert_eq!(call.name(), "mint");
        t.dispatch(&owner(), &call, NOW).unwrap();
        assert_eq!(t.balance_of(&alice()), amt(1000));

        let call: TokenCall = serde_json::from_str(r#"{"op":"upgrade_to_role_based"}"#).unwrap();
        t.dispatch(&owner(), &call, NOW).unwrap();
        assert_eq!(t.schema_version(), 2);
    }
}
