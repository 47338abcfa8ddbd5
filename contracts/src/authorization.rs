//! # Authorization Model
//!
//! Decides who may mint, burn, edit the deny-list, manage roles, hand over
//! ownership, and upgrade. Two permission models exist, entered in order and
//! never left:
//!
//! 1. **Owner-only** — one distinguished `owner` does everything privileged.
//! 2. **Role-based** — mint needs `MINTER_ROLE`, burn needs `BURNER_ROLE`,
//!    role membership is managed by `DEFAULT_ADMIN_ROLE` holders. The owner
//!    stays on as a plain identity: it still governs the deny-list, ownership
//!    and upgrades, but mints and burns only if someone grants it the role.
//!
//! Both models implement [`Authorizer`]. [`AuthorizationModel`] owns the
//! state (owner, active variant, role memberships) and hands out the right
//! implementation at runtime via [`AuthorizationModel::authorizer`].
//!
//! ## Storage continuity
//!
//! The owner field predates the role registry and survives the switch
//! untouched. The registry is new storage: empty until the switch, then
//! seeded by `bootstrap_admin_role`.

use aegis_protocol::crypto::keccak256;
use aegis_protocol::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{TokenError, TokenResult};
use crate::events::TokenEvent;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// A named, independently grantable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Manages membership of every role, itself included.
    DefaultAdmin,
    Minter,
    Burner,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::DefaultAdmin, Role::Minter, Role::Burner];

    /// Canonical role name.
    pub fn name(&self) -> &'static str {
        match self {
            Role::DefaultAdmin => "DEFAULT_ADMIN_ROLE",
            Role::Minter => "MINTER_ROLE",
            Role::Burner => "BURNER_ROLE",
        }
    }

    /// The 32-byte opaque identifier of the role. The admin role is all
    /// zeroes; the others are Keccak-256 of their name.
    pub fn id(&self) -> [u8; 32] {
        match self {
            Role::DefaultAdmin => [0u8; 32],
            other => keccak256(other.name().as_bytes()),
        }
    }

    /// Reverse of [`id`](Self::id).
    pub fn from_id(id: &[u8; 32]) -> Option<Role> {
        Role::ALL.into_iter().find(|role| &role.id() == id)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = TokenError;

    /// Accepts `MINTER_ROLE`, `minter`, and friends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_suffix("_ROLE").unwrap_or(&upper);
        match bare {
            "DEFAULT_ADMIN" | "ADMIN" => Ok(Role::DefaultAdmin),
            "MINTER" => Ok(Role::Minter),
            "BURNER" => Ok(Role::Burner),
            _ => Err(TokenError::InvalidArgument(format!("unknown role: {}", s))),
        }
    }
}

/// Role memberships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistry {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.members
            .get(&role)
            .map(|set| set.contains(account))
            .unwrap_or(false)
    }

    /// Adds `account` to `role`. Returns `false` if it was already a member.
    pub fn grant(&mut self, role: Role, account: Address) -> bool {
        self.members.entry(role).or_default().insert(account)
    }

    /// Removes `account` from `role`. Returns `false` if it was not a member.
    pub fn revoke(&mut self, role: Role, account: &Address) -> bool {
        let removed = match self.members.get_mut(&role) {
            Some(set) => set.remove(account),
            None => false,
        };
        if self.members.get(&role).map(|s| s.is_empty()).unwrap_or(false) {
            self.members.remove(&role);
        }
        removed
    }

    /// Members of `role`, in address order.
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Capabilities & variants
// ---------------------------------------------------------------------------

/// Privileged actions an [`Authorizer`] rules on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Mint,
    Burn,
    ManageDenyList,
    ManageRoles,
    RenounceRole,
    TransferOwnership,
    BootstrapAdmin,
    Upgrade,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Mint => "mint",
            Capability::Burn => "burn",
            Capability::ManageDenyList => "manage the deny-list",
            Capability::ManageRoles => "manage roles",
            Capability::RenounceRole => "renounce a role",
            Capability::TransferOwnership => "transfer ownership",
            Capability::BootstrapAdmin => "bootstrap the admin role",
            Capability::Upgrade => "upgrade",
        };
        f.write_str(s)
    }
}

/// Which permission model is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationVariant {
    OwnerOnly,
    RoleBased,
}

impl fmt::Display for AuthorizationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationVariant::OwnerOnly => f.write_str("owner-only"),
            AuthorizationVariant::RoleBased => f.write_str("role-based"),
        }
    }
}

// ---------------------------------------------------------------------------
// Authorizer
// ---------------------------------------------------------------------------

/// A permission model.
pub trait Authorizer {
    fn variant(&self) -> AuthorizationVariant;

    /// Returns `true` if `caller` may perform `capability`.
    fn permits(&self, caller: &Address, capability: Capability) -> bool;

    /// [`permits`](Self::permits), as a guard.
    fn authorize(&self, caller: &Address, capability: Capability) -> TokenResult<()> {
        if self.permits(caller, capability) {
            Ok(())
        } else {
            Err(TokenError::Unauthorized {
                caller: *caller,
                capability,
                variant: self.variant(),
            })
        }
    }
}

/// Everything privileged belongs to the owner. Roles do not exist yet.
pub struct OwnerOnly<'a> {
    owner: &'a Address,
}

impl Authorizer for OwnerOnly<'_> {
    fn variant(&self) -> AuthorizationVariant {
        AuthorizationVariant::OwnerOnly
    }

    fn permits(&self, caller: &Address, capability: Capability) -> bool {
        match capability {
            Capability::ManageRoles | Capability::RenounceRole | Capability::BootstrapAdmin => {
                false
            }
            Capability::Mint
            | Capability::Burn
            | Capability::ManageDenyList
            | Capability::TransferOwnership
            | Capability::Upgrade => caller == self.owner,
        }
    }
}

/// Operational privilege through roles; governance stays with the owner.
pub struct RoleBased<'a> {
    owner: &'a Address,
    roles: &'a RoleRegistry,
}

impl Authorizer for RoleBased<'_> {
    fn variant(&self) -> AuthorizationVariant {
        AuthorizationVariant::RoleBased
    }

    fn permits(&self, caller: &Address, capability: Capability) -> bool {
        match capability {
            Capability::Mint => self.roles.has_role(Role::Minter, caller),
            Capability::Burn => self.roles.has_role(Role::Burner, caller),
            Capability::ManageRoles => self.roles.has_role(Role::DefaultAdmin, caller),
            Capability::RenounceRole => true,
            Capability::ManageDenyList
            | Capability::TransferOwnership
            | Capability::BootstrapAdmin
            | Capability::Upgrade => caller == self.owner,
        }
    }
}

// ---------------------------------------------------------------------------
// AuthorizationModel
// ---------------------------------------------------------------------------

/// Owner identity, active variant, and role memberships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationModel {
    owner: Address,
    variant: AuthorizationVariant,
    roles: RoleRegistry,
}

impl AuthorizationModel {
    /// Owner-only model with `owner` in charge.
    pub fn owner_only(owner: Address) -> Self {
        Self {
            owner,
            variant: AuthorizationVariant::OwnerOnly,
            roles: RoleRegistry::new(),
        }
    }

    /// Role-based model over an existing registry. Used when restoring
    /// persisted state.
    pub fn role_based(owner: Address, roles: RoleRegistry) -> Self {
        Self {
            owner,
            variant: AuthorizationVariant::RoleBased,
            roles,
        }
    }

    /// The permission model currently in force.
    pub fn authorizer(&self) -> Box<dyn Authorizer + '_> {
        match self.variant {
            AuthorizationVariant::OwnerOnly => Box::new(OwnerOnly { owner: &self.owner }),
            AuthorizationVariant::RoleBased => Box::new(RoleBased {
                owner: &self.owner,
                roles: &self.roles,
            }),
        }
    }

    pub fn authorize(&self, caller: &Address, capability: Capability) -> TokenResult<()> {
        self.authorizer().authorize(caller, capability)
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Is `account` the owner identity? Drives the deny-list bypass.
    pub fn is_owner(&self, account: &Address) -> bool {
        account == &self.owner
    }

    pub fn variant(&self) -> AuthorizationVariant {
        self.variant
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.roles.has_role(role, account)
    }

    /// Single-step ownership handover.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> TokenResult<TokenEvent> {
        self.authorize(caller, Capability::TransferOwnership)?;
        if new_owner.is_zero() {
            return Err(TokenError::InvalidArgument(
                "new owner must not be the null account".into(),
            ));
        }
        let previous_owner = std::mem::replace(&mut self.owner, new_owner);
        Ok(TokenEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        })
    }

    /// Grants `role` to `account`. Granting a held role is a silent no-op.
    pub fn grant_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> TokenResult<Option<TokenEvent>> {
        self.authorize(caller, Capability::ManageRoles)?;
        if account.is_zero() {
            return Err(TokenError::InvalidArgument(
                "cannot grant a role to the null account".into(),
            ));
        }
        Ok(self.roles.grant(role, account).then_some(TokenEvent::RoleGranted {
            role,
            account,
            sender: *caller,
        }))
    }

    /// Revokes `role` from `account`. Revoking an absent role is a no-op.
    pub fn revoke_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> TokenResult<Option<TokenEvent>> {
        self.authorize(caller, Capability::ManageRoles)?;
        Ok(self.roles.revoke(role, &account).then_some(TokenEvent::RoleRevoked {
            role,
            account,
            sender: *caller,
        }))
    }

    /// Drops the caller's own membership of `role`.
    pub fn renounce_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> TokenResult<Option<TokenEvent>> {
        self.authorize(caller, Capability::RenounceRole)?;
        if &account != caller {
            return Err(TokenError::Unauthorized {
                caller: *caller,
                capability: Capability::RenounceRole,
                variant: self.variant,
            });
        }
        Ok(self.roles.revoke(role, &account).then_some(TokenEvent::RoleRevoked {
            role,
            account,
            sender: *caller,
        }))
    }

    /// Grants `DEFAULT_ADMIN_ROLE` to the owner. Owner only, role-based only,
    /// and idempotent: a second call changes nothing and emits nothing.
    pub fn bootstrap_admin_role(&mut self, caller: &Address) -> TokenResult<Option<TokenEvent>> {
        self.authorize(caller, Capability::BootstrapAdmin)?;
        let owner = self.owner;
        Ok(self
            .roles
            .grant(Role::DefaultAdmin, owner)
            .then_some(TokenEvent::RoleGranted {
                role: Role::DefaultAdmin,
                account: owner,
                sender: *caller,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::from_low_u8(0x01)
    }
    fn minter() -> Address {
        Address::from_low_u8(0x02)
    }
    fn stranger() -> Address {
        Address::from_low_u8(0x03)
    }

    fn role_based() -> AuthorizationModel {
        AuthorizationModel::role_based(owner(), RoleRegistry::new())
    }

    #[test]
    fn owner_only_gates_everything_on_owner() {
        let model = AuthorizationModel::owner_only(owner());
        for cap in [
            Capability::Mint,
            Capability::Burn,
            Capability::ManageDenyList,
            Capability::TransferOwnership,
            Capability::Upgrade,
        ] {
            assert!(model.authorize(&owner(), cap).is_ok(), "{cap}");
            assert!(model.authorize(&stranger(), cap).is_err(), "{cap}");
        }
    }

    #[test]
    fn owner_only_has_no_roles() {
        let mut model = AuthorizationModel::owner_only(owner());
        let err = model.grant_role(&owner(), Role::Minter, minter()).unwrap_err();
        assert!(matches!(
            err,
            TokenError::Unauthorized {
                variant: AuthorizationVariant::OwnerOnly,
                ..
            }
        ));
        assert!(model.bootstrap_admin_role(&owner()).is_err());
    }

    #[test]
    fn role_based_owner_loses_implicit_mint() {
        let model = role_based();
        assert!(model.authorize(&owner(), Capability::Mint).is_err());
        assert!(model.authorize(&owner(), Capability::Burn).is_err());
        assert!(model.authorize(&owner(), Capability::ManageDenyList).is_ok());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let mut model = role_based();
        let first = model.bootstrap_admin_role(&owner()).unwrap();
        assert!(first.is_some());
        let second = model.bootstrap_admin_role(&owner()).unwrap();
        assert!(second.is_none());
        assert_eq!(model.roles().members(Role::DefaultAdmin), vec![owner()]);
    }

    #[test]
    fn bootstrap_is_owner_only() {
        let mut model = role_based();
        assert!(model.bootstrap_admin_role(&stranger()).is_err());
    }

    #[test]
    fn admin_manages_roles() {
        let mut model = role_based();
        model.bootstrap_admin_role(&owner()).unwrap();

        assert!(model.grant_role(&stranger(), Role::Minter, minter()).is_err());
        let ev = model.grant_role(&owner(), Role::Minter, minter()).unwrap();
        assert_eq!(
            ev,
            Some(TokenEvent::RoleGranted {
                role: Role::Minter,
                account: minter(),
                sender: owner(),
            })
        );
        assert!(model.authorize(&minter(), Capability::Mint).is_ok());

        // Duplicate grant: not an error, no event.
        assert_eq!(model.grant_role(&owner(), Role::Minter, minter()).unwrap(), None);

        model.revoke_role(&owner(), Role::Minter, minter()).unwrap();
        assert!(model.authorize(&minter(), Capability::Mint).is_err());
        assert_eq!(model.revoke_role(&owner(), Role::Minter, minter()).unwrap(), None);
    }

    #[test]
    fn minter_cannot_grant_itself_burner() {
        let mut model = role_based();
        model.bootstrap_admin_role(&owner()).unwrap();
        model.grant_role(&owner(), Role::Minter, minter()).unwrap();
        assert!(model.grant_role(&minter(), Role::Burner, minter()).is_err());
    }

    #[test]
    fn renounce_only_for_self() {
        let mut model = role_based();
        model.bootstrap_admin_role(&owner()).unwrap();
        model.grant_role(&owner(), Role::Burner, minter()).unwrap();
        assert!(model.renounce_role(&stranger(), Role::Burner, minter()).is_err());
        assert!(model
            .renounce_role(&minter(), Role::Burner, minter())
            .unwrap()
            .is_some());
        assert!(!model.has_role(Role::Burner, &minter()));
    }

    #[test]
    fn ownership_transfer_moves_deny_list_control() {
        let mut model = AuthorizationModel::owner_only(owner());
        assert!(model.transfer_ownership(&stranger(), minter()).is_err());
        assert!(model.transfer_ownership(&owner(), Address::ZERO).is_err());
        model.transfer_ownership(&owner(), minter()).unwrap();
        assert_eq!(model.owner(), minter());
        assert!(model.authorize(&owner(), Capability::ManageDenyList).is_err());
        assert!(model.authorize(&minter(), Capability::ManageDenyList).is_ok());
    }

    #[test]
    fn role_identifiers() {
        assert_eq!(Role::DefaultAdmin.id(), [0u8; 32]);
        assert_eq!(
            hex::encode(Role::Minter.id()),
            "9f2df0fed2c77648de5860a4cc508cd0818c85b8b8a1ab4ceeef8d981c8956a6"
        );
        for role in Role::ALL {
            assert_eq!(Role::from_id(&role.id()), Some(role));
        }
        assert_eq!("minter".parse::<Role>().unwrap(), Role::Minter);
        assert_eq!("DEFAULT_ADMIN_ROLE".parse::<Role>().unwrap(), Role::DefaultAdmin);
        assert!("janitor".parse::<Role>().is_err());
    }
}
