//! # Token Events
//!
//! Append-only notifications emitted by successful operations. Each event
//! names its subject accounts so a journal can be filtered per account
//! without decoding every payload.
//!
//! Events are staged while an operation runs and only reach the journal once
//! the operation has succeeded. A failed call leaves no trace.

use aegis_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::authorization::Role;

/// A single ledger notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEvent {
    /// Balance moved. `from` is null for mints, `to` is null for burns.
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
    /// Allowance set (directly, relatively, or via permit).
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    Mint {
        to: Address,
        amount: Amount,
    },
    Burn {
        from: Address,
        amount: Amount,
    },
    BlockPlaced {
        account: Address,
    },
    BlockReleased {
        account: Address,
    },
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
    /// Initializer or re-initializer ran to the given schema version.
    Initialized {
        version: u32,
    },
}

impl TokenEvent {
    /// Short name, handy for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            TokenEvent::Transfer { .. } => "transfer",
            TokenEvent::Approval { .. } => "approval",
            TokenEvent::Mint { .. } => "mint",
            TokenEvent::Burn { .. } => "burn",
            TokenEvent::BlockPlaced { .. } => "block_placed",
            TokenEvent::BlockReleased { .. } => "block_released",
            TokenEvent::RoleGranted { .. } => "role_granted",
            TokenEvent::RoleRevoked { .. } => "role_revoked",
            TokenEvent::OwnershipTransferred { .. } => "ownership_transferred",
            TokenEvent::Initialized { .. } => "initialized",
        }
    }

    /// The indexed accounts of this event.
    pub fn subjects(&self) -> Vec<Address> {
        match self {
            TokenEvent::Transfer { from, to, .. } => vec![*from, *to],
            TokenEvent::Approval { owner, spender, .. } => vec![*owner, *spender],
            TokenEvent::Mint { to, .. } => vec![*to],
            TokenEvent::Burn { from, .. } => vec![*from],
            TokenEvent::BlockPlaced { account } | TokenEvent::BlockReleased { account } => {
                vec![*account]
            }
            TokenEvent::RoleGranted {
                account, sender, ..
            }
            | TokenEvent::RoleRevoked {
                account, sender, ..
            } => vec![*account, *sender],
            TokenEvent::OwnershipTransferred {
                previous_owner,
                new_owner,
            } => vec![*previous_owner, *new_owner],
            TokenEvent::Initialized { .. } => Vec::new(),
        }
    }

    /// Returns `true` if `account` is one of the event's subjects.
    pub fn involves(&self, account: &Address) -> bool {
        self.subjects().iter().any(|a| a == account)
    }
}

/// An event with its position in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub event: TokenEvent,
}

/// The token's event journal.
///
/// Sequence numbers are assigned at append time and never reused. Records
/// stay in `uncommitted` until a persistence layer drains them.
#[derive(Debug, Clone, Default)]
pub struct EventJournal {
    next_seq: u64,
    uncommitted: Vec<EventRecord>,
}

impl EventJournal {
    /// A journal whose next record gets sequence `next_seq`. Used when
    /// resuming from disk.
    pub fn resume_at(next_seq: u64) -> Self {
        Self {
            next_seq,
            uncommitted: Vec::new(),
        }
    }

    /// Appends a batch of events from one successful operation.
    pub fn append(&mut self, events: &[TokenEvent]) {
        for event in events {
            self.uncommitted.push(EventRecord {
                seq: self.next_seq,
                event: event.clone(),
            });
            self.next_seq += 1;
        }
    }

    /// Sequence number the next record will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Records appended since the last drain.
    pub fn uncommitted(&self) -> &[EventRecord] {
        &self.uncommitted
    }

    /// Takes the uncommitted records, leaving the journal clean.
    pub fn drain_uncommitted(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.uncommitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_assigns_increasing_sequences() {
        let mut journal = EventJournal::default();
        let a = Address::from_low_u8(1);
        journal.append(&[
            TokenEvent::Mint {
                to: a,
                amount: Amount::from(5u64),
            },
            TokenEvent::Transfer {
                from: Address::ZERO,
                to: a,
                amount: Amount::from(5u64),
            },
        ]);
        journal.append(&[TokenEvent::BlockPlaced { account: a }]);

        let seqs: Vec<u64> = journal.uncommitted().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(journal.next_seq(), 3);

        let drained = journal.drain_uncommitted();
        assert_eq!(drained.len(), 3);
        assert!(journal.uncommitted().is_empty());
        assert_eq!(journal.next_seq(), 3);
    }

    #[test]
    fn resumed_journal_continues_numbering() {
        let mut journal = EventJournal::resume_at(10);
        journal.append(&[TokenEvent::Initialized { version: 1 }]);
        assert_eq!(journal.uncommitted()[0].seq, 10);
    }

    #[test]
    fn subjects_cover_both_parties() {
        let owner = Address::from_low_u8(1);
        let spender = Address::from_low_u8(2);
        let ev = TokenEvent::Approval {
            owner,
            spender,
            amount: Amount::one(),
        };
        assert!(ev.involves(&owner));
        assert!(ev.involves(&spender));
        assert!(!ev.involves(&Address::from_low_u8(3)));
        assert_eq!(ev.name(), "approval");
    }

    #[test]
    fn events_serialize_under_their_name() {
        let ev = TokenEvent::BlockReleased {
            account: Address::from_low_u8(4),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.starts_with("{\"block_released\""));
        let back: TokenEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);

        let bin = bincode::serialize(&ev).unwrap();
        let back: TokenEvent = bincode::deserialize(&bin).unwrap();
        assert_eq!(back, ev);
    }
}
