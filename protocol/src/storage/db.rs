//! # TokenDB — Persistent Storage Engine
//!
//! The persistence layer for an Aegis token, built on sled's embedded
//! key-value store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                    | Value                          |
//! |------------|------------------------|--------------------------------|
//! | `state`    | `"token"`              | `bincode(versioned state)`     |
//! | `events`   | `sequence` (8B BE)     | `bincode(event record)`        |
//! | `metadata` | key (UTF-8)            | value (bytes)                  |
//!
//! Event sequence numbers are stored as big-endian u64 so that sled's
//! lexicographic ordering matches numeric ordering and range scans over the
//! journal come back in order.
//!
//! ## Atomicity
//!
//! A commit writes the state blob, the new journal entries, and the schema
//! version in a single multi-tree sled transaction. A crash mid-commit
//! leaves the previous state and journal intact, never a state that is
//! ahead of (or behind) its events.
//!
//! The store is generic over what it persists: it takes anything `serde`
//! can encode. It knows about schema versions only as an opaque `u32` the
//! caller hands in.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction aborted: {0}")]
    Transaction(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Key of the state blob in the `state` tree.
const STATE_KEY: &[u8] = b"token";

/// Well-known key in the `metadata` tree for the persisted schema version.
const META_SCHEMA_VERSION: &[u8] = b"schema_version";

/// Well-known key in the `metadata` tree for the last journal sequence.
const META_LAST_EVENT_SEQ: &[u8] = b"last_event_seq";

fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode_u64(bytes: &[u8]) -> DbResult<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| DbError::Serialization("invalid u64 bytes".to_string()))?;
    Ok(u64::from_be_bytes(arr))
}

// ---------------------------------------------------------------------------
// TokenDB
// ---------------------------------------------------------------------------

/// Persistent storage for a single token's state and event journal.
///
/// # Thread Safety
///
/// sled handles concurrent readers and serialized writers internally, so a
/// `TokenDB` can be cloned and shared freely. Ordering of commits is the
/// caller's job; the token service commits from under its write lock.
#[derive(Debug, Clone)]
pub struct TokenDB {
    db: Db,
    state: Tree,
    events: Tree,
    metadata: Tree,
}

impl TokenDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    ///
    /// Ideal for unit tests — no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let state = db.open_tree("state")?;
        let events = db.open_tree("events")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            state,
            events,
            metadata,
        })
    }

    // -- Commit -------------------------------------------------------------

    /// Atomically persist a state blob, its schema version, and any new
    /// journal entries.
    ///
    /// `events` are `(sequence, record)` pairs. Sequences must be strictly
    /// increasing; the highest one becomes `last_event_seq`.
    pub fn commit<S: Serialize, E: Serialize>(
        &self,
        state: &S,
        schema_version: u32,
        events: &[(u64, E)],
    ) -> DbResult<()> {
        // Encode outside the transaction closure: sled may retry it.
        let state_bytes = encode(state)?;
        let mut encoded_events = Vec::with_capacity(events.len());
        for (seq, record) in events {
            encoded_events.push((seq.to_be_bytes(), encode(record)?));
        }
        let last_seq = events.last().map(|(seq, _)| seq.to_be_bytes());
        let version_bytes = schema_version.to_be_bytes();

        (&self.state, &self.events, &self.metadata)
            .transaction(|(state_tree, event_tree, meta_tree)| {
                state_tree.insert(STATE_KEY, state_bytes.as_slice())?;
                for (key, value) in &encoded_events {
                    event_tree.insert(key.as_slice(), value.as_slice())?;
                }
                meta_tree.insert(META_SCHEMA_VERSION, version_bytes.as_slice())?;
                if let Some(seq) = &last_seq {
                    meta_tree.insert(META_LAST_EVENT_SEQ, seq.as_slice())?;
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e: TransactionError<()>| DbError::Transaction(format!("{:?}", e)))?;

        self.db.flush()?;
        tracing::debug!(
            schema_version,
            events = events.len(),
            bytes = state_bytes.len(),
            "token state committed"
        );
        Ok(())
    }

    // -- Reads --------------------------------------------------------------

    /// Load the persisted state blob, if any.
    pub fn load_state<S: DeserializeOwned>(&self) -> DbResult<Option<S>> {
        match self.state.get(STATE_KEY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The schema version recorded alongside the last commit.
    pub fn schema_version(&self) -> DbResult<Option<u32>> {
        match self.metadata.get(META_SCHEMA_VERSION)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| DbError::Serialization("invalid schema version".to_string()))?;
                Ok(Some(u32::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// Sequence number of the newest journal entry.
    pub fn last_event_seq(&self) -> DbResult<Option<u64>> {
        match self.metadata.get(META_LAST_EVENT_SEQ)? {
            Some(bytes) => Ok(Some(decode_u64(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Journal entries with sequence `>= start`, in ascending order.
    pub fn events_from<E: DeserializeOwned>(&self, start: u64) -> DbResult<Vec<(u64, E)>> {
        let mut out = Vec::new();
        for entry in self.events.range(start.to_be_bytes()..) {
            let (key, value) = entry?;
            out.push((decode_u64(&key)?, decode(&value)?));
        }
        Ok(out)
    }

    /// Number of journal entries on disk.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing has ever been committed.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Blob {
        name: String,
        counter: u64,
    }

    #[test]
    fn fresh_db_is_empty() {
        let db = TokenDB::open_temporary().unwrap();
        assert!(db.is_empty());
        assert_eq!(db.load_state::<Blob>().unwrap(), None);
        assert_eq!(db.schema_version().unwrap(), None);
        assert_eq!(db.last_event_seq().unwrap(), None);
    }

    #[test]
    fn commit_then_load() {
        let db = TokenDB::open_temporary().unwrap();
        let blob = Blob {
            name: "aegis".into(),
            counter: 3,
        };
        let events = vec![(0u64, "minted".to_string()), (1, "moved".to_string())];
        db.commit(&blob, 1, &events).unwrap();

        assert_eq!(db.load_state::<Blob>().unwrap(), Some(blob));
        assert_eq!(db.schema_version().unwrap(), Some(1));
        assert_eq!(db.last_event_seq().unwrap(), Some(1));
        assert_eq!(db.event_count(), 2);
    }

    #[test]
    fn events_come_back_in_sequence_order() {
        let db = TokenDB::open_temporary().unwrap();
        let blob = Blob {
            name: "x".into(),
            counter: 0,
        };
        db.commit(&blob, 1, &[(0u64, 10u32), (1, 11)]).unwrap();
        db.commit(&blob, 1, &[(2u64, 12u32), (256, 13)]).unwrap();

        let all: Vec<(u64, u32)> = db.events_from(0).unwrap();
        assert_eq!(all, vec![(0, 10), (1, 11), (2, 12), (256, 13)]);

        let tail: Vec<(u64, u32)> = db.events_from(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(db.last_event_seq().unwrap(), Some(256));
    }

    #[test]
    fn commit_without_events_keeps_last_seq() {
        let db = TokenDB::open_temporary().unwrap();
        let blob = Blob {
            name: "x".into(),
            counter: 0,
        };
        db.commit(&blob, 1, &[(4u64, 0u8)]).unwrap();
        db.commit::<_, u8>(&blob, 2, &[]).unwrap();
        assert_eq!(db.last_event_seq().unwrap(), Some(4));
        assert_eq!(db.schema_version().unwrap(), Some(2));
    }

    #[test]
    fn reopen_from_disk_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let blob = Blob {
            name: "durable".into(),
            counter: 42,
        };
        {
            let db = TokenDB::open(dir.path()).unwrap();
            db.commit(&blob, 2, &[(0u64, 1u8)]).unwrap();
        }
        let db = TokenDB::open(dir.path()).unwrap();
        assert_eq!(db.load_state::<Blob>().unwrap(), Some(blob));
        assert_eq!(db.schema_version().unwrap(), Some(2));
    }
}
