//! # Token Service
//!
//! The single-writer front door to a [`Token`].
//!
//! Every mutating call takes the write lock, runs to completion, and (when a
//! database is attached) commits the new state and its journal entries in
//! one sled transaction before the lock is released. Readers take the read
//! lock and always see a state between two whole operations, never inside
//! one. The authorization upgrade is just another call, so it is mutually
//! exclusive with everything else for free.
//!
//! With a database attached the call is staged on a copy of the token and
//! only swapped in after the commit succeeds. A failed write leaves memory
//! and disk in agreement.

use aegis_protocol::config::TokenConfig;
use aegis_protocol::storage::{DbError, TokenDB};
use aegis_protocol::Address;
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

use crate::error::TokenError;
use crate::events::{EventRecord, TokenEvent};
use crate::token::{Token, TokenCall};
use crate::upgrade::{VersionedState, LATEST_SCHEMA_VERSION};

/// Errors surfaced by [`TokenService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The token rejected the call. Nothing was written.
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    /// What is on disk does not describe the token we were asked to host.
    #[error("stored state does not match configuration: {0}")]
    ConfigMismatch(String),

    /// The database holds something this build cannot interpret.
    #[error("corrupt stored state: {0}")]
    CorruptState(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Shared, lock-guarded token with optional persistence.
///
/// Cloning is cheap: clones share the same token and database.
#[derive(Debug, Clone)]
pub struct TokenService {
    token: Arc<RwLock<Token>>,
    db: Option<TokenDB>,
}

impl TokenService {
    /// A service with no persistence. History lives in the token's journal.
    pub fn in_memory(token: Token) -> Self {
        Self {
            token: Arc::new(RwLock::new(token)),
            db: None,
        }
    }

    /// Opens the token stored in `db`, or starts an uninitialized one from
    /// `config` if the database is empty.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ConfigMismatch`] if the stored token lives at another
    /// address or chain than `config` says.
    pub fn open(db: TokenDB, config: &TokenConfig) -> ServiceResult<Self> {
        let token = match Self::load(&db)? {
            Some(token) => {
                if token.token_address() != config.token_address {
                    return Err(ServiceError::ConfigMismatch(format!(
                        "stored token is at {}, config names {}",
                        token.token_address(),
                        config.token_address
                    )));
                }
                if token.chain_id() != config.chain_id {
                    return Err(ServiceError::ConfigMismatch(format!(
                        "stored token is on chain {}, config names {}",
                        token.chain_id(),
                        config.chain_id
                    )));
                }
                tracing::info!(
                    name = token.name(),
                    schema_version = token.schema_version(),
                    next_event = token.journal().next_seq(),
                    "token loaded from storage"
                );
                token
            }
            None => {
                tracing::info!(token = %config.token_address, "no stored token, starting fresh");
                Token::from_config(config)
            }
        };
        Ok(Self {
            token: Arc::new(RwLock::new(token)),
            db: Some(db),
        })
    }

    /// Reads the token back from `db`, if one was ever committed.
    pub fn load(db: &TokenDB) -> ServiceResult<Option<Token>> {
        let state: VersionedState = match db.load_state()? {
            Some(state) => state,
            None => return Ok(None),
        };
        let recorded = db.schema_version()?;
        if recorded != Some(state.schema_version()) {
            return Err(ServiceError::CorruptState(format!(
                "state blob is version {}, metadata says {:?}",
                state.schema_version(),
                recorded
            )));
        }
        if state.schema_version() > LATEST_SCHEMA_VERSION {
            return Err(ServiceError::CorruptState(format!(
                "schema version {} is newer than this build supports",
                state.schema_version()
            )));
        }
        let next_seq = db.last_event_seq()?.map(|s| s + 1).unwrap_or(0);
        Ok(Some(Token::from_state(state, next_seq)))
    }

    /// Applies one call as `caller`. `now` is Unix seconds.
    pub fn execute(
        &self,
        caller: &Address,
        call: &TokenCall,
        now: u64,
    ) -> ServiceResult<Vec<TokenEvent>> {
        let mut token = self.token.write();
        let result = match &self.db {
            None => token.dispatch(caller, call, now).map_err(ServiceError::from),
            Some(db) => {
                let mut staged = token.clone();
                match staged.dispatch(caller, call, now) {
                    Ok(events) => match Self::commit(db, &mut staged) {
                        Ok(()) => {
                            *token = staged;
                            Ok(events)
                        }
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(e.into()),
                }
            }
        };

        match &result {
            Ok(events) => tracing::debug!(
                op = call.name(),
                %caller,
                events = events.len(),
                "call applied"
            ),
            Err(e) => tracing::warn!(op = call.name(), %caller, error = %e, "call rejected"),
        }
        result
    }

    /// Shorthand for the authorization upgrade.
    pub fn upgrade_to_role_based(&self, caller: &Address) -> ServiceResult<Vec<TokenEvent>> {
        self.execute(caller, &TokenCall::UpgradeToRoleBased, 0)
    }

    /// Runs `f` against a consistent view of the token.
    pub fn read<R>(&self, f: impl FnOnce(&Token) -> R) -> R {
        f(&self.token.read())
    }

    /// An owned copy of the current token.
    pub fn snapshot(&self) -> Token {
        self.token.read().clone()
    }

    /// Journal records with sequence `>= start`.
    pub fn history(&self, start: u64) -> ServiceResult<Vec<EventRecord>> {
        match &self.db {
            Some(db) => {
                let rows: Vec<(u64, TokenEvent)> = db.events_from(start)?;
                Ok(rows
                    .into_iter()
                    .map(|(seq, event)| EventRecord { seq, event })
                    .collect())
            }
            None => Ok(self.read(|token| {
                token
                    .journal()
                    .uncommitted()
                    .iter()
                    .filter(|r| r.seq >= start)
                    .cloned()
                    .collect()
            })),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.db.is_some()
    }

    fn commit(db: &TokenDB, token: &mut Token) -> ServiceResult<()> {
        let state = token.export_state()?;
        let events: Vec<(u64, TokenEvent)> = token
            .drain_events()
            .into_iter()
            .map(|r| (r.seq, r.event))
            .collect();
        db.commit(&state, state.schema_version(), &events)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_protocol::Amount;

    fn owner() -> Address {
        Address::from_low_u8(0x01)
    }
    fn alice() -> Address {
        Address::from_low_u8(0xa1)
    }

    fn config() -> TokenConfig {
        TokenConfig::devnet("Aegis Dollar", "AGD", Address::from_low_u8(0xee))
    }

    fn init_call() -> TokenCall {
        TokenCall::Initialize {
            name: "Aegis Dollar".into(),
            symbol: "AGD".into(),
            decimals: 18,
        }
    }

    #[test]
    fn in_memory_history_comes_from_the_journal() {
        let service = TokenService::in_memory(Token::from_config(&config()));
        service.execute(&owner(), &init_call(), 0).unwrap();
        service
            .execute(
                &owner(),
                &TokenCall::Mint {
                    to: alice(),
                    amount: Amount::from(5u64),
                },
                0,
            )
            .unwrap();
        let history = service.history(0).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history.last().unwrap().seq, 3);
        assert!(!service.is_persistent());
    }

    #[test]
    fn rejected_call_is_reported() {
        let service = TokenService::in_memory(Token::from_config(&config()));
        let err = service
            .execute(
                &owner(),
                &TokenCall::Transfer {
                    to: alice(),
                    amount: Amount::one(),
                },
                0,
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Token(TokenError::NotInitialized)));
    }

    #[test]
    fn persisted_token_reloads() {
        let db = TokenDB::open_temporary().unwrap();
        let service = TokenService::open(db.clone(), &config()).unwrap();
        service.execute(&owner(), &init_call(), 0).unwrap();
        service
            .execute(
                &owner(),
                &TokenCall::Mint {
                    to: alice(),
                    amount: Amount::from(77u64),
                },
                0,
            )
            .unwrap();
        service.upgrade_to_role_based(&owner()).unwrap();

        let reloaded = TokenService::load(&db).unwrap().unwrap();
        assert_eq!(reloaded.balance_of(&alice()), Amount::from(77u64));
        assert_eq!(reloaded.schema_version(), 2);
        assert_eq!(reloaded.journal().next_seq(), 5);
        assert_eq!(db.event_count(), 5);
    }

    #[test]
    fn rejected_call_writes_nothing() {
        let db = TokenDB::open_temporary().unwrap();
        let service = TokenService::open(db.clone(), &config()).unwrap();
        service.execute(&owner(), &init_call(), 0).unwrap();
        let events_before = db.event_count();
        assert!(service
            .execute(
                &alice(),
                &TokenCall::Mint {
                    to: alice(),
                    amount: Amount::one(),
                },
                0,
            )
            .is_err());
        assert_eq!(db.event_count(), events_before);
    }

    #[test]
    fn mismatched_config_is_refused() {
        let db = TokenDB::open_temporary().unwrap();
        let service = TokenService::open(db.clone(), &config()).unwrap();
        service.execute(&owner(), &init_call(), 0).unwrap();

        let other = TokenConfig::devnet("Aegis Dollar", "AGD", Address::from_low_u8(0xef));
        assert!(matches!(
            TokenService::open(db, &other),
            Err(ServiceError::ConfigMismatch(_))
        ));
    }
}
