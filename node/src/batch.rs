//! # Call Batches
//!
//! A batch is a JSON array of entries, each naming a caller and a call:
//!
//! ```json
//! [
//!   { "caller": "0x…01", "call": { "op": "mint", "to": "0x…a1", "amount": "1000" } },
//!   { "caller": "0x…a1", "call": { "op": "transfer", "to": "0x…b0", "amount": "250" } }
//! ]
//! ```
//!
//! Entries are applied in order, each as its own atomic call. A rejected
//! entry does not roll back the ones before it.

use aegis_contracts::{ServiceError, TokenCall, TokenEvent, TokenService};
use aegis_protocol::Address;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::metrics::NodeMetrics;

/// One call in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub caller: Address,
    pub call: TokenCall,
}

/// Result of one entry, printed as a JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct CallOutcome {
    pub index: usize,
    pub op: &'static str,
    pub caller: Address,
    #[serde(flatten)]
    pub status: CallStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallStatus {
    Applied { events: Vec<TokenEvent> },
    Rejected { kind: &'static str, error: String },
}

impl CallOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, CallStatus::Applied { .. })
    }
}

/// Reads and parses a batch file.
pub fn load_batch(path: &Path) -> anyhow::Result<Vec<BatchEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file {}", path.display()))?;
    parse_batch(&raw).with_context(|| format!("failed to parse batch file {}", path.display()))
}

pub fn parse_batch(raw: &str) -> anyhow::Result<Vec<BatchEntry>> {
    Ok(serde_json::from_str(raw)?)
}

/// Label for a rejection, matching the token's error taxonomy.
pub fn rejection_kind(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::Token(e) => e.kind().label(),
        ServiceError::Storage(_) => "storage",
        ServiceError::ConfigMismatch(_) | ServiceError::CorruptState(_) => "state",
    }
}

/// Applies `entries` in order. Stops after the first rejection when
/// `stop_on_error` is set.
pub fn apply_batch(
    service: &TokenService,
    entries: &[BatchEntry],
    now: u64,
    stop_on_error: bool,
    metrics: &NodeMetrics,
) -> Vec<CallOutcome> {
    let mut outcomes = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let op = entry.call.name();
        let status = match service.execute(&entry.caller, &entry.call, now) {
            Ok(events) => {
                metrics.record_applied(op, events.len());
                CallStatus::Applied { events }
            }
            Err(e) => {
                let kind = rejection_kind(&e);
                metrics.record_rejected(op, kind);
                CallStatus::Rejected {
                    kind,
                    error: e.to_string(),
                }
            }
        };
        let outcome = CallOutcome {
            index,
            op,
            caller: entry.caller,
            status,
        };
        let stop = stop_on_error && !outcome.is_applied();
        outcomes.push(outcome);
        if stop {
            tracing::warn!(index, op, "stopping batch at first rejection");
            break;
        }
    }
    service.read(|token| metrics.observe(token));
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_contracts::Token;
    use aegis_protocol::config::TokenConfig;
    use aegis_protocol::storage::TokenDB;
    use aegis_protocol::Amount;

    const BATCH: &str = r#"[
        {"caller": "0x0000000000000000000000000000000000000001",
         "call": {"op": "initialize", "name": "Aegis Dollar", "symbol": "AGD", "decimals": 18}},
        {"caller": "0x0000000000000000000000000000000000000001",
         "call": {"op": "mint", "to": "0x00000000000000000000000000000000000000a1", "amount": "1000"}},
        {"caller": "0x00000000000000000000000000000000000000a1",
         "call": {"op": "transfer", "to": "0x00000000000000000000000000000000000000b0", "amount": "5000"}},
        {"caller": "0x00000000000000000000000000000000000000a1",
         "call": {"op": "transfer", "to": "0x00000000000000000000000000000000000000b0", "amount": "250"}}
    ]"#;

    fn service() -> TokenService {
        let config = TokenConfig::devnet("Aegis Dollar", "AGD", Address::from_low_u8(0xee));
        TokenService::in_memory(Token::from_config(&config))
    }

    #[test]
    fn batch_parses() {
        let entries = parse_batch(BATCH).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1].call.name(), "mint");
        assert_eq!(entries[0].caller, Address::from_low_u8(1));
    }

    #[test]
    fn rejected_entry_does_not_stop_the_batch() {
        let service = service();
        let metrics = NodeMetrics::new().unwrap();
        let outcomes = apply_batch(&service, &parse_batch(BATCH).unwrap(), 0, false, &metrics);

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[1].is_applied());
        assert!(!outcomes[2].is_applied());
        assert!(outcomes[3].is_applied());
        assert!(matches!(
            outcomes[2].status,
            CallStatus::Rejected {
                kind: "insufficient_funds",
                ..
            }
        ));
        assert_eq!(
            service.read(|t| t.balance_of(&Address::from_low_u8(0xb0))),
            Amount::from(250u64)
        );
    }

    #[test]
    fn stop_on_error_halts() {
        let service = service();
        let metrics = NodeMetrics::new().unwrap();
        let outcomes = apply_batch(&service, &parse_batch(BATCH).unwrap(), 0, true, &metrics);
        assert_eq!(outcomes.len(), 3);
    }

    #[test]
    fn outcome_serializes_flat() {
        let outcome = CallOutcome {
            index: 2,
            op: "transfer",
            caller: Address::from_low_u8(1),
            status: CallStatus::Rejected {
                kind: "blocked",
                error: "account is blocked".into(),
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["kind"], "blocked");
        assert_eq!(json["index"], 2);
    }

    #[test]
    fn applied_batch_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let batch_path = dir.path().join("batch.json");
        std::fs::write(&batch_path, BATCH).unwrap();
        let db_path = dir.path().join("db");
        let config = TokenConfig::devnet("Aegis Dollar", "AGD", Address::from_low_u8(0xee));

        {
            let service = TokenService::open(TokenDB::open(&db_path).unwrap(), &config).unwrap();
            let metrics = NodeMetrics::new().unwrap();
            let entries = load_batch(&batch_path).unwrap();
            let outcomes = apply_batch(&service, &entries, 0, false, &metrics);
            assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 3);
        }

        let service = TokenService::open(TokenDB::open(&db_path).unwrap(), &config).unwrap();
        let token = service.snapshot();
        assert_eq!(token.balance_of(&Address::from_low_u8(0xa1)), Amount::from(750u64));
        assert_eq!(token.balance_of(&Address::from_low_u8(0xb0)), Amount::from(250u64));
        assert_eq!(token.owner(), Address::from_low_u8(1));
    }

    #[test]
    fn missing_batch_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_batch(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
