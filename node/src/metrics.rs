//! # Prometheus Metrics
//!
//! Call outcomes and ledger gauges for one hosted token. Printed in the
//! Prometheus text exposition format after `apply --metrics`, so a cron job
//! can push it to a gateway or drop it in a textfile collector.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use aegis_contracts::Token;
use aegis_protocol::Amount;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Calls applied, by operation.
    pub calls_applied_total: IntCounterVec,
    /// Calls rejected, by operation and error kind.
    pub calls_rejected_total: IntCounterVec,
    /// Events appended to the journal.
    pub events_emitted_total: IntCounter,
    /// Total supply, low 64 bits, saturating.
    pub total_supply: IntGauge,
    /// Accounts with a non-zero balance.
    pub holders: IntGauge,
    /// Accounts on the deny-list.
    pub blocked_accounts: IntGauge,
    /// Active layout version.
    pub schema_version: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("aegis".into()), None)?;

        let calls_applied_total = IntCounterVec::new(
            Opts::new("calls_applied_total", "Token calls applied successfully"),
            &["op"],
        )?;
        registry.register(Box::new(calls_applied_total.clone()))?;

        let calls_rejected_total = IntCounterVec::new(
            Opts::new("calls_rejected_total", "Token calls rejected with no effect"),
            &["op", "kind"],
        )?;
        registry.register(Box::new(calls_rejected_total.clone()))?;

        let events_emitted_total =
            IntCounter::new("events_emitted_total", "Events appended to the journal")?;
        registry.register(Box::new(events_emitted_total.clone()))?;

        let total_supply = IntGauge::new(
            "total_supply",
            "Total supply in base units (low 64 bits, saturating)",
        )?;
        registry.register(Box::new(total_supply.clone()))?;

        let holders = IntGauge::new("holders", "Accounts with a non-zero balance")?;
        registry.register(Box::new(holders.clone()))?;

        let blocked_accounts = IntGauge::new("blocked_accounts", "Accounts on the deny-list")?;
        registry.register(Box::new(blocked_accounts.clone()))?;

        let schema_version = IntGauge::new("schema_version", "Active state layout version")?;
        registry.register(Box::new(schema_version.clone()))?;

        Ok(Self {
            registry,
            calls_applied_total,
            calls_rejected_total,
            events_emitted_total,
            total_supply,
            holders,
            blocked_accounts,
            schema_version,
        })
    }

    pub fn record_applied(&self, op: &str, events: usize) {
        self.calls_applied_total.with_label_values(&[op]).inc();
        self.events_emitted_total.inc_by(events as u64);
    }

    pub fn record_rejected(&self, op: &str, kind: &str) {
        self.calls_rejected_total.with_label_values(&[op, kind]).inc();
    }

    /// Refreshes the gauges from `token`.
    pub fn observe(&self, token: &Token) {
        let supply = token.total_supply();
        let low = if supply > Amount::from(i64::MAX as u64) {
            i64::MAX
        } else {
            supply.low_u64() as i64
        };
        self.total_supply.set(low);
        self.holders.set(token.holder_count() as i64);
        self.blocked_accounts.set(token.blocked_accounts().len() as i64);
        self.schema_version.set(i64::from(token.schema_version()));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_protocol::config::CHAIN_ID_DEVNET;
    use aegis_protocol::Address;

    #[test]
    fn counters_and_gauges_render() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.record_applied("mint", 2);
        metrics.record_rejected("transfer", "blocked");

        let mut token = Token::new(CHAIN_ID_DEVNET, Address::from_low_u8(0xee));
        let owner = Address::from_low_u8(1);
        token.initialize(&owner, "Aegis Dollar", "AGD", 18).unwrap();
        token
            .mint(&owner, Address::from_low_u8(2), Amount::from(500u64))
            .unwrap();
        metrics.observe(&token);

        let text = metrics.encode().unwrap();
        assert!(text.contains("aegis_calls_applied_total{op=\"mint\"} 1"));
        let rejected = text
            .lines()
            .find(|l| l.starts_with("aegis_calls_rejected_total{"))
            .unwrap();
        assert!(rejected.contains("kind=\"blocked\""));
        assert!(rejected.ends_with(" 1"));
        assert!(text.contains("aegis_events_emitted_total 2"));
        assert!(text.contains("aegis_total_supply 500"));
        assert!(text.contains("aegis_holders 1"));
    }

    #[test]
    fn huge_supply_saturates() {
        let metrics = NodeMetrics::new().unwrap();
        let mut token = Token::new(CHAIN_ID_DEVNET, Address::from_low_u8(0xee));
        let owner = Address::from_low_u8(1);
        token.initialize(&owner, "Aegis Dollar", "AGD", 18).unwrap();
        token.mint(&owner, owner, Amount::MAX).unwrap();
        metrics.observe(&token);
        assert_eq!(metrics.total_supply.get(), i64::MAX);
    }
}
