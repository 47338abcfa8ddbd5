//! # Core Value Types
//!
//! The two types that show up in every signature of the ledger API:
//!
//! - [`Address`] — a 20-byte account identifier. The all-zero address is the
//!   "null" account: it is where minted tokens come from and where burned
//!   tokens go, and it is never a valid participant in its own right.
//! - [`Amount`] — a 256-bit unsigned integer. Balances, allowances, supply.
//!   `Amount::MAX` doubles as the "infinite approval" sentinel.
//!
//! Addresses serialize as `0x`-prefixed lowercase hex strings in every
//! format (JSON and bincode alike), so a state blob and a config file agree
//! on what an address looks like.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Token amounts in the smallest denomination.
pub type Amount = primitive_types::U256;

/// Length of an account address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Errors produced when parsing an address from text or bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),

    #[error("invalid address length: expected {ADDRESS_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The null account. Mint source, burn sink, never a real holder.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw address bytes.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Builds an address from a byte slice of exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        if bytes.len() != ADDRESS_LENGTH {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Handy for tests and fixtures: an address whose last byte is `tag`.
    pub const fn from_low_u8(tag: u8) -> Self {
        let mut out = [0u8; ADDRESS_LENGTH];
        out[ADDRESS_LENGTH - 1] = tag;
        Self(out)
    }

    /// Returns `true` for the null account.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Left-pads the address into a 32-byte word, the way it is encoded
    /// inside signed structured data.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

struct AddressVisitor;

impl<'de> Visitor<'de> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 0x-prefixed 20-byte hex string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Address, E> {
        Address::from_str(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(AddressVisitor)
    }
}

/// Encodes an amount as a 32-byte big-endian word.
pub fn amount_to_word(amount: &Amount) -> [u8; 32] {
    let mut word = [0u8; 32];
    amount.to_big_endian(&mut word);
    word
}

/// Parses a decimal amount string (`"1000"`), or hex when `0x`-prefixed.
pub fn parse_amount(s: &str) -> Option<Amount> {
    let s = s.trim();
    if let Some(hex_digits) = s.strip_prefix("0x") {
        Amount::from_str_radix(hex_digits, 16).ok()
    } else {
        Amount::from_dec_str(s).ok()
    }
}

/// Serde adapter for amounts in hand-written JSON: decimal strings out,
/// decimal or `0x` hex strings in. Use with `#[serde(with = "...")]`.
///
/// Persisted state keeps the default `U256` encoding; this is for files
/// people type.
pub mod decimal_amount {
    use super::{parse_amount, Amount};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_amount(&raw).ok_or_else(|| de::Error::custom(format!("invalid amount: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_amounts_in_json() {
        #[derive(Serialize, Deserialize)]
        struct Row {
            #[serde(with = "decimal_amount")]
            value: Amount,
        }
        let row: Row = serde_json::from_str(r#"{"value":"1000"}"#).unwrap();
        assert_eq!(row.value, Amount::from(1000u64));
        let row: Row = serde_json::from_str(r#"{"value":"0x10"}"#).unwrap();
        assert_eq!(row.value, Amount::from(16u64));
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"value":"16"}"#);
        assert!(serde_json::from_str::<Row>(r#"{"value":"ten"}"#).is_err());
    }

    #[test]
    fn zero_address_is_zero() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from_low_u8(1).is_zero());
    }

    #[test]
    fn hex_display_and_parse_agree() {
        let addr = Address::from_low_u8(0xab);
        let text = addr.to_string();
        assert_eq!(text, "0x00000000000000000000000000000000000000ab");
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn parse_accepts_missing_prefix() {
        let addr: Address = "00000000000000000000000000000000000000ff".parse().unwrap();
        assert_eq!(addr, Address::from_low_u8(0xff));
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            "0x1234".parse::<Address>(),
            Err(AddressError::InvalidLength(2))
        );
        assert!(matches!(
            "0xzz".parse::<Address>(),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn serde_uses_hex_strings() {
        let addr = Address::from_low_u8(7);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000000000000007\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);

        let bin = bincode::serialize(&addr).unwrap();
        let back: Address = bincode::deserialize(&bin).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn address_word_is_left_padded() {
        let word = Address::from_low_u8(9).to_word();
        assert!(word[..31].iter().all(|b| *b == 0));
        assert_eq!(word[31], 9);
    }

    #[test]
    fn amount_parsing() {
        assert_eq!(parse_amount("1000"), Some(Amount::from(1000u64)));
        assert_eq!(parse_amount("0x10"), Some(Amount::from(16u64)));
        assert_eq!(parse_amount("nope"), None);
        let word = amount_to_word(&Amount::MAX);
        assert!(word.iter().all(|b| *b == 0xff));
    }
}
