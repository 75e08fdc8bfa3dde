//! Address block codec
//!
//! An address block is a `/24` network `10.N.0.0/24` identified by its block
//! number `N`. Numbers `0` and `255` are reserved, so `N` is always in
//! `1..=254`. The canonical textual form has no leading zeros; any other
//! spelling (e.g. `10.01.0.0/24`) is rejected rather than normalized.

use crate::error::{MeshError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Lowest usable block number
pub const MIN_BLOCK: u8 = 1;

/// Highest usable block number
pub const MAX_BLOCK: u8 = 254;

/// Prefix length of every address block
pub const PREFIX_LEN: u8 = 24;

const NETWORK_PREFIX: &str = "10.";
const NETWORK_SUFFIX: &str = ".0.0/24";

/// A `/24` network `10.N.0.0/24` with `N` in `1..=254`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressBlock(u8);

impl AddressBlock {
    /// Create a block from its number, rejecting the reserved values
    pub fn new(number: u8) -> Result<Self> {
        if !(MIN_BLOCK..=MAX_BLOCK).contains(&number) {
            return Err(MeshError::Validation(format!(
                "Block number {} is out of range ({}-{})",
                number, MIN_BLOCK, MAX_BLOCK
            )));
        }
        Ok(Self(number))
    }

    /// Parse the canonical form `10.N.0.0/24`.
    ///
    /// Returns `None` for anything else so bulk readers can skip the record.
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s
            .strip_prefix(NETWORK_PREFIX)?
            .strip_suffix(NETWORK_SUFFIX)?;

        if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }

        let number: u16 = digits.parse().ok()?;
        u8::try_from(number).ok().and_then(|n| Self::new(n).ok())
    }

    /// Check whether `s` is a valid allocated block
    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_some()
    }

    /// Canonical `10.N.0.0/24` form
    pub fn format(&self) -> String {
        format!("{}{}{}", NETWORK_PREFIX, self.0, NETWORK_SUFFIX)
    }

    /// Block number `N`
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Host address `10.N.0.<host>` inside this block
    pub(crate) fn host(&self, host: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, self.0, 0, host)
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", NETWORK_PREFIX, self.0, NETWORK_SUFFIX)
    }
}

impl FromStr for AddressBlock {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            MeshError::Validation(format!(
                "Invalid address block '{}' (expected 10.N.0.0/24 with N in {}-{})",
                s, MIN_BLOCK, MAX_BLOCK
            ))
        })
    }
}

impl TryFrom<String> for AddressBlock {
    type Error = MeshError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<AddressBlock> for String {
    fn from(block: AddressBlock) -> Self {
        block.format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(AddressBlock::parse("10.1.0.0/24").map(|b| b.number()), Some(1));
        assert_eq!(AddressBlock::parse("10.42.0.0/24").map(|b| b.number()), Some(42));
        assert_eq!(AddressBlock::parse("10.254.0.0/24").map(|b| b.number()), Some(254));
    }

    #[test]
    fn test_parse_rejects_reserved_numbers() {
        assert!(AddressBlock::parse("10.0.0.0/24").is_none());
        assert!(AddressBlock::parse("10.255.0.0/24").is_none());
        assert!(AddressBlock::parse("10.256.0.0/24").is_none());
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(AddressBlock::parse("11.1.0.0/24").is_none());
        assert!(AddressBlock::parse("10.1.0.0/16").is_none());
        assert!(AddressBlock::parse("10.1.1.0/24").is_none());
        assert!(AddressBlock::parse("10.1.0.1/24").is_none());
        assert!(AddressBlock::parse("not-a-subnet").is_none());
        assert!(AddressBlock::parse("").is_none());
        assert!(AddressBlock::parse("10..0.0/24").is_none());
        assert!(AddressBlock::parse("10.1000.0.0/24").is_none());
        assert!(AddressBlock::parse("10.+1.0.0/24").is_none());
        assert!(AddressBlock::parse(" 10.1.0.0/24").is_none());
    }

    #[test]
    fn test_parse_rejects_leading_zeros() {
        assert!(AddressBlock::parse("10.01.0.0/24").is_none());
        assert!(AddressBlock::parse("10.001.0.0/24").is_none());
    }

    #[test]
    fn test_new_range() {
        assert!(AddressBlock::new(0).is_err());
        assert!(AddressBlock::new(1).is_ok());
        assert!(AddressBlock::new(254).is_ok());
        assert!(AddressBlock::new(255).is_err());
    }

    #[test]
    fn test_format_and_display_agree() {
        let block = AddressBlock::new(7).unwrap();
        assert_eq!(block.format(), "10.7.0.0/24");
        assert_eq!(block.to_string(), block.format());
    }

    #[test]
    fn test_from_str_error() {
        let err = "10.1.0.0/16".parse::<AddressBlock>().unwrap_err();
        assert!(matches!(err, MeshError::Validation(_)));
    }

    #[test]
    fn test_serde_as_string() {
        let block = AddressBlock::new(12).unwrap();
        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(json, "\"10.12.0.0/24\"");

        let restored: AddressBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, block);
        assert!(serde_json::from_str::<AddressBlock>("\"10.0.0.0/24\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_parse_format_round_trip(n in MIN_BLOCK..=MAX_BLOCK) {
            let block = AddressBlock::new(n).unwrap();
            prop_assert_eq!(AddressBlock::parse(&block.format()), Some(block));
        }

        #[test]
        fn prop_parse_never_panics(s in "\\PC*") {
            let _ = AddressBlock::parse(&s);
        }
    }
}
