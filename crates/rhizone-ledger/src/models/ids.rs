//! Identifiers and time.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Current unix time in seconds.
pub fn now_secs() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// External identity of a community member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MemberId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(MemberId)
    }
}

/// Sequence id of a custody grant.
///
/// Monotonic from 1. Doubles as the generation marker used by the lottery
/// and as the public invite number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantId(pub u64);

impl GrantId {
    /// Key fragment that sorts lexicographically in sequence order.
    pub(crate) fn sort_key(&self) -> String {
        format!("{:020}", self.0)
    }
}

impl std::fmt::Display for GrantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_sort_key_orders_numerically() {
        assert!(GrantId(9).sort_key() < GrantId(10).sort_key());
        assert!(GrantId(99).sort_key() < GrantId(100).sort_key());
    }

    #[test]
    fn member_id_parses_with_whitespace() {
        let id: MemberId = " 42 ".parse().unwrap();
        assert_eq!(id, MemberId(42));
        assert!("abc".parse::<MemberId>().is_err());
    }

    #[test]
    fn member_id_serializes_as_number() {
        let json = serde_json::to_string(&MemberId(7)).unwrap();
        assert_eq!(json, "7");
    }
}
