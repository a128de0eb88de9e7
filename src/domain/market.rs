use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::YieldWarsError;

/// Canonical identifier for a yield pool.
///
/// External data refers to pools in several shapes: human labels ("Pool A"),
/// decorated labels ("Pool A (Curvance)"), and the agent contracts' numeric
/// slot (`0`/`1`). Everything is normalized to this enum where it enters the
/// system; nothing downstream compares raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PoolId {
    #[serde(rename = "Pool A")]
    A,
    #[serde(rename = "Pool B")]
    B,
    #[serde(rename = "Pool C")]
    C,
}

/// Mapping table for raw pool references. Checked in order; first match wins.
const POOL_ALIASES: &[(&str, PoolId)] = &[
    ("pool a", PoolId::A),
    ("pool b", PoolId::B),
    ("pool c", PoolId::C),
    ("0", PoolId::A),
    ("1", PoolId::B),
    ("2", PoolId::C),
    ("a", PoolId::A),
    ("b", PoolId::B),
    ("c", PoolId::C),
];

impl PoolId {
    pub const ALL: [PoolId; 3] = [PoolId::A, PoolId::B, PoolId::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolId::A => "Pool A",
            PoolId::B => "Pool B",
            PoolId::C => "Pool C",
        }
    }

    /// Strict lookup against the alias table. Decorated labels such as
    /// "Pool B (Fastlane)" match on their "Pool B" prefix.
    pub fn lookup(raw: &str) -> Option<PoolId> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }

        for (alias, pool) in POOL_ALIASES {
            if normalized == *alias {
                return Some(*pool);
            }
        }

        // "pool a (curvance)" -> "pool a"
        let head = normalized.split('(').next().unwrap_or_default().trim();
        POOL_ALIASES
            .iter()
            .filter(|(alias, _)| alias.starts_with("pool "))
            .find(|(alias, _)| head == *alias)
            .map(|(_, pool)| *pool)
    }

    /// Lenient resolution for agent state arriving from outside.
    /// Unknown references fall back to Pool A.
    pub fn resolve(raw: &str) -> PoolId {
        Self::lookup(raw).unwrap_or(PoolId::A)
    }

    /// Strict lookup for JSON values that may be numbers or strings
    pub fn lookup_value(value: &serde_json::Value) -> Option<PoolId> {
        match value {
            serde_json::Value::String(s) => Self::lookup(s),
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|slot| u8::try_from(slot).ok())
                .map(Self::from_contract_slot),
            _ => None,
        }
    }

    /// Same as [`PoolId::resolve`] for JSON values that may be numbers or strings.
    pub fn resolve_value(value: &serde_json::Value) -> PoolId {
        Self::lookup_value(value).unwrap_or(PoolId::A)
    }

    /// Pool recorded in an agent contract's `currentPool` slot
    pub fn from_contract_slot(slot: u8) -> PoolId {
        match slot {
            0 => PoolId::A,
            1 => PoolId::B,
            2 => PoolId::C,
            _ => PoolId::A,
        }
    }

    /// Slot used when mirroring a rebalance into a two-pool agent contract.
    pub fn contract_slot(&self) -> u8 {
        match self {
            PoolId::A => 0,
            PoolId::B | PoolId::C => 1,
        }
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PoolId {
    type Err = YieldWarsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| YieldWarsError::InvalidPool(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for PoolId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        PoolId::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// One pool's APY for the current tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolQuote {
    pub pool_id: PoolId,
    /// Annual percentage yield, in percent (6.5 = 6.5%)
    pub apy: f64,
}

/// All pool quotes for one tick, in configured pool order.
///
/// The first quote is the "first configured pool" used as the fallback
/// for unrecognized pool references.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    quotes: Vec<PoolQuote>,
}

impl MarketSnapshot {
    /// Panics if `quotes` is empty: a market without pools is a configuration bug.
    pub fn new(quotes: Vec<PoolQuote>) -> Self {
        assert!(!quotes.is_empty(), "market snapshot needs at least one pool");
        Self { quotes }
    }

    pub fn quotes(&self) -> &[PoolQuote] {
        &self.quotes
    }

    pub fn get(&self, pool: PoolId) -> Option<f64> {
        self.quotes.iter().find(|q| q.pool_id == pool).map(|q| q.apy)
    }

    pub fn first(&self) -> PoolQuote {
        self.quotes[0]
    }

    pub fn to_map(&self) -> BTreeMap<PoolId, f64> {
        self.quotes.iter().map(|q| (q.pool_id, q.apy)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_mapping_table() {
        let cases = [
            ("Pool A", PoolId::A),
            ("Pool B", PoolId::B),
            ("Pool C", PoolId::C),
            ("pool b", PoolId::B),
            ("Pool A (Curvance)", PoolId::A),
            ("Pool B (Fastlane)", PoolId::B),
            ("0", PoolId::A),
            ("1", PoolId::B),
            ("2", PoolId::C),
            (" B ", PoolId::B),
        ];
        for (raw, expected) in cases {
            assert_eq!(PoolId::lookup(raw), Some(expected), "raw = {raw:?}");
        }
    }

    #[test]
    fn test_unknown_reference_defaults_to_pool_a() {
        assert_eq!(PoolId::lookup("Pool Z"), None);
        assert_eq!(PoolId::resolve("Pool Z"), PoolId::A);
        assert_eq!(PoolId::resolve(""), PoolId::A);
        assert_eq!(PoolId::resolve("0x1234"), PoolId::A);
        assert!("Pool Z".parse::<PoolId>().is_err());
    }

    #[test]
    fn test_resolve_json_values() {
        assert_eq!(PoolId::resolve_value(&serde_json::json!(0)), PoolId::A);
        assert_eq!(PoolId::resolve_value(&serde_json::json!(1)), PoolId::B);
        assert_eq!(PoolId::resolve_value(&serde_json::json!("1")), PoolId::B);
        assert_eq!(PoolId::resolve_value(&serde_json::json!(-3)), PoolId::A);
        assert_eq!(PoolId::resolve_value(&serde_json::json!(null)), PoolId::A);
    }

    #[test]
    fn test_contract_slots() {
        assert_eq!(PoolId::A.contract_slot(), 0);
        assert_eq!(PoolId::B.contract_slot(), 1);
        assert_eq!(PoolId::C.contract_slot(), 1);
        assert_eq!(PoolId::lookup_value(&serde_json::json!("Pool Z")), None);
        assert_eq!(PoolId::lookup_value(&serde_json::json!(2)), Some(PoolId::C));
    }

    #[test]
    fn test_pool_id_serializes_as_label() {
        assert_eq!(serde_json::to_string(&PoolId::B).unwrap(), "\"Pool B\"");
        let parsed: PoolId = serde_json::from_str("\"Pool C\"").unwrap();
        assert_eq!(parsed, PoolId::C);
    }

    #[test]
    fn test_snapshot_map_keys_are_labels() {
        let snapshot = MarketSnapshot::new(vec![
            PoolQuote { pool_id: PoolId::A, apy: 6.5 },
            PoolQuote { pool_id: PoolId::B, apy: 14.2 },
        ]);
        let json = serde_json::to_value(snapshot.to_map()).unwrap();
        assert_eq!(json["Pool A"], 6.5);
        assert_eq!(json["Pool B"], 14.2);
        assert_eq!(snapshot.get(PoolId::C), None);
    }
}
