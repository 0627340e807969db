use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Milliseconds between the Unix epoch and 2020-01-01T00:00:00Z
const ID_EPOCH_MS: u64 = 1_577_836_800_000;

/// Bits reserved below the timestamp for the node and sequence fields
const TIMESTAMP_SHIFT: u32 = 22;
const NODE_SHIFT: u32 = 12;

/// Highest node number that fits the 10 bit node field with room to spare
const MAX_NODE: u64 = 1022;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A process-unique, URL-safe pool identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(String);

impl PoolId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PoolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PoolId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PoolId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<PoolId> for String {
    fn from(id: PoolId) -> Self {
        id.0
    }
}

/// Snowflake-style identifier source.
///
/// Each id packs a millisecond timestamp, a node number and a sequence counter into 64 bits.
/// Values are strictly increasing for the lifetime of the generator, even if the clock stalls
/// or steps backwards.
#[derive(Debug)]
pub struct PoolIdGenerator {
    node: u64,
    last: u64,
}

impl PoolIdGenerator {
    /// Construct a generator whose node number is seeded from the current time
    #[must_use]
    pub fn new() -> Self {
        let seed = since_unix_epoch().as_nanos() % u128::from(MAX_NODE);
        Self::with_node(u16::try_from(seed).unwrap_or_default())
    }

    /// Construct a generator with an explicit node number (wrapped into range)
    #[must_use]
    pub fn with_node(node: u16) -> Self {
        Self {
            node: u64::from(node) % MAX_NODE,
            last: 0,
        }
    }

    /// Produce the next identifier
    #[allow(clippy::cast_possible_truncation)]
    pub fn generate(&mut self) -> PoolId {
        let millis = (since_unix_epoch().as_millis() as u64).saturating_sub(ID_EPOCH_MS);
        let candidate = (millis << TIMESTAMP_SHIFT) | (self.node << NODE_SHIFT);
        let value = candidate.max(self.last + 1);
        self.last = value;
        PoolId(to_base36(value))
    }
}

impl Default for PoolIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn since_unix_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

#[allow(clippy::cast_possible_truncation)]
fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.iter().rev().map(|&digit| char::from(digit)).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(u64::MAX), "3w5e11264sgsf");
    }

    #[test]
    fn test_ids_are_unique() {
        let mut generator = PoolIdGenerator::with_node(7);
        let ids: HashSet<PoolId> = (0..10_000).map(|_| generator.generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_ids_are_url_safe() {
        let mut generator = PoolIdGenerator::new();
        let id = generator.generate();
        assert!(!id.as_str().is_empty());
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_node_is_wrapped() {
        assert_eq!(PoolIdGenerator::with_node(1022).node, 0);
        assert_eq!(PoolIdGenerator::with_node(1023).node, 1);
    }
}
