//! Node index and the `node<index>` hostname convention.

use serde::{Deserialize, Serialize};
use std::{fmt, num::ParseIntError, str::FromStr};

/// Prefix shared by every simulated node hostname.
pub const HOSTNAME_PREFIX: &str = "node";

/// Errors from parsing a hostname into a [`NodeIndex`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeIndexError {
    #[error("hostname {0:?} does not start with \"{HOSTNAME_PREFIX}\"")]
    MissingPrefix(String),

    #[error("hostname {hostname:?} has no valid node index: {source}")]
    InvalidIndex {
        hostname: String,
        #[source]
        source: ParseIntError,
    },
}

/// Numeric index of a simulated node, unique per process.
///
/// Derived once from the hostname and immutable afterwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeIndex(u64);

impl NodeIndex {
    /// Creates an index from its raw value.
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Parses `node<index>`, optionally followed by a domain (`node7.sim.local`).
    pub fn from_hostname(hostname: &str) -> Result<Self, NodeIndexError> {
        let label = hostname.split('.').next().unwrap_or_default();
        let digits = label
            .strip_prefix(HOSTNAME_PREFIX)
            .ok_or_else(|| NodeIndexError::MissingPrefix(hostname.to_string()))?;

        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|source| NodeIndexError::InvalidIndex {
                hostname: hostname.to_string(),
                source,
            })
    }

    /// Hostname under which this node is reachable.
    pub fn hostname(self) -> String {
        format!("{HOSTNAME_PREFIX}{}", self.0)
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeIndex {
    type Err = NodeIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hostname(s)
    }
}

impl From<u64> for NodeIndex {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_hostname() {
        assert_eq!(NodeIndex::from_hostname("node0").unwrap(), NodeIndex::new(0));
        assert_eq!(
            NodeIndex::from_hostname("node4999").unwrap(),
            NodeIndex::new(4999)
        );
    }

    #[test]
    fn parses_fully_qualified_hostname() {
        assert_eq!(
            NodeIndex::from_hostname("node12.shadow.local").unwrap(),
            NodeIndex::new(12)
        );
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(matches!(
            NodeIndex::from_hostname("validator3"),
            Err(NodeIndexError::MissingPrefix(_))
        ));
    }

    #[test]
    fn rejects_missing_or_malformed_index() {
        for hostname in ["node", "node-3", "node3a", "node 3", "node18446744073709551616"] {
            assert!(
                matches!(
                    NodeIndex::from_hostname(hostname),
                    Err(NodeIndexError::InvalidIndex { .. })
                ),
                "{hostname} should be rejected"
            );
        }
    }

    #[test]
    fn hostname_round_trips() {
        let index = NodeIndex::new(42);
        assert_eq!(index.hostname(), "node42");
        assert_eq!(index.hostname().parse::<NodeIndex>().unwrap(), index);
    }
}
