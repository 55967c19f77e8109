//! Bootstrap counters.

use metrics::Counter;

#[derive(Clone, Debug)]
pub(crate) struct DiscoveryMetrics {
    /// Candidates sampled.
    pub(crate) attempts_total: Counter,
    /// Candidates whose name did not resolve.
    pub(crate) resolve_failures_total: Counter,
    /// Candidates that resolved but could not be dialed.
    pub(crate) connect_failures_total: Counter,
    /// Candidates added to the peer set.
    pub(crate) connected_total: Counter,
}

impl Default for DiscoveryMetrics {
    fn default() -> Self {
        Self {
            attempts_total: metrics::counter!("discovery.attempts_total"),
            resolve_failures_total: metrics::counter!("discovery.resolve_failures_total"),
            connect_failures_total: metrics::counter!("discovery.connect_failures_total"),
            connected_total: metrics::counter!("discovery.connected_total"),
        }
    }
}
