//! Publish/receive counters.

use metrics::Counter;

#[derive(Clone, Debug)]
pub(crate) struct NodeMetrics {
    pub(crate) published_total: Counter,
    pub(crate) publish_failures_total: Counter,
    pub(crate) received_total: Counter,
    pub(crate) duplicates_total: Counter,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self {
            published_total: metrics::counter!("node.published_total"),
            publish_failures_total: metrics::counter!("node.publish_failures_total"),
            received_total: metrics::counter!("node.received_total"),
            duplicates_total: metrics::counter!("node.duplicates_total"),
        }
    }
}
