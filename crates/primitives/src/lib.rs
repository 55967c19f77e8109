//! Core types shared by every pubsub-shadow node.
//!
//! - [`NodeIndex`]: the numeric identity of a simulated node, taken from its `node<index>`
//!   hostname.
//! - [`ContentId`]: the content-hash identity of a published payload.
//! - [`TOPIC`]: the single well-known topic all nodes join.

mod content;
mod node_index;

pub use content::ContentId;
pub use node_index::{NodeIndex, NodeIndexError, HOSTNAME_PREFIX};

/// Name of the topic every node joins, subscribes to and publishes on.
pub const TOPIC: &str = "foobar";
