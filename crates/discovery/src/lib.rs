//! Peer discovery for pubsub-shadow nodes.
//!
//! Every node in the simulated universe is reachable as `node<index>`, and its network
//! identity can be predicted from the index alone (see `pubsub_shadow_identity`). The
//! [`Bootstrap`] loop uses both to connect to a random subset of the universe before any
//! publish/subscribe activity starts:
//!
//! 1. sample an index that is neither the local one nor already connected,
//! 2. resolve `node<index>` through a [`Resolver`],
//! 3. dial `/ip4/<addr>/tcp/<port>/p2p/<predicted peer id>`,
//! 4. repeat until the [`TerminationPolicy`] is satisfied.
//!
//! Resolution and dial failures are transient: the index is not recorded and may be sampled
//! again later. There is no backoff.

mod bootstrap;
mod error;
mod metrics;
mod resolver;

pub use bootstrap::{
    Bootstrap, BootstrapConfig, BootstrapOutcome, BootstrapState, Completion, PeerSet,
    TerminationPolicy,
};
pub use error::{DiscoveryError, ResolveError};
pub use resolver::{DnsResolver, Resolver};
