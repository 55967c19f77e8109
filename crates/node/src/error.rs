use pubsub_shadow_discovery::{DiscoveryError, ResolveError};
use pubsub_shadow_identity::IdentityError;
use pubsub_shadow_overlay::OverlayError;
use pubsub_shadow_primitives::NodeIndexError;

/// Errors from running a node.
///
/// Everything except [`NodeError::Cancelled`] is fatal at startup; later failures are
/// absorbed and logged by the loops themselves.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read hostname: {0}")]
    Hostname(String),

    #[error(transparent)]
    NodeIndex(#[from] NodeIndexError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Resolver(#[from] ResolveError),

    #[error(transparent)]
    Overlay(OverlayError),

    #[error(transparent)]
    Discovery(DiscoveryError),

    #[error("operation cancelled")]
    Cancelled,
}

impl NodeError {
    /// Whether the error is the expected result of shutdown cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<OverlayError> for NodeError {
    fn from(e: OverlayError) -> Self {
        if e.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Overlay(e)
        }
    }
}

impl From<DiscoveryError> for NodeError {
    fn from(e: DiscoveryError) -> Self {
        if e.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Discovery(e)
        }
    }
}
