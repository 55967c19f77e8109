use pubsub_shadow_identity::IdentityError;
use pubsub_shadow_overlay::OverlayError;

/// Errors from name resolution. All of them are retryable.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("resolver setup failed: {0}")]
    Setup(String),

    #[error("lookup of {hostname} failed: {reason}")]
    Lookup { hostname: String, reason: String },

    #[error("{0} resolved to no addresses")]
    NoAddresses(String),
}

/// Errors that end the bootstrap loop.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("target of {target} peers cannot be met in a universe of {universe} nodes")]
    UnreachableTarget { target: usize, universe: u64 },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("overlay unavailable: {0}")]
    Overlay(OverlayError),

    #[error("bootstrap cancelled")]
    Cancelled,
}

impl DiscoveryError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<OverlayError> for DiscoveryError {
    fn from(e: OverlayError) -> Self {
        if e.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Overlay(e)
        }
    }
}
