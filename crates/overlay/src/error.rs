use libp2p::Multiaddr;

/// Errors from the overlay boundary.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("invalid overlay configuration: {0}")]
    Config(String),

    #[error("transport setup failed: {0}")]
    Transport(String),

    #[error("failed to listen on {addr}: {reason}")]
    Listen { addr: Multiaddr, reason: String },

    #[error("failed to dial {addr}: {reason}")]
    Dial { addr: Multiaddr, reason: String },

    #[error("dial to {0} timed out")]
    DialTimeout(Multiaddr),

    #[error("failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("topic {0} has not been joined")]
    NotJoined(String),

    #[error("publish rejected: {0}")]
    Publish(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("overlay closed")]
    Closed,
}

impl OverlayError {
    /// Whether the error is the expected result of shutdown cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
