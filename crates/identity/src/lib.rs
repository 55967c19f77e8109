//! Deterministic node identity.
//!
//! Provides [`Identity`], a keypair derived solely from a [`NodeIndex`]. The seed is the
//! index encoded as 8 little-endian bytes at the start of a 32-byte ed25519 seed buffer,
//! remaining bytes zero.
//!
//! Every node shares this derivation, so the [`PeerId`] of a peer that has never been
//! contacted can be predicted from its index alone. This is a bootstrap shortcut for a
//! closed simulation universe, not a trust mechanism: anyone who knows an index can
//! derive its private key.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use libp2p::{
    PeerId,
    identity::{DecodingError, Keypair, PublicKey},
};
use pubsub_shadow_primitives::NodeIndex;

/// Size of an ed25519 secret key seed.
pub const SEED_SIZE: usize = 32;

/// Errors from identity derivation.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("key generation rejected the seed: {0}")]
    InvalidSeed(#[from] DecodingError),
}

/// Seed buffer for `index`.
pub fn seed_for(index: NodeIndex) -> [u8; SEED_SIZE] {
    let mut seed = [0u8; SEED_SIZE];
    let (head, _) = seed.split_at_mut(8);
    head.copy_from_slice(&index.get().to_le_bytes());
    seed
}

/// Derives the keypair of `index`.
pub fn derive_keypair(index: NodeIndex) -> Result<Keypair, IdentityError> {
    Ok(Keypair::ed25519_from_bytes(seed_for(index))?)
}

/// Predicts the peer id of the node at `index` without contacting it.
pub fn predict_peer_id(index: NodeIndex) -> Result<PeerId, IdentityError> {
    Ok(derive_keypair(index)?.public().to_peer_id())
}

/// A node's keypair together with its derived network identity.
#[derive(Clone)]
pub struct Identity {
    index: NodeIndex,
    keypair: Keypair,
    peer_id: PeerId,
}

impl Identity {
    /// Derives the identity of the node at `index`.
    pub fn derive(index: NodeIndex) -> Result<Self, IdentityError> {
        let keypair = derive_keypair(index)?;
        let peer_id = keypair.public().to_peer_id();
        Ok(Self {
            index,
            keypair,
            peer_id,
        })
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public()
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Logs the identity at startup.
    pub fn log(&self) {
        tracing::info!(index = %self.index, peer_id = %self.peer_id, "Derived node identity");
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("index", &self.index)
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}
