//! Randomized bootstrap loop.

use crate::{DiscoveryError, Resolver, metrics::DiscoveryMetrics};
use clap::ValueEnum;
use libp2p::{Multiaddr, multiaddr::Protocol};
use pubsub_shadow_identity::predict_peer_id;
use pubsub_shadow_overlay::Overlay;
use pubsub_shadow_primitives::NodeIndex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, net::IpAddr};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// When the bootstrap loop considers the node connected enough.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationPolicy {
    /// Stop once the loop itself has connected to the target number of peers.
    #[default]
    PeerSet,
    /// Stop once the overlay reports the target number of live connections, counting
    /// connections other nodes opened to this one.
    LiveConnections,
}

impl fmt::Display for TerminationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PeerSet => "peer-set",
            Self::LiveConnections => "live-connections",
        })
    }
}

/// Inputs of the bootstrap loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// The local node.
    pub local: NodeIndex,
    /// Total number of simulated nodes; candidates are drawn from `[0, universe_size)`.
    pub universe_size: u64,
    pub target_peers: usize,
    /// Port every node listens on.
    pub port: u16,
    pub policy: TerminationPolicy,
}

impl BootstrapConfig {
    /// Number of indices in the universe other than the local one.
    pub fn candidates(&self) -> u64 {
        let local_in_universe = self.local.get() < self.universe_size;
        self.universe_size - u64::from(local_in_universe)
    }

    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.target_peers as u64 > self.candidates() {
            return Err(DiscoveryError::UnreachableTarget {
                target: self.target_peers,
                universe: self.universe_size,
            });
        }
        Ok(())
    }
}

/// Indices this node has connected to. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet {
    peers: HashSet<NodeIndex>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `index`. Returns `false` if it was already present.
    pub fn insert(&mut self, index: NodeIndex) -> bool {
        self.peers.insert(index)
    }

    pub fn contains(&self, index: NodeIndex) -> bool {
        self.peers.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.peers.iter().copied()
    }
}

/// Where the loop is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    Sampling,
    Resolving(NodeIndex),
    Connecting(NodeIndex, Vec<IpAddr>),
    Done(Completion),
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The termination policy was satisfied.
    TargetReached,
    /// Every other index is already in the peer set, but the policy is still unmet.
    Exhausted,
}

/// Result of a completed bootstrap.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub completion: Completion,
    pub peers: PeerSet,
    /// Candidates sampled, including failed ones.
    pub attempts: u64,
}

/// The bootstrap loop. Owns its [`PeerSet`] exclusively.
pub struct Bootstrap<'a, O: ?Sized, R: ?Sized, G> {
    overlay: &'a O,
    resolver: &'a R,
    config: BootstrapConfig,
    rng: G,
    peers: PeerSet,
    attempts: u64,
    metrics: DiscoveryMetrics,
}

impl<'a, O, R, G> Bootstrap<'a, O, R, G>
where
    O: Overlay + ?Sized,
    R: Resolver + ?Sized,
    G: Rng + Send,
{
    pub fn new(
        overlay: &'a O,
        resolver: &'a R,
        config: BootstrapConfig,
        rng: G,
    ) -> Result<Self, DiscoveryError> {
        config.validate()?;
        Ok(Self {
            overlay,
            resolver,
            config,
            rng,
            peers: PeerSet::new(),
            attempts: 0,
            metrics: DiscoveryMetrics::default(),
        })
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    /// Runs until the termination policy is met, the candidates are exhausted or `cancel`
    /// fires.
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<BootstrapOutcome, DiscoveryError> {
        info!(
            local = %self.config.local,
            universe = self.config.universe_size,
            target = self.config.target_peers,
            policy = %self.config.policy,
            "Starting bootstrap"
        );

        let mut state = BootstrapState::Sampling;
        loop {
            if cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled);
            }
            state = match state {
                BootstrapState::Sampling => self.sample().await?,
                BootstrapState::Resolving(index) => self.resolve(index, cancel).await?,
                BootstrapState::Connecting(index, addrs) => {
                    self.connect(index, addrs, cancel).await?
                }
                BootstrapState::Done(completion) => {
                    info!(
                        peers = self.peers.len(),
                        attempts = self.attempts,
                        ?completion,
                        "Bootstrap finished"
                    );
                    return Ok(BootstrapOutcome {
                        completion,
                        peers: self.peers,
                        attempts: self.attempts,
                    });
                }
            };
        }
    }

    async fn target_reached(&self) -> Result<bool, DiscoveryError> {
        let count = match self.config.policy {
            TerminationPolicy::PeerSet => self.peers.len(),
            TerminationPolicy::LiveConnections => self.overlay.connected_peers().await?,
        };
        Ok(count >= self.config.target_peers)
    }

    async fn sample(&mut self) -> Result<BootstrapState, DiscoveryError> {
        if self.target_reached().await? {
            return Ok(BootstrapState::Done(Completion::TargetReached));
        }
        if self.peers.len() as u64 >= self.config.candidates() {
            warn!(
                peers = self.peers.len(),
                target = self.config.target_peers,
                "Every candidate is already connected, stopping short of target"
            );
            return Ok(BootstrapState::Done(Completion::Exhausted));
        }

        self.attempts += 1;
        self.metrics.attempts_total.increment(1);
        Ok(BootstrapState::Resolving(draw_candidate(
            &mut self.rng,
            &self.config,
            &self.peers,
        )))
    }

    async fn resolve(
        &mut self,
        index: NodeIndex,
        cancel: &CancellationToken,
    ) -> Result<BootstrapState, DiscoveryError> {
        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
            res = self.resolver.resolve(index) => res,
        };

        match resolved {
            Ok(addrs) => Ok(BootstrapState::Connecting(index, addrs)),
            Err(e) => {
                info!(%index, error = %e, "Failed resolving peer address");
                self.metrics.resolve_failures_total.increment(1);
                Ok(BootstrapState::Sampling)
            }
        }
    }

    async fn connect(
        &mut self,
        index: NodeIndex,
        addrs: Vec<IpAddr>,
        cancel: &CancellationToken,
    ) -> Result<BootstrapState, DiscoveryError> {
        let peer = predict_peer_id(index)?;

        for ip in addrs {
            let addr = Multiaddr::from(ip)
                .with(Protocol::Tcp(self.config.port))
                .with(Protocol::P2p(peer));

            match self.overlay.connect(addr.clone(), peer, cancel).await {
                Ok(()) => {
                    self.peers.insert(index);
                    self.metrics.connected_total.increment(1);
                    info!(%index, %peer, %addr, peers = self.peers.len(), "Connected to peer");
                    return Ok(BootstrapState::Sampling);
                }
                Err(e) if e.is_cancelled() => return Err(DiscoveryError::Cancelled),
                Err(e) => info!(%index, %addr, error = %e, "Failed connecting to peer"),
            }
        }

        self.metrics.connect_failures_total.increment(1);
        Ok(BootstrapState::Sampling)
    }
}

/// Draws uniformly from `[0, universe_size)` until hitting an index that is neither local
/// nor already connected.
///
/// Callers must ensure such an index exists.
fn draw_candidate<G: Rng>(rng: &mut G, config: &BootstrapConfig, peers: &PeerSet) -> NodeIndex {
    loop {
        let index = NodeIndex::new(rng.random_range(0..config.universe_size));
        if index != config.local && !peers.contains(index) {
            return index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn config(local: u64, universe: u64, target: usize) -> BootstrapConfig {
        BootstrapConfig {
            local: NodeIndex::new(local),
            universe_size: universe,
            target_peers: target,
            port: 9000,
            policy: TerminationPolicy::PeerSet,
        }
    }

    #[test]
    fn target_must_fit_universe() {
        assert!(config(0, 20, 19).validate().is_ok());
        assert_matches!(
            config(0, 20, 20).validate(),
            Err(DiscoveryError::UnreachableTarget {
                target: 20,
                universe: 20
            })
        );
        // A local index outside the universe leaves every index as a candidate.
        assert!(config(20, 20, 20).validate().is_ok());
    }

    #[test]
    fn peer_set_rejects_repeats() {
        let mut peers = PeerSet::new();
        assert!(peers.insert(NodeIndex::new(3)));
        assert!(!peers.insert(NodeIndex::new(3)));
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn draws_the_only_remaining_candidate() {
        let cfg = config(1, 4, 3);
        let mut peers = PeerSet::new();
        peers.insert(NodeIndex::new(0));
        peers.insert(NodeIndex::new(3));

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(draw_candidate(&mut rng, &cfg, &peers), NodeIndex::new(2));
        }
    }

    proptest! {
        #[test]
        fn draws_never_local_nor_known(
            universe in 2u64..64,
            local_seed in any::<u64>(),
            known in proptest::collection::vec(any::<u64>(), 0..32),
            seed in any::<u64>(),
        ) {
            let local = local_seed % universe;
            let cfg = config(local, universe, 1);
            let mut peers = PeerSet::new();
            for k in known {
                let index = k % universe;
                if index != local && (peers.len() as u64) < cfg.candidates() - 1 {
                    peers.insert(NodeIndex::new(index));
                }
            }

            let mut rng = StdRng::seed_from_u64(seed);
            let drawn = draw_candidate(&mut rng, &cfg, &peers);
            prop_assert_ne!(drawn, cfg.local);
            prop_assert!(!peers.contains(drawn));
            prop_assert!(drawn.get() < universe);
        }
    }
}
