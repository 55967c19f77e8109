//! Overlay CLI arguments.

use clap::Args;
use libp2p::{Multiaddr, multiaddr::Protocol};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// Default listen port shared by every node.
pub const DEFAULT_PORT: u16 = 9000;

const DEFAULT_MESH_DEGREE: usize = 8;
const DEFAULT_MESH_DEGREE_LOW: usize = 6;
const DEFAULT_MESH_DEGREE_HIGH: usize = 12;
const DEFAULT_ANNOUNCE_DEGREE: usize = 8;
const DEFAULT_HEARTBEAT_MS: u64 = 700;
const DEFAULT_HISTORY_LENGTH: usize = 6;
const DEFAULT_HISTORY_GOSSIP: usize = 3;
const DEFAULT_CONTROL_TIMEOUT_MS: u64 = 3000;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 10;

/// Gossipsub mesh and transport configuration.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Overlay")]
#[serde(default)]
pub struct OverlayArgs {
    /// Address to listen on.
    #[arg(long = "network.addr", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub addr: IpAddr,

    /// Port to listen on. Every node listens on the same port.
    #[arg(long = "network.port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Mesh degree (D).
    #[arg(long = "mesh.d", default_value_t = DEFAULT_MESH_DEGREE)]
    pub mesh_degree: usize,

    /// Lower mesh degree bound (Dlo).
    #[arg(long = "mesh.dlo", default_value_t = DEFAULT_MESH_DEGREE_LOW)]
    pub mesh_degree_low: usize,

    /// Upper mesh degree bound (Dhi).
    #[arg(long = "mesh.dhi", default_value_t = DEFAULT_MESH_DEGREE_HIGH)]
    pub mesh_degree_high: usize,

    /// Announce degree (Dannounce).
    #[arg(long = "mesh.dannounce", default_value_t = DEFAULT_ANNOUNCE_DEGREE)]
    pub announce_degree: usize,

    /// Heartbeat interval in milliseconds.
    #[arg(long = "mesh.heartbeat-ms", default_value_t = DEFAULT_HEARTBEAT_MS)]
    pub heartbeat_ms: u64,

    /// Number of heartbeats a message stays in the message cache.
    #[arg(long = "mesh.history-length", default_value_t = DEFAULT_HISTORY_LENGTH)]
    pub history_length: usize,

    /// Number of recent heartbeats advertised in IHAVE gossip.
    #[arg(long = "mesh.history-gossip", default_value_t = DEFAULT_HISTORY_GOSSIP)]
    pub history_gossip: usize,

    /// Time to wait for a message requested through IWANT, in milliseconds.
    #[arg(long = "mesh.control-timeout-ms", default_value_t = DEFAULT_CONTROL_TIMEOUT_MS)]
    pub control_timeout_ms: u64,

    /// Close connections idle for this many seconds.
    #[arg(long = "network.idle-timeout", default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,

    /// Give up on a dial after this many seconds.
    #[arg(long = "network.dial-timeout", default_value_t = DEFAULT_DIAL_TIMEOUT_SECS)]
    pub dial_timeout_secs: u64,
}

impl Default for OverlayArgs {
    fn default() -> Self {
        Self {
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            mesh_degree: DEFAULT_MESH_DEGREE,
            mesh_degree_low: DEFAULT_MESH_DEGREE_LOW,
            mesh_degree_high: DEFAULT_MESH_DEGREE_HIGH,
            announce_degree: DEFAULT_ANNOUNCE_DEGREE,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            history_length: DEFAULT_HISTORY_LENGTH,
            history_gossip: DEFAULT_HISTORY_GOSSIP,
            control_timeout_ms: DEFAULT_CONTROL_TIMEOUT_MS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            dial_timeout_secs: DEFAULT_DIAL_TIMEOUT_SECS,
        }
    }
}

impl OverlayArgs {
    /// Listen address as a multiaddr, e.g. `/ip4/0.0.0.0/tcp/9000`.
    pub fn listen_multiaddr(&self) -> Multiaddr {
        Multiaddr::from(self.addr).with(Protocol::Tcp(self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listen_multiaddr() {
        assert_eq!(
            OverlayArgs::default().listen_multiaddr().to_string(),
            "/ip4/0.0.0.0/tcp/9000"
        );
    }

    #[test]
    fn ipv6_listen_multiaddr() {
        let args = OverlayArgs {
            addr: "::1".parse().unwrap(),
            port: 4001,
            ..Default::default()
        };
        assert_eq!(args.listen_multiaddr().to_string(), "/ip6/::1/tcp/4001");
    }
}
