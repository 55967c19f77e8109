//! Node CLI arguments.

use clap::{Args, ValueEnum};
use pubsub_shadow_discovery::TerminationPolicy;
use pubsub_shadow_tracer::FaultTrigger;
use serde::{Deserialize, Serialize};

const DEFAULT_UNIVERSE_SIZE: u64 = 5000;
const DEFAULT_TARGET_PEERS: usize = 70;
const DEFAULT_STARTUP_DELAY_MS: u64 = 1000;
const DEFAULT_STABILIZATION_DELAY_MS: u64 = 10_000;
const DEFAULT_PAYLOAD_SIZE: usize = 32;
const DEFAULT_PUBLISH_COUNT: usize = 1;
const DEFAULT_GRACE_PERIOD_MS: u64 = 10_000;

/// Simulated universe and bootstrap settings.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Simulation")]
#[serde(default)]
pub struct SimulationArgs {
    /// Number of nodes in the simulated network.
    #[arg(long = "count", default_value_t = DEFAULT_UNIVERSE_SIZE)]
    pub universe_size: u64,

    /// Number of peers to connect to before joining the topic.
    #[arg(long = "target", default_value_t = DEFAULT_TARGET_PEERS)]
    pub target_peers: usize,

    /// When bootstrap is done: after connecting to `target` peers itself, or once the live
    /// connection count (inbound included) reaches `target`.
    #[arg(long = "discovery.policy", value_enum, default_value_t = TerminationPolicy::PeerSet)]
    pub policy: TerminationPolicy,

    /// Wait before bootstrapping so other nodes can start listening, in milliseconds.
    #[arg(long = "startup-delay-ms", default_value_t = DEFAULT_STARTUP_DELAY_MS)]
    pub startup_delay_ms: u64,

    /// Wait after joining the topic so meshes can form, in milliseconds.
    #[arg(long = "stabilization-delay-ms", default_value_t = DEFAULT_STABILIZATION_DELAY_MS)]
    pub stabilization_delay_ms: u64,

    /// Use this hostname instead of the system one. Must follow `node<index>`.
    #[arg(long = "hostname", value_name = "NAME")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl Default for SimulationArgs {
    fn default() -> Self {
        Self {
            universe_size: DEFAULT_UNIVERSE_SIZE,
            target_peers: DEFAULT_TARGET_PEERS,
            policy: TerminationPolicy::PeerSet,
            startup_delay_ms: DEFAULT_STARTUP_DELAY_MS,
            stabilization_delay_ms: DEFAULT_STABILIZATION_DELAY_MS,
            hostname: None,
        }
    }
}

/// How the single publisher is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionPolicy {
    /// Node 0 publishes.
    #[default]
    Fixed,
    /// A node drawn from the universe with the shared seed publishes.
    Random,
}

/// What a publisher sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Random bytes of the configured size.
    #[default]
    Random,
    /// `Hello from node<index>`.
    Greeting,
}

/// Publisher election and payload settings.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Publish")]
#[serde(default)]
pub struct PublishArgs {
    /// Publisher election policy.
    #[arg(long = "publish.election", value_enum, default_value_t = ElectionPolicy::Fixed)]
    pub election: ElectionPolicy,

    /// Seed shared by all nodes for random election.
    #[arg(long = "publish.seed", default_value_t = 0)]
    pub seed: u64,

    /// Payload kind.
    #[arg(long = "publish.payload", value_enum, default_value_t = PayloadKind::Random)]
    pub payload: PayloadKind,

    /// Size of random payloads in bytes.
    #[arg(long = "size", default_value_t = DEFAULT_PAYLOAD_SIZE)]
    pub size: usize,

    /// Number of messages the publisher sends.
    #[arg(long = "publish.count", default_value_t = DEFAULT_PUBLISH_COUNT)]
    pub count: usize,
}

impl Default for PublishArgs {
    fn default() -> Self {
        Self {
            election: ElectionPolicy::Fixed,
            seed: 0,
            payload: PayloadKind::Random,
            size: DEFAULT_PAYLOAD_SIZE,
            count: DEFAULT_PUBLISH_COUNT,
        }
    }
}

/// Fault injection settings.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Fault")]
#[serde(default)]
pub struct FaultArgs {
    /// Chance, in percent, that this node is faulty.
    #[arg(long = "fault.percent", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub percent: u8,

    /// Overlay event on which a faulty node shuts down.
    #[arg(long = "fault.trigger", value_enum, default_value_t = FaultTrigger::Joined)]
    pub trigger: FaultTrigger,

    /// Time to stay alive after a fault shutdown, in milliseconds.
    #[arg(long = "fault.grace-ms", default_value_t = DEFAULT_GRACE_PERIOD_MS)]
    pub grace_period_ms: u64,
}

impl Default for FaultArgs {
    fn default() -> Self {
        Self {
            percent: 0,
            trigger: FaultTrigger::Joined,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
        }
    }
}
