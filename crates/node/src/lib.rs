//! Node orchestration for pubsub-shadow.
//!
//! A node derives its identity from its `node<index>` hostname, bootstraps connectivity to a
//! random subset of the simulated universe, joins the well-known topic and then runs the
//! publish/receive loop. A [`Coordinator`] races that loop against the shutdown signal the
//! fault-injecting tracer may raise.
//!
//! [`run_node`] wires the production pieces together; [`Simulation`] and [`Coordinator`] are
//! generic over the overlay and resolver so they can be driven without a network.

mod args;
mod config;
mod coordinator;
mod duplicates;
mod error;
mod fault;
mod launch;
mod metrics;
mod pubsub;
mod simulation;

pub use args::{ElectionPolicy, FaultArgs, PayloadKind, PublishArgs, SimulationArgs};
pub use config::{ENV_PREFIX, NodeConfig};
pub use coordinator::{Coordinator, Exit};
pub use duplicates::DuplicateCounter;
pub use error::NodeError;
pub use fault::FaultDecision;
pub use launch::{resolve_hostname, run_node};
pub use pubsub::{FIXED_PUBLISHER, PayloadBuilder, ReceiveLoop, elect_publisher, publish_all};
pub use simulation::Simulation;
