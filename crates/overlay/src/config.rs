//! Overlay parameter set.

use crate::{OverlayArgs, OverlayError};
use libp2p::gossipsub;
use pubsub_shadow_primitives::ContentId;
use std::time::Duration;

/// Upper bound on a message, 10 MiB.
pub const MAX_MESSAGE_SIZE: usize = 10 << 20;

/// Per-peer outbound queue depth.
pub const OUTBOUND_QUEUE_SIZE: usize = 600;

/// Validation queue depth.
pub const VALIDATE_QUEUE_SIZE: usize = 600;

/// Computes a message's identity from its payload.
pub type MessageIdFn = fn(&[u8]) -> ContentId;

/// Message signing and verification policy.
///
/// Simulation nodes never sign: messages are neither signed nor verified and carry no
/// author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    StrictNoSign,
}

/// Immutable tunables handed to the overlay engine at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    pub mesh_degree_low: usize,
    pub mesh_degree_target: usize,
    pub mesh_degree_high: usize,
    pub announce_degree: usize,
    pub heartbeat_interval: Duration,
    pub history_length: usize,
    pub history_gossip: usize,
    pub control_timeout: Duration,
    pub outbound_queue_size: usize,
    pub validate_queue_size: usize,
    pub max_message_size: usize,
    pub signature_policy: SignaturePolicy,
    pub message_id_fn: MessageIdFn,
    pub idle_timeout: Duration,
    pub dial_timeout: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self::from_args(&OverlayArgs::default())
    }
}

impl OverlayConfig {
    /// Builds the parameter set from process configuration.
    ///
    /// Signing is always disabled, queues are fixed at 600 entries, messages are capped at
    /// 10 MiB and identified by the hash of their payload.
    pub fn from_args(args: &OverlayArgs) -> Self {
        Self {
            mesh_degree_low: args.mesh_degree_low,
            mesh_degree_target: args.mesh_degree,
            mesh_degree_high: args.mesh_degree_high,
            announce_degree: args.announce_degree,
            heartbeat_interval: Duration::from_millis(args.heartbeat_ms),
            history_length: args.history_length,
            history_gossip: args.history_gossip,
            control_timeout: Duration::from_millis(args.control_timeout_ms),
            outbound_queue_size: OUTBOUND_QUEUE_SIZE,
            validate_queue_size: VALIDATE_QUEUE_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
            signature_policy: SignaturePolicy::StrictNoSign,
            message_id_fn: ContentId::of,
            idle_timeout: Duration::from_secs(args.idle_timeout_secs),
            dial_timeout: Duration::from_secs(args.dial_timeout_secs),
        }
    }

    /// Checks the relations the engine relies on.
    pub fn validate(&self) -> Result<(), OverlayError> {
        if !(self.mesh_degree_low <= self.mesh_degree_target
            && self.mesh_degree_target <= self.mesh_degree_high)
        {
            return Err(OverlayError::Config(format!(
                "mesh degrees must satisfy Dlo <= D <= Dhi, got {} / {} / {}",
                self.mesh_degree_low, self.mesh_degree_target, self.mesh_degree_high
            )));
        }
        if self.mesh_degree_target == 0 {
            return Err(OverlayError::Config("mesh degree must be positive".into()));
        }
        if self.history_gossip > self.history_length {
            return Err(OverlayError::Config(format!(
                "history gossip ({}) exceeds history length ({})",
                self.history_gossip, self.history_length
            )));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(OverlayError::Config("heartbeat interval must be positive".into()));
        }
        Ok(())
    }

    /// Translates the parameter set into the engine's configuration.
    pub fn gossipsub_config(&self) -> Result<gossipsub::Config, OverlayError> {
        self.validate()?;

        let id_fn = self.message_id_fn;
        let validation_mode = match self.signature_policy {
            SignaturePolicy::StrictNoSign => gossipsub::ValidationMode::Anonymous,
        };
        // The engine requires at least this many outbound peers in the mesh; keep it
        // within D/2 and Dlo so small meshes stay valid.
        let outbound_min = 2
            .min(self.mesh_degree_low)
            .min(self.mesh_degree_target / 2);

        gossipsub::ConfigBuilder::default()
            .mesh_n_low(self.mesh_degree_low)
            .mesh_n(self.mesh_degree_target)
            .mesh_n_high(self.mesh_degree_high)
            .mesh_outbound_min(outbound_min)
            .heartbeat_interval(self.heartbeat_interval)
            .history_length(self.history_length)
            .history_gossip(self.history_gossip)
            .iwant_followup_time(self.control_timeout)
            .connection_handler_queue_len(self.outbound_queue_size)
            .max_transmit_size(self.max_message_size)
            .validation_mode(validation_mode)
            .message_id_fn(move |msg: &gossipsub::Message| {
                gossipsub::MessageId::from(id_fn(&msg.data).into_bytes())
            })
            .build()
            .map_err(|e| OverlayError::Config(e.to_string()))
    }

    /// Authorship mode matching the signature policy.
    pub fn message_authenticity(&self) -> gossipsub::MessageAuthenticity {
        match self.signature_policy {
            SignaturePolicy::StrictNoSign => gossipsub::MessageAuthenticity::Anonymous,
        }
    }
}
