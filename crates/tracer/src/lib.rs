//! Overlay event tracing.
//!
//! The overlay engine reports its internals through the [`EventTracer`] capability set.
//! This crate provides:
//!
//! - [`LogTracer`]: renders every event as one `<category>: <action> (<key>: <value>, ...)`
//!   line on the log stream.
//! - [`FaultInjector`]: a decorator that forwards to an inner tracer and, when the node was
//!   marked faulty, requests shutdown once through a [`ShutdownSignal`].
//! - [`RpcMeta`] and friends: an engine-neutral view of RPC contents, decomposed into data
//!   publishes and control sub-messages.
//!
//! Tracers are invoked from the engine's own tasks. Implementations must log and return:
//! never block, never fail, never panic.

mod fault;
mod log;
pub mod render;
mod rpc;
mod shutdown;

pub use fault::{FaultInjector, FaultTrigger};
pub use log::LogTracer;
pub use rpc::{
    ControlIAnnounce, ControlIDontWant, ControlIHave, ControlINeed, ControlIWant, ControlMeta,
    DroppedMessages, PublishMeta, RpcAction, RpcMeta,
};
pub use shutdown::{ShutdownListener, ShutdownRequest, ShutdownSignal, shutdown_channel};

use auto_impl::auto_impl;
use libp2p::{Multiaddr, PeerId};
use pubsub_shadow_primitives::ContentId;

/// A message as seen by the tracer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedMessage {
    /// Content-hash identity.
    pub id: ContentId,
    /// Peer the message was received from (the local peer for own publishes).
    pub received_from: PeerId,
    pub topic: String,
    pub size: usize,
}

/// Observer of overlay lifecycle and RPC events.
///
/// Every method defaults to a no-op so observers only implement what they need.
#[auto_impl(&, Box, Arc)]
pub trait EventTracer: Send + Sync {
    fn add_peer(&self, _peer: &PeerId, _addr: &Multiaddr) {}

    fn remove_peer(&self, _peer: &PeerId) {}

    fn join(&self, _topic: &str) {}

    fn leave(&self, _topic: &str) {}

    fn graft(&self, _peer: &PeerId, _topic: &str) {}

    fn prune(&self, _peer: &PeerId, _topic: &str) {}

    fn validate_message(&self, _msg: &TracedMessage) {}

    fn deliver_message(&self, _msg: &TracedMessage) {}

    fn reject_message(&self, _msg: &TracedMessage, _reason: &str) {}

    fn duplicate_message(&self, _msg: &TracedMessage) {}

    fn undeliverable_message(&self, _msg: &TracedMessage) {}

    fn throttle_peer(&self, _peer: &PeerId) {}

    fn recv_rpc(&self, _rpc: &RpcMeta, _from: &PeerId) {}

    fn send_rpc(&self, _rpc: &RpcMeta, _to: &PeerId) {}

    fn drop_rpc(&self, _rpc: &RpcMeta, _to: &PeerId) {}

    /// Aggregate drops reported without message ids.
    fn drop_messages(&self, _dropped: &DroppedMessages, _to: &PeerId) {}
}

/// Tracer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl EventTracer for NoopTracer {}
