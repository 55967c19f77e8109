//! Tracer that writes every event to the log stream.

use crate::{DroppedMessages, EventTracer, RpcAction, RpcMeta, TracedMessage, render};
use libp2p::{Multiaddr, PeerId};
use tracing::info;

/// Renders each event as one line at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl LogTracer {
    pub fn new() -> Self {
        Self
    }

    fn log_rpc(&self, action: RpcAction, rpc: &RpcMeta, peer: &PeerId) {
        for line in render::rpc(action, rpc, Some(peer)) {
            info!("{line}");
        }
    }
}

impl EventTracer for LogTracer {
    fn add_peer(&self, peer: &PeerId, addr: &Multiaddr) {
        info!("{}", render::peer_added(peer, addr));
    }

    fn remove_peer(&self, peer: &PeerId) {
        info!("{}", render::peer_removed(peer));
    }

    fn join(&self, topic: &str) {
        info!("{}", render::joined(topic));
    }

    fn leave(&self, topic: &str) {
        info!("{}", render::left(topic));
    }

    fn graft(&self, peer: &PeerId, topic: &str) {
        info!("{}", render::grafted(peer, topic));
    }

    fn prune(&self, peer: &PeerId, topic: &str) {
        info!("{}", render::pruned(peer, topic));
    }

    fn validate_message(&self, msg: &TracedMessage) {
        info!("{}", render::message("Validated", msg));
    }

    fn deliver_message(&self, msg: &TracedMessage) {
        info!("{}", render::message("Delivered", msg));
    }

    fn reject_message(&self, msg: &TracedMessage, reason: &str) {
        info!("{}", render::rejected(msg, reason));
    }

    fn duplicate_message(&self, msg: &TracedMessage) {
        info!("{}", render::message("Duplicated", msg));
    }

    fn undeliverable_message(&self, msg: &TracedMessage) {
        info!("{}", render::message("Undeliverable", msg));
    }

    fn throttle_peer(&self, peer: &PeerId) {
        info!("{}", render::throttled(peer));
    }

    fn recv_rpc(&self, rpc: &RpcMeta, from: &PeerId) {
        self.log_rpc(RpcAction::Received, rpc, from);
    }

    fn send_rpc(&self, rpc: &RpcMeta, to: &PeerId) {
        self.log_rpc(RpcAction::Sent, rpc, to);
    }

    fn drop_rpc(&self, rpc: &RpcMeta, to: &PeerId) {
        self.log_rpc(RpcAction::Dropped, rpc, to);
    }

    fn drop_messages(&self, dropped: &DroppedMessages, to: &PeerId) {
        for line in render::dropped(dropped, to) {
            info!("{line}");
        }
    }
}
