//! Fault injection decorator.

use crate::{
    DroppedMessages, EventTracer, RpcMeta, ShutdownRequest, ShutdownSignal, TracedMessage, render,
};
use libp2p::{Multiaddr, PeerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Overlay event on which a faulty node requests shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum FaultTrigger {
    /// The node joined the topic.
    #[default]
    Joined,
    /// A peer was grafted into the node's mesh.
    Grafted,
    /// A message was delivered to the node.
    Delivered,
}

impl FaultTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::Grafted => "grafted",
            Self::Delivered => "delivered",
        }
    }
}

impl fmt::Display for FaultTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forwards every event to `inner`; when the node is faulty, the first occurrence of the
/// trigger event requests shutdown through the signal.
pub struct FaultInjector<T> {
    inner: T,
    should_fail: bool,
    trigger: FaultTrigger,
    signal: ShutdownSignal,
}

impl<T> FaultInjector<T> {
    pub fn new(inner: T, should_fail: bool, trigger: FaultTrigger, signal: ShutdownSignal) -> Self {
        Self {
            inner,
            should_fail,
            trigger,
            signal,
        }
    }

    pub fn should_fail(&self) -> bool {
        self.should_fail
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn observe(&self, event: FaultTrigger) {
        if !self.should_fail || event != self.trigger {
            return;
        }
        if self.signal.fire(ShutdownRequest { trigger: event }) {
            info!("{}", render::line("Fault", "Triggered", &[("event", &event)]));
        }
    }
}

impl<T: EventTracer> EventTracer for FaultInjector<T> {
    fn add_peer(&self, peer: &PeerId, addr: &Multiaddr) {
        self.inner.add_peer(peer, addr);
    }

    fn remove_peer(&self, peer: &PeerId) {
        self.inner.remove_peer(peer);
    }

    fn join(&self, topic: &str) {
        self.inner.join(topic);
        self.observe(FaultTrigger::Joined);
    }

    fn leave(&self, topic: &str) {
        self.inner.leave(topic);
    }

    fn graft(&self, peer: &PeerId, topic: &str) {
        self.inner.graft(peer, topic);
        self.observe(FaultTrigger::Grafted);
    }

    fn prune(&self, peer: &PeerId, topic: &str) {
        self.inner.prune(peer, topic);
    }

    fn validate_message(&self, msg: &TracedMessage) {
        self.inner.validate_message(msg);
    }

    fn deliver_message(&self, msg: &TracedMessage) {
        self.inner.deliver_message(msg);
        self.observe(FaultTrigger::Delivered);
    }

    fn reject_message(&self, msg: &TracedMessage, reason: &str) {
        self.inner.reject_message(msg, reason);
    }

    fn duplicate_message(&self, msg: &TracedMessage) {
        self.inner.duplicate_message(msg);
    }

    fn undeliverable_message(&self, msg: &TracedMessage) {
        self.inner.undeliverable_message(msg);
    }

    fn throttle_peer(&self, peer: &PeerId) {
        self.inner.throttle_peer(peer);
    }

    fn recv_rpc(&self, rpc: &RpcMeta, from: &PeerId) {
        self.inner.recv_rpc(rpc, from);
    }

    fn send_rpc(&self, rpc: &RpcMeta, to: &PeerId) {
        self.inner.send_rpc(rpc, to);
    }

    fn drop_rpc(&self, rpc: &RpcMeta, to: &PeerId) {
        self.inner.drop_rpc(rpc, to);
    }

    fn drop_messages(&self, dropped: &DroppedMessages, to: &PeerId) {
        self.inner.drop_messages(dropped, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown_channel;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Default)]
    struct Recording {
        joins: AtomicUsize,
        events: Mutex<Vec<&'static str>>,
    }

    impl EventTracer for Recording {
        fn join(&self, _topic: &str) {
            self.joins.fetch_add(1, Ordering::Relaxed);
            self.events.lock().unwrap().push("join");
        }

        fn graft(&self, _peer: &PeerId, _topic: &str) {
            self.events.lock().unwrap().push("graft");
        }
    }

    #[tokio::test]
    async fn faulty_node_signals_once_on_trigger() {
        let (signal, mut listener) = shutdown_channel();
        let tracer = FaultInjector::new(Recording::default(), true, FaultTrigger::Joined, signal);

        tracer.join("foobar");
        tracer.join("foobar");

        assert_eq!(tracer.inner().joins.load(Ordering::Relaxed), 2);
        assert_eq!(
            listener.recv().await,
            Some(ShutdownRequest {
                trigger: FaultTrigger::Joined
            })
        );

        drop(tracer);
        assert_eq!(listener.recv().await, None);
    }

    #[tokio::test]
    async fn healthy_node_never_signals() {
        let (signal, mut listener) = shutdown_channel();
        let tracer = FaultInjector::new(Recording::default(), false, FaultTrigger::Joined, signal);

        tracer.join("foobar");
        tracer.graft(&PeerId::random(), "foobar");

        assert_eq!(*tracer.inner().events.lock().unwrap(), vec!["join", "graft"]);
        drop(tracer);
        assert_eq!(listener.recv().await, None);
    }

    #[tokio::test]
    async fn other_events_do_not_trigger() {
        let (signal, mut listener) = shutdown_channel();
        let tracer = FaultInjector::new(Recording::default(), true, FaultTrigger::Grafted, signal);

        tracer.join("foobar");
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(50), listener.recv()).await;
        assert!(pending.is_err());

        tracer.graft(&PeerId::random(), "foobar");
        assert_eq!(
            listener.recv().await,
            Some(ShutdownRequest {
                trigger: FaultTrigger::Grafted
            })
        );
    }

    #[test]
    fn trigger_names() {
        assert_eq!(FaultTrigger::default(), FaultTrigger::Joined);
        assert_eq!(FaultTrigger::Delivered.to_string(), "delivered");
    }
}
