//! Swarm driver task.
//!
//! Owns the gossipsub swarm, serves [`Command`]s from [`OverlayHandle`](crate::OverlayHandle)s
//! and translates engine events into [`EventTracer`] calls.

use crate::{
    MessageIdFn, OverlayConfig, OverlayError, ReceivedMessage, SUBSCRIPTION_BUFFER, Subscription,
};
use futures::StreamExt;
use libp2p::{
    Multiaddr, PeerId, Swarm, SwarmBuilder,
    core::transport::ListenerId,
    gossipsub::{self, IdentTopic, TopicHash},
    noise,
    swarm::{SwarmEvent, dial_opts::DialOpts},
    tcp, yamux,
};
use pubsub_shadow_identity::Identity;
use pubsub_shadow_primitives::ContentId;
use pubsub_shadow_tracer::{DroppedMessages, EventTracer, RpcMeta, TracedMessage};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::MissedTickBehavior,
};
use tracing::{debug, info, trace, warn};

/// Upper bound on waiting for connections to wind down on close.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Command {
    Connect {
        addr: Multiaddr,
        peer: PeerId,
        reply: Reply<Result<(), OverlayError>>,
    },
    ConnectedPeers {
        reply: Reply<usize>,
    },
    Join {
        topic: String,
        reply: Reply<Result<(), OverlayError>>,
    },
    Subscribe {
        topic: String,
        reply: Reply<Result<Subscription, OverlayError>>,
    },
    Publish {
        topic: String,
        data: Vec<u8>,
        reply: Reply<Result<ContentId, OverlayError>>,
    },
    ListenAddrs {
        reply: Reply<Vec<Multiaddr>>,
    },
    Close {
        reply: Reply<()>,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connect { .. } => "Connect",
            Self::ConnectedPeers { .. } => "ConnectedPeers",
            Self::Join { .. } => "Join",
            Self::Subscribe { .. } => "Subscribe",
            Self::Publish { .. } => "Publish",
            Self::ListenAddrs { .. } => "ListenAddrs",
            Self::Close { .. } => "Close",
        };
        f.write_str(name)
    }
}

/// A joined topic: its mesh as of the last poll and the local receivers.
struct TopicState {
    name: String,
    mesh: HashSet<PeerId>,
    subscribers: Vec<mpsc::Sender<ReceivedMessage>>,
}

struct PendingDial {
    addr: Multiaddr,
    reply: Reply<Result<(), OverlayError>>,
}

pub(crate) struct Driver {
    swarm: Swarm<gossipsub::Behaviour>,
    commands: mpsc::Receiver<Command>,
    tracer: Arc<dyn EventTracer>,
    message_id_fn: MessageIdFn,
    mesh_poll: Duration,
    listener: ListenerId,
    listen_addrs: Vec<Multiaddr>,
    topics: HashMap<TopicHash, TopicState>,
    pending_dials: HashMap<PeerId, Vec<PendingDial>>,
}

impl Driver {
    pub(crate) fn new(
        identity: &Identity,
        listen: Multiaddr,
        config: OverlayConfig,
        tracer: Arc<dyn EventTracer>,
        commands: mpsc::Receiver<Command>,
    ) -> Result<Self, OverlayError> {
        let gossipsub_config = config.gossipsub_config()?;
        let behaviour = gossipsub::Behaviour::new(
            config.message_authenticity(),
            gossipsub_config,
        )
        .map_err(|e| OverlayError::Config(e.to_string()))?;

        info!(
            d = config.mesh_degree_target,
            dlo = config.mesh_degree_low,
            dhi = config.mesh_degree_high,
            dannounce = config.announce_degree,
            heartbeat = ?config.heartbeat_interval,
            history_length = config.history_length,
            history_gossip = config.history_gossip,
            validate_queue = config.validate_queue_size,
            "Overlay configured"
        );

        let mut swarm = SwarmBuilder::with_existing_identity(identity.keypair().clone())
            .with_tokio()
            .with_tcp(
                tcp::Config::default().nodelay(true),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| OverlayError::Transport(e.to_string()))?
            .with_behaviour(|_| behaviour)
            .map_err(|e| OverlayError::Transport(e.to_string()))?
            .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(config.idle_timeout))
            .build();

        let listener = swarm
            .listen_on(listen.clone())
            .map_err(|e| OverlayError::Listen {
                addr: listen.clone(),
                reason: e.to_string(),
            })?;
        info!(addr = %listen, "Listening on address");

        Ok(Self {
            swarm,
            commands,
            tracer,
            message_id_fn: config.message_id_fn,
            mesh_poll: config.heartbeat_interval,
            listener,
            listen_addrs: Vec::new(),
            topics: HashMap::new(),
            pending_dials: HashMap::new(),
        })
    }

    pub(crate) async fn run(mut self) {
        let mut mesh_poll = tokio::time::interval(self.mesh_poll);
        mesh_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let close_reply = loop {
            tokio::select! {
                event = self.swarm.select_next_some() => self.on_swarm_event(event),
                command = self.commands.recv() => match command {
                    Some(Command::Close { reply }) => break Some(reply),
                    Some(command) => self.on_command(command),
                    None => {
                        debug!("All overlay handles dropped");
                        break None;
                    }
                },
                _ = mesh_poll.tick() => self.poll_meshes(),
            }
        };

        self.close().await;
        drop(self);
        info!("Overlay closed");

        if let Some(reply) = close_reply {
            let _ = reply.send(());
        }
    }

    fn on_command(&mut self, command: Command) {
        trace!(?command, "Overlay command");
        match command {
            Command::Connect { addr, peer, reply } => self.connect(addr, peer, reply),
            Command::ConnectedPeers { reply } => {
                let _ = reply.send(self.swarm.connected_peers().count());
            }
            Command::Join { topic, reply } => {
                let _ = reply.send(self.join(topic));
            }
            Command::Subscribe { topic, reply } => {
                let _ = reply.send(self.subscribe(&topic));
            }
            Command::Publish { topic, data, reply } => {
                let _ = reply.send(self.publish(&topic, data));
            }
            Command::ListenAddrs { reply } => {
                let _ = reply.send(self.listen_addrs.clone());
            }
            // Handled by the run loop.
            Command::Close { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn connect(&mut self, addr: Multiaddr, peer: PeerId, reply: Reply<Result<(), OverlayError>>) {
        if self.swarm.is_connected(&peer) {
            let _ = reply.send(Ok(()));
            return;
        }

        // A dial to this peer is already in flight; share its outcome.
        if let Some(pending) = self.pending_dials.get_mut(&peer) {
            pending.push(PendingDial { addr, reply });
            return;
        }

        let opts = DialOpts::peer_id(peer).addresses(vec![addr.clone()]).build();
        match self.swarm.dial(opts) {
            Ok(()) => {
                debug!(%peer, %addr, "Dial initiated");
                self.pending_dials
                    .insert(peer, vec![PendingDial { addr, reply }]);
            }
            Err(e) => {
                let _ = reply.send(Err(OverlayError::Dial {
                    addr,
                    reason: e.to_string(),
                }));
            }
        }
    }

    fn join(&mut self, topic: String) -> Result<(), OverlayError> {
        let ident = IdentTopic::new(topic.clone());
        let hash = ident.hash();
        if self.topics.contains_key(&hash) {
            return Ok(());
        }

        self.swarm
            .behaviour_mut()
            .subscribe(&ident)
            .map_err(|e| OverlayError::Subscribe {
                topic: topic.clone(),
                reason: e.to_string(),
            })?;
        self.tracer.join(&topic);
        self.topics.insert(
            hash,
            TopicState {
                name: topic,
                mesh: HashSet::new(),
                subscribers: Vec::new(),
            },
        );
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<Subscription, OverlayError> {
        let state = self
            .topics
            .get_mut(&IdentTopic::new(topic).hash())
            .ok_or_else(|| OverlayError::NotJoined(topic.to_owned()))?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        state.subscribers.push(tx);
        Ok(Subscription::new(rx))
    }

    fn publish(&mut self, topic: &str, data: Vec<u8>) -> Result<ContentId, OverlayError> {
        let ident = IdentTopic::new(topic);
        let hash = ident.hash();
        if !self.topics.contains_key(&hash) {
            return Err(OverlayError::NotJoined(topic.to_owned()));
        }

        let id = (self.message_id_fn)(&data);
        self.swarm
            .behaviour_mut()
            .publish(ident, data)
            .map_err(|e| OverlayError::Publish(e.to_string()))?;

        // The engine fans a publish out to every peer subscribed to the topic.
        let rpc = RpcMeta::publish(topic, id.clone());
        for (peer, topics) in self.swarm.behaviour().all_peers() {
            if topics.contains(&&hash) {
                self.tracer.send_rpc(&rpc, peer);
            }
        }
        Ok(id)
    }

    fn on_swarm_event(&mut self, event: SwarmEvent<gossipsub::Event>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "New listen address");
                self.listen_addrs.push(address);
            }
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                self.listen_addrs.retain(|a| a != &address);
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                endpoint,
                num_established,
                ..
            } => {
                debug!(
                    %peer_id,
                    endpoint = %endpoint.get_remote_address(),
                    num_established,
                    "Connection established"
                );
                if num_established.get() == 1 {
                    self.tracer.add_peer(&peer_id, endpoint.get_remote_address());
                }
                for pending in self.pending_dials.remove(&peer_id).unwrap_or_default() {
                    let _ = pending.reply.send(Ok(()));
                }
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                cause,
                num_established,
                ..
            } => {
                debug!(%peer_id, num_established, cause = ?cause, "Connection closed");
                if num_established == 0 {
                    self.tracer.remove_peer(&peer_id);
                }
            }
            SwarmEvent::OutgoingConnectionError {
                peer_id: Some(peer_id),
                error,
                ..
            } => {
                debug!(%peer_id, %error, "Outgoing connection error");
                for pending in self.pending_dials.remove(&peer_id).unwrap_or_default() {
                    let _ = pending.reply.send(Err(OverlayError::Dial {
                        addr: pending.addr,
                        reason: error.to_string(),
                    }));
                }
            }
            SwarmEvent::ListenerError { error, .. } => {
                warn!(%error, "Listener error");
            }
            SwarmEvent::Behaviour(event) => self.on_gossipsub_event(event),
            _ => {}
        }
    }

    fn on_gossipsub_event(&mut self, event: gossipsub::Event) {
        match event {
            gossipsub::Event::Message {
                propagation_source,
                message_id,
                message,
            } => {
                let Some(state) = self.topics.get_mut(&message.topic) else {
                    return;
                };

                let id = ContentId::from_encoded(String::from_utf8_lossy(&message_id.0));
                let traced = TracedMessage {
                    id: id.clone(),
                    received_from: propagation_source,
                    topic: state.name.clone(),
                    size: message.data.len(),
                };
                self.tracer.validate_message(&traced);
                self.tracer.deliver_message(&traced);

                let received = ReceivedMessage {
                    id,
                    from: propagation_source,
                    source: message.source,
                    topic: state.name.clone(),
                    data: message.data,
                };
                let tracer = &self.tracer;
                state.subscribers.retain(|tx| match tx.try_send(received.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracer.undeliverable_message(&traced);
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                });
            }
            gossipsub::Event::Subscribed { peer_id, topic } => {
                debug!(%peer_id, %topic, "Peer subscribed");
            }
            gossipsub::Event::Unsubscribed { peer_id, topic } => {
                debug!(%peer_id, %topic, "Peer unsubscribed");
            }
            gossipsub::Event::SlowPeer {
                peer_id,
                failed_messages,
            } => {
                debug!(%peer_id, ?failed_messages, "Slow peer");
                self.tracer.throttle_peer(&peer_id);
                let dropped = dropped_messages(&failed_messages);
                if !dropped.is_empty() {
                    self.tracer.drop_messages(&dropped, &peer_id);
                }
            }
            other => {
                trace!(?other, "Unhandled gossipsub event");
            }
        }
    }

    /// Reports mesh membership changes since the previous poll as grafts and prunes.
    fn poll_meshes(&mut self) {
        let behaviour = self.swarm.behaviour();
        for (hash, state) in &mut self.topics {
            let current: HashSet<PeerId> = behaviour.mesh_peers(hash).copied().collect();
            for peer in current.difference(&state.mesh) {
                self.tracer.graft(peer, &state.name);
            }
            for peer in state.mesh.difference(&current) {
                self.tracer.prune(peer, &state.name);
            }
            state.mesh = current;
        }
    }

    async fn close(&mut self) {
        for (_, state) in self.topics.drain() {
            let ident = IdentTopic::new(state.name.clone());
            if self.swarm.behaviour_mut().unsubscribe(&ident) {
                self.tracer.leave(&state.name);
            }
        }

        for (_, pending) in self.pending_dials.drain() {
            for dial in pending {
                let _ = dial.reply.send(Err(OverlayError::Closed));
            }
        }

        let peers: Vec<PeerId> = self.swarm.connected_peers().copied().collect();
        for peer in peers {
            let _ = self.swarm.disconnect_peer_id(peer);
        }
        self.swarm.remove_listener(self.listener);

        let drained = tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, async {
            while self.swarm.connected_peers().next().is_some() {
                let event = self.swarm.select_next_some().await;
                self.on_swarm_event(event);
            }
        })
        .await;
        if drained.is_err() {
            warn!("Timed out waiting for connections to close");
        }
    }
}

/// Queue-full and expired sends from a slow peer report. Priority counts overlap these and
/// are left out.
fn dropped_messages(failed: &gossipsub::FailedMessages) -> DroppedMessages {
    DroppedMessages {
        publish: failed.publish,
        forward: failed.forward,
        timed_out: failed.timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_peer_failures_become_drop_counts() {
        let failed = gossipsub::FailedMessages {
            publish: 1,
            forward: 3,
            priority: 1,
            non_priority: 3,
            timeout: 2,
        };
        assert_eq!(
            dropped_messages(&failed),
            DroppedMessages {
                publish: 1,
                forward: 3,
                timed_out: 2,
            }
        );
        assert!(dropped_messages(&gossipsub::FailedMessages::default()).is_empty());
    }
}
