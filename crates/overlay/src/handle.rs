//! The overlay capability boundary and its libp2p-backed handle.

use crate::{
    OverlayConfig, OverlayError,
    driver::{Command, Driver},
};
use async_trait::async_trait;
use libp2p::{Multiaddr, PeerId};
use pubsub_shadow_identity::Identity;
use pubsub_shadow_primitives::ContentId;
use pubsub_shadow_tracer::EventTracer;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Deliveries buffered per subscription before the engine marks further ones undeliverable.
pub const SUBSCRIPTION_BUFFER: usize = 32;

const COMMAND_BUFFER: usize = 64;

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub id: ContentId,
    /// Peer the message was forwarded by.
    pub from: PeerId,
    /// Original publisher. Always `None` while signing is disabled.
    pub source: Option<PeerId>,
    pub topic: String,
    pub data: Vec<u8>,
}

/// Receive side of a topic subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<ReceivedMessage>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<ReceivedMessage>) -> Self {
        Self { rx }
    }

    /// Waits for the next delivery.
    ///
    /// Returns [`OverlayError::Cancelled`] as soon as `cancel` fires and
    /// [`OverlayError::Closed`] once the overlay has shut down.
    pub async fn next(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<ReceivedMessage, OverlayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(OverlayError::Cancelled),
            msg = self.rx.recv() => msg.ok_or(OverlayError::Closed),
        }
    }
}

/// Runs `fut` unless `cancel` fires first.
pub async fn with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, OverlayError>
where
    F: Future<Output = Result<T, OverlayError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OverlayError::Cancelled),
        res = fut => res,
    }
}

/// What the node orchestration needs from the overlay engine.
#[async_trait]
pub trait Overlay: Send + Sync {
    /// Network identity of the local node.
    fn local_peer_id(&self) -> PeerId;

    /// Dials `peer` at `addr` and waits for the connection to be established.
    async fn connect(
        &self,
        addr: Multiaddr,
        peer: PeerId,
        cancel: &CancellationToken,
    ) -> Result<(), OverlayError>;

    /// Number of peers with at least one live connection, inbound or outbound.
    async fn connected_peers(&self) -> Result<usize, OverlayError>;

    /// Joins the mesh of `topic`. Joining twice is a no-op.
    async fn join(&self, topic: &str) -> Result<(), OverlayError>;

    /// Opens a receive handle on a joined topic.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, OverlayError>;

    /// Publishes `data` on a joined topic, returning its content identity.
    async fn publish(
        &self,
        topic: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<ContentId, OverlayError>;

    /// Leaves all topics, closes every connection and releases the listening socket.
    async fn close(&self) -> Result<(), OverlayError>;
}

/// A joined topic.
#[derive(Debug)]
pub struct TopicHandle<'a, O: ?Sized> {
    overlay: &'a O,
    topic: String,
}

impl<'a, O: Overlay + ?Sized> TopicHandle<'a, O> {
    /// Joins `topic` on `overlay`.
    pub async fn join(overlay: &'a O, topic: impl Into<String>) -> Result<Self, OverlayError> {
        let topic = topic.into();
        overlay.join(&topic).await?;
        Ok(Self { overlay, topic })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn subscribe(&self) -> Result<Subscription, OverlayError> {
        self.overlay.subscribe(&self.topic).await
    }

    pub async fn publish(
        &self,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<ContentId, OverlayError> {
        self.overlay.publish(&self.topic, data, cancel).await
    }
}

/// Cloneable handle to a gossipsub swarm running in its own task.
#[derive(Debug, Clone)]
pub struct OverlayHandle {
    local_peer_id: PeerId,
    commands: mpsc::Sender<Command>,
    dial_timeout: Duration,
}

impl OverlayHandle {
    /// Builds the swarm, starts listening on `listen` and spawns the driver task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        identity: &Identity,
        listen: Multiaddr,
        config: OverlayConfig,
        tracer: Arc<dyn EventTracer>,
    ) -> Result<Self, OverlayError> {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let dial_timeout = config.dial_timeout;
        let driver = Driver::new(identity, listen, config, tracer, rx)?;

        let local_peer_id = identity.peer_id();
        info!(%local_peer_id, "Overlay started");
        tokio::spawn(driver.run());

        Ok(Self {
            local_peer_id,
            commands: tx,
            dial_timeout,
        })
    }

    /// Addresses the swarm is currently listening on.
    pub async fn listen_addrs(&self) -> Result<Vec<Multiaddr>, OverlayError> {
        self.request(|reply| Command::ListenAddrs { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, OverlayError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| OverlayError::Closed)?;
        rx.await.map_err(|_| OverlayError::Closed)
    }
}

#[async_trait]
impl Overlay for OverlayHandle {
    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    async fn connect(
        &self,
        addr: Multiaddr,
        peer: PeerId,
        cancel: &CancellationToken,
    ) -> Result<(), OverlayError> {
        let target = addr.clone();
        let dial = self.request(move |reply| Command::Connect {
            addr: target,
            peer,
            reply,
        });
        let dial_timeout = self.dial_timeout;
        with_cancel(cancel, async move {
            match tokio::time::timeout(dial_timeout, dial).await {
                Ok(res) => res?,
                Err(_) => Err(OverlayError::DialTimeout(addr)),
            }
        })
        .await
    }

    async fn connected_peers(&self) -> Result<usize, OverlayError> {
        self.request(|reply| Command::ConnectedPeers { reply }).await
    }

    async fn join(&self, topic: &str) -> Result<(), OverlayError> {
        self.request(|reply| Command::Join {
            topic: topic.to_owned(),
            reply,
        })
        .await?
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, OverlayError> {
        self.request(|reply| Command::Subscribe {
            topic: topic.to_owned(),
            reply,
        })
        .await?
    }

    async fn publish(
        &self,
        topic: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<ContentId, OverlayError> {
        let publish = self.request(move |reply| Command::Publish {
            topic: topic.to_owned(),
            data,
            reply,
        });
        with_cancel(cancel, async move { publish.await? }).await
    }

    async fn close(&self) -> Result<(), OverlayError> {
        match self.request(|reply| Command::Close { reply }).await {
            Ok(()) | Err(OverlayError::Closed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
