//! A node's life after startup: bootstrap, join, publish, receive.

use crate::{NodeConfig, NodeError, PayloadBuilder, ReceiveLoop, elect_publisher, publish_all};
use pubsub_shadow_discovery::{Bootstrap, Resolver};
use pubsub_shadow_overlay::{Overlay, TopicHandle};
use pubsub_shadow_primitives::{NodeIndex, TOPIC};
use rand::{SeedableRng, rngs::StdRng};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runs the node loop against an overlay and resolver.
pub struct Simulation<'a, O: ?Sized, R: ?Sized> {
    overlay: &'a O,
    resolver: &'a R,
    config: &'a NodeConfig,
    local: NodeIndex,
}

impl<'a, O, R> Simulation<'a, O, R>
where
    O: Overlay + ?Sized,
    R: Resolver + ?Sized,
{
    pub fn new(overlay: &'a O, resolver: &'a R, config: &'a NodeConfig, local: NodeIndex) -> Self {
        Self {
            overlay,
            resolver,
            config,
            local,
        }
    }

    /// Runs until cancelled. Only returns early on a startup failure or when the overlay
    /// closes underneath it.
    pub async fn run(self, cancel: &CancellationToken) -> Result<(), NodeError> {
        sleep(self.config.startup_delay(), cancel).await?;

        let bootstrap = Bootstrap::new(
            self.overlay,
            self.resolver,
            self.config.bootstrap_config(self.local),
            StdRng::from_os_rng(),
        )?;
        bootstrap.run(cancel).await?;

        let topic = TopicHandle::join(self.overlay, TOPIC).await?;
        let subscription = topic.subscribe().await?;
        info!(topic = topic.topic(), "Subscribed");

        sleep(self.config.stabilization_delay(), cancel).await?;

        let settings = &self.config.publish;
        let publisher = elect_publisher(
            settings.election,
            settings.seed,
            self.config.simulation.universe_size,
        );
        if publisher == self.local {
            info!(policy = ?settings.election, count = settings.count, "Elected as publisher");
            let mut payloads = PayloadBuilder::new(
                settings.payload,
                settings.size,
                self.local,
                StdRng::from_os_rng(),
            );
            publish_all(&topic, &mut payloads, settings, cancel).await?;
        }

        ReceiveLoop::new(subscription).run(cancel).await
    }
}

async fn sleep(duration: Duration, cancel: &CancellationToken) -> Result<(), NodeError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NodeError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
