//! Publisher election, payloads, and the publish/receive loop.

use crate::{
    DuplicateCounter, ElectionPolicy, NodeError, PayloadKind, PublishArgs, metrics::NodeMetrics,
};
use pubsub_shadow_overlay::{Overlay, Subscription, TopicHandle};
use pubsub_shadow_primitives::{ContentId, NodeIndex};
use pubsub_shadow_tracer::render;
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Publisher under [`ElectionPolicy::Fixed`].
pub const FIXED_PUBLISHER: NodeIndex = NodeIndex::new(0);

/// Elects the single publisher of the universe.
///
/// Random election draws from an RNG seeded with `seed`, so every node configured with the
/// same seed and universe agrees on the result without communicating.
pub fn elect_publisher(policy: ElectionPolicy, seed: u64, universe_size: u64) -> NodeIndex {
    match policy {
        ElectionPolicy::Fixed => FIXED_PUBLISHER,
        ElectionPolicy::Random => {
            NodeIndex::new(StdRng::seed_from_u64(seed).random_range(0..universe_size))
        }
    }
}

/// Produces the payloads a publisher sends.
#[derive(Debug)]
pub struct PayloadBuilder<R> {
    kind: PayloadKind,
    size: usize,
    local: NodeIndex,
    seq: usize,
    rng: R,
}

impl<R: RngCore> PayloadBuilder<R> {
    pub fn new(kind: PayloadKind, size: usize, local: NodeIndex, rng: R) -> Self {
        Self {
            kind,
            size,
            local,
            seq: 0,
            rng,
        }
    }

    /// Next payload. Greetings after the first carry a ` #<n>` suffix so they hash to
    /// distinct message identities.
    pub fn next_payload(&mut self) -> Vec<u8> {
        let seq = self.seq;
        self.seq += 1;
        match self.kind {
            PayloadKind::Random => {
                let mut buf = vec![0u8; self.size];
                self.rng.fill_bytes(&mut buf);
                buf
            }
            PayloadKind::Greeting if seq == 0 => {
                format!("Hello from {}", self.local.hostname()).into_bytes()
            }
            PayloadKind::Greeting => {
                format!("Hello from {} #{seq}", self.local.hostname()).into_bytes()
            }
        }
    }
}

/// Publishes `settings.count` payloads on `topic`.
///
/// Failed publishes are logged and skipped. Returns the identities that were accepted.
pub async fn publish_all<O, R>(
    topic: &TopicHandle<'_, O>,
    payloads: &mut PayloadBuilder<R>,
    settings: &PublishArgs,
    cancel: &CancellationToken,
) -> Result<Vec<ContentId>, NodeError>
where
    O: Overlay + ?Sized,
    R: RngCore,
{
    let metrics = NodeMetrics::default();
    let mut published = Vec::with_capacity(settings.count);

    for _ in 0..settings.count {
        let payload = payloads.next_payload();
        let size = payload.len();
        match topic.publish(payload, cancel).await {
            Ok(id) => {
                metrics.published_total.increment(1);
                info!(
                    "{}",
                    render::line(
                        render::PUBLISHED,
                        "Message",
                        &[("topic", &topic.topic()), ("id", &id), ("size", &size)]
                    )
                );
                published.push(id);
            }
            Err(e) if e.is_cancelled() => return Err(NodeError::Cancelled),
            Err(e) => {
                metrics.publish_failures_total.increment(1);
                warn!(topic = topic.topic(), size, error = %e, "Failed to publish message");
            }
        }
    }

    Ok(published)
}

/// Consumes deliveries until cancelled or the overlay closes.
#[derive(Debug)]
pub struct ReceiveLoop {
    subscription: Subscription,
    duplicates: DuplicateCounter,
    metrics: NodeMetrics,
}

impl ReceiveLoop {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            duplicates: DuplicateCounter::new(),
            metrics: NodeMetrics::default(),
        }
    }

    pub fn duplicates(&self) -> &DuplicateCounter {
        &self.duplicates
    }

    /// Runs until `cancel` fires ([`NodeError::Cancelled`]) or the overlay closes.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), NodeError> {
        loop {
            let msg = self.subscription.next(cancel).await?;
            let duplicates = self.duplicates.record();
            self.metrics.received_total.increment(1);
            if duplicates > 0 {
                self.metrics.duplicates_total.increment(1);
            }

            info!(
                "{}",
                render::line(
                    render::RECEIVED,
                    "Message",
                    &[
                        ("topic", &msg.topic),
                        ("id", &msg.id),
                        ("from", &msg.from),
                        ("size", &msg.data.len()),
                        ("duplicates", &duplicates),
                    ]
                )
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use libp2p::PeerId;
    use pubsub_shadow_overlay::{OverlayError, ReceivedMessage};
    use tokio::sync::mpsc;

    #[test]
    fn fixed_election_is_node_zero() {
        assert_eq!(elect_publisher(ElectionPolicy::Fixed, 42, 20), NodeIndex::new(0));
    }

    #[test]
    fn random_election_agrees_across_nodes() {
        for seed in 0..50 {
            let first = elect_publisher(ElectionPolicy::Random, seed, 20);
            assert!(first.get() < 20);
            assert_eq!(first, elect_publisher(ElectionPolicy::Random, seed, 20));
        }
    }

    #[test]
    fn random_election_depends_on_seed() {
        let elected: std::collections::HashSet<_> = (0..50)
            .map(|seed| elect_publisher(ElectionPolicy::Random, seed, 1000))
            .collect();
        assert!(elected.len() > 1);
    }

    #[test]
    fn greeting_payloads() {
        let mut payloads = PayloadBuilder::new(
            PayloadKind::Greeting,
            32,
            NodeIndex::new(0),
            StdRng::seed_from_u64(0),
        );
        assert_eq!(payloads.next_payload(), b"Hello from node0");
        assert_eq!(payloads.next_payload(), b"Hello from node0 #1");
        assert_eq!(payloads.next_payload(), b"Hello from node0 #2");
    }

    #[test]
    fn random_payloads_have_configured_size() {
        let mut payloads = PayloadBuilder::new(
            PayloadKind::Random,
            64,
            NodeIndex::new(3),
            StdRng::seed_from_u64(0),
        );
        let first = payloads.next_payload();
        let second = payloads.next_payload();
        assert_eq!(first.len(), 64);
        assert_eq!(second.len(), 64);
        assert_ne!(first, second);
    }

    fn delivery(n: u8) -> ReceivedMessage {
        ReceivedMessage {
            id: ContentId::of(&[n]),
            from: PeerId::random(),
            source: None,
            topic: "foobar".into(),
            data: vec![n],
        }
    }

    #[tokio::test]
    async fn receive_loop_counts_deliveries_beyond_the_first() {
        let (tx, rx) = mpsc::channel(8);
        let mut receive = ReceiveLoop::new(Subscription::new(rx));

        for n in 0..3 {
            tx.send(delivery(n)).await.unwrap();
        }
        drop(tx);

        let res = receive.run(&CancellationToken::new()).await;
        assert_matches!(res, Err(NodeError::Overlay(OverlayError::Closed)));
        assert_eq!(receive.duplicates().deliveries(), 3);
        assert_eq!(receive.duplicates().count(), 2);
    }

    #[tokio::test]
    async fn receive_loop_stops_on_cancel() {
        let (_tx, rx) = mpsc::channel(8);
        let mut receive = ReceiveLoop::new(Subscription::new(rx));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = receive.run(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(receive.duplicates().count(), 0);
    }
}
